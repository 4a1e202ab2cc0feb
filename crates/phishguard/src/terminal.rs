//! Banner surface that draws the indicator as a line of terminal output.

use std::io::Write;

use phishguard_core::renderer::{Indicator, IndicatorSurface, SurfaceError};

/// Writes each inserted indicator as one line; removal is tracked only.
pub struct TerminalSurface<W> {
    out: W,
    shown: Option<String>,
    closed: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: None,
            closed: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> IndicatorSurface for TerminalSurface<W> {
    fn remove_indicator(&mut self, element_id: &str) -> Result<bool, SurfaceError> {
        if self.closed {
            return Err(SurfaceError::Detached);
        }
        if self.shown.as_deref() == Some(element_id) {
            self.shown = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn insert_indicator(&mut self, indicator: &Indicator) -> Result<(), SurfaceError> {
        if self.closed {
            return Err(SurfaceError::Detached);
        }
        let written = writeln!(
            self.out,
            "{}  [risk {}/100]",
            indicator.text, indicator.risk_score
        )
        .and_then(|()| self.out.flush());
        if let Err(err) = written {
            // Output closed (e.g. broken pipe): treat like a torn-down page.
            self.closed = true;
            return Err(SurfaceError::Unavailable(err.to_string()));
        }
        self.shown = Some(indicator.element_id.clone());
        Ok(())
    }
}
