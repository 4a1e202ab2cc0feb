//! Verdict indicator rendering.
//!
//! The renderer owns the single indicator element of a page. Rendering always
//! removes the existing element before inserting the replacement, so at most
//! one indicator is ever present. The element is pinned to the top layer
//! (fixed position, maximal stacking order, attached to the document root) so
//! host-page styling cannot bury it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::verdict::{Classification, Verdict};

/// Element id of the indicator.
pub const INDICATOR_ELEMENT_ID: &str = "phishguard-banner";

/// Maximal stacking order.
pub const TOP_LAYER_Z_INDEX: i32 = i32::MAX;

/// Visual style bucket of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStyle {
    Affirmative,
    Cautionary,
    Alarming,
    Neutral,
}

impl IndicatorStyle {
    #[must_use]
    pub const fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::Safe => Self::Affirmative,
            Classification::Suspicious => Self::Cautionary,
            Classification::Phishing => Self::Alarming,
            Classification::Unknown => Self::Neutral,
        }
    }

    /// Background color as a CSS hex string.
    #[must_use]
    pub const fn background(self) -> &'static str {
        match self {
            Self::Affirmative => "#16a34a",
            Self::Cautionary => "#f59e0b",
            Self::Alarming => "#dc2626",
            Self::Neutral => "#6b7280",
        }
    }

    #[must_use]
    pub const fn foreground(self) -> &'static str {
        "#ffffff"
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Affirmative => "✅",
            Self::Cautionary => "⚠️",
            Self::Alarming => "🚨",
            Self::Neutral => "ℹ️",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Affirmative => "This page appears SAFE",
            Self::Cautionary => "This page looks SUSPICIOUS",
            Self::Alarming => "PHISHING RISK DETECTED",
            Self::Neutral => "Unable to determine risk",
        }
    }
}

/// Where the indicator is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerAnchor {
    /// The root element of the document, outside any host-page container.
    DocumentRoot,
}

/// Stacking placement of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPlacement {
    pub anchor: LayerAnchor,
    pub fixed: bool,
    pub z_index: i32,
}

impl LayerPlacement {
    /// Topmost fixed layer at the document root.
    pub const TOP: Self = Self {
        anchor: LayerAnchor::DocumentRoot,
        fixed: true,
        z_index: TOP_LAYER_Z_INDEX,
    };
}

/// A fully described indicator element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub element_id: String,
    pub style: IndicatorStyle,
    pub text: String,
    pub classification: Classification,
    pub risk_score: u8,
    pub layer: LayerPlacement,
}

impl Indicator {
    #[must_use]
    pub fn for_verdict(verdict: &Verdict, brand: &str) -> Self {
        let style = IndicatorStyle::for_classification(verdict.classification);
        Self {
            element_id: INDICATOR_ELEMENT_ID.to_string(),
            style,
            text: format!("{} {brand}: {}", style.icon(), style.message()),
            classification: verdict.classification,
            risk_score: verdict.risk_score,
            layer: LayerPlacement::TOP,
        }
    }
}

/// The document cannot take the indicator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("document is detached")]
    Detached,

    #[error("document unavailable: {0}")]
    Unavailable(String),
}

/// Capability to place and remove the indicator element in a document.
pub trait IndicatorSurface {
    /// Remove the element with `element_id`. Returns true if one was present.
    fn remove_indicator(&mut self, element_id: &str) -> Result<bool, SurfaceError>;

    /// Append `indicator` at its layer.
    fn insert_indicator(&mut self, indicator: &Indicator) -> Result<(), SurfaceError>;
}

/// In-memory document, used headless and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    elements: Vec<Indicator>,
    detached: bool,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate page teardown.
    pub fn detach(&mut self) {
        self.detached = true;
        self.elements.clear();
    }

    #[must_use]
    pub fn indicators(&self) -> &[Indicator] {
        &self.elements
    }

    #[must_use]
    pub fn indicator_count(&self) -> usize {
        self.elements.len()
    }
}

impl IndicatorSurface for MemorySurface {
    fn remove_indicator(&mut self, element_id: &str) -> Result<bool, SurfaceError> {
        if self.detached {
            return Err(SurfaceError::Detached);
        }
        let before = self.elements.len();
        self.elements.retain(|e| e.element_id != element_id);
        Ok(self.elements.len() != before)
    }

    fn insert_indicator(&mut self, indicator: &Indicator) -> Result<(), SurfaceError> {
        if self.detached {
            return Err(SurfaceError::Detached);
        }
        self.elements.push(indicator.clone());
        Ok(())
    }
}

/// Result of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOutcome {
    Rendered,
    /// Document torn down; nothing was drawn.
    Skipped,
}

/// Keeps exactly one indicator on a surface.
#[derive(Debug)]
pub struct VerdictRenderer<S> {
    surface: S,
    brand: String,
    current: Option<Indicator>,
}

impl<S: IndicatorSurface> VerdictRenderer<S> {
    #[must_use]
    pub fn new(surface: S, brand: impl Into<String>) -> Self {
        Self {
            surface,
            brand: brand.into(),
            current: None,
        }
    }

    /// Replace any indicator with one for `verdict`.
    pub fn render(&mut self, verdict: &Verdict) -> RenderOutcome {
        let indicator = Indicator::for_verdict(verdict, &self.brand);
        let placed = self
            .surface
            .remove_indicator(INDICATOR_ELEMENT_ID)
            .and_then(|_| self.surface.insert_indicator(&indicator));
        match placed {
            Ok(()) => {
                debug!(
                    classification = %verdict.classification,
                    risk_score = verdict.risk_score,
                    "Indicator rendered"
                );
                self.current = Some(indicator);
                RenderOutcome::Rendered
            }
            Err(err) => {
                debug!(error = %err, "Indicator not rendered");
                self.current = None;
                RenderOutcome::Skipped
            }
        }
    }

    /// Remove the indicator, if any. Returns true when one was removed.
    pub fn clear(&mut self) -> bool {
        self.current = None;
        match self.surface.remove_indicator(INDICATOR_ELEMENT_ID) {
            Ok(removed) => {
                if removed {
                    trace!("Stale indicator removed");
                }
                removed
            }
            Err(err) => {
                debug!(error = %err, "Indicator not cleared");
                false
            }
        }
    }

    /// Indicator last drawn, if still shown.
    #[must_use]
    pub fn current(&self) -> Option<&Indicator> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> VerdictRenderer<MemorySurface> {
        VerdictRenderer::new(MemorySurface::new(), "PhishGuard AI")
    }

    #[test]
    fn classification_maps_to_style_and_text() {
        let cases = [
            (
                Classification::Safe,
                IndicatorStyle::Affirmative,
                "#16a34a",
                "✅ PhishGuard AI: This page appears SAFE",
            ),
            (
                Classification::Suspicious,
                IndicatorStyle::Cautionary,
                "#f59e0b",
                "⚠️ PhishGuard AI: This page looks SUSPICIOUS",
            ),
            (
                Classification::Phishing,
                IndicatorStyle::Alarming,
                "#dc2626",
                "🚨 PhishGuard AI: PHISHING RISK DETECTED",
            ),
            (
                Classification::Unknown,
                IndicatorStyle::Neutral,
                "#6b7280",
                "ℹ️ PhishGuard AI: Unable to determine risk",
            ),
        ];
        for (classification, style, color, text) in cases {
            let indicator =
                Indicator::for_verdict(&Verdict::new(classification, 10.0, vec![]), "PhishGuard AI");
            assert_eq!(indicator.style, style);
            assert_eq!(indicator.style.background(), color);
            assert_eq!(indicator.text, text);
        }
    }

    #[test]
    fn indicator_sits_on_top_layer() {
        let indicator = Indicator::for_verdict(&Verdict::unknown("x"), "PhishGuard AI");
        assert_eq!(indicator.element_id, INDICATOR_ELEMENT_ID);
        assert_eq!(indicator.layer.z_index, 2_147_483_647);
        assert!(indicator.layer.fixed);
        assert_eq!(indicator.layer.anchor, LayerAnchor::DocumentRoot);
    }

    #[test]
    fn rendering_twice_leaves_one_indicator() {
        let mut renderer = renderer();
        let verdict = Verdict::new(Classification::Safe, 2.0, vec![]);
        assert_eq!(renderer.render(&verdict), RenderOutcome::Rendered);
        assert_eq!(renderer.render(&verdict), RenderOutcome::Rendered);
        assert_eq!(renderer.surface().indicator_count(), 1);
    }

    #[test]
    fn new_verdict_replaces_old() {
        let mut renderer = renderer();
        renderer.render(&Verdict::new(Classification::Safe, 2.0, vec![]));
        renderer.render(&Verdict::new(Classification::Phishing, 97.0, vec![]));
        let shown = renderer.surface().indicators();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].style, IndicatorStyle::Alarming);
        assert_eq!(renderer.current().unwrap().risk_score, 97);
    }

    #[test]
    fn clear_removes_indicator() {
        let mut renderer = renderer();
        assert!(!renderer.clear());
        renderer.render(&Verdict::new(Classification::Suspicious, 50.0, vec![]));
        assert!(renderer.clear());
        assert_eq!(renderer.surface().indicator_count(), 0);
        assert!(renderer.current().is_none());
    }

    #[test]
    fn detached_document_is_silent_noop() {
        let mut renderer = renderer();
        renderer.surface_mut().detach();
        let outcome = renderer.render(&Verdict::new(Classification::Safe, 0.0, vec![]));
        assert_eq!(outcome, RenderOutcome::Skipped);
        assert!(!renderer.clear());
        assert_eq!(renderer.surface().indicator_count(), 0);
    }

    #[test]
    fn brand_is_configurable() {
        let mut renderer = VerdictRenderer::new(MemorySurface::new(), "Acme Shield");
        renderer.render(&Verdict::unknown("timeout"));
        assert_eq!(
            renderer.current().unwrap().text,
            "ℹ️ Acme Shield: Unable to determine risk"
        );
    }
}
