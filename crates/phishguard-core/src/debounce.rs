//! Single-slot debouncer.
//!
//! Holds at most one pending value with a due instant. Scheduling a new value
//! replaces (cancels) the pending one. The debouncer never sleeps: callers
//! feed it the current instant and wait on [`Debouncer::deadline`] with
//! whatever timer primitive their runtime offers.

use std::ops::Add;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Pending<T, I> {
    value: T,
    due: I,
}

/// Cancel-and-reschedule pending slot.
#[derive(Debug, Clone)]
pub struct Debouncer<T, I> {
    pending: Option<Pending<T, I>>,
    cancelled: u64,
    fired: u64,
}

impl<T, I> Default for Debouncer<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I> Debouncer<T, I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: None,
            cancelled: 0,
            fired: 0,
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Value waiting to fire, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|p| &p.value)
    }

    /// Number of pending values replaced or cancelled before firing.
    #[must_use]
    pub const fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Number of values that fired.
    #[must_use]
    pub const fn fired(&self) -> u64 {
        self.fired
    }

    /// Drop the pending value without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        let dropped = self.pending.take().map(|p| p.value);
        if dropped.is_some() {
            self.cancelled = self.cancelled.saturating_add(1);
        }
        dropped
    }
}

impl<T, I> Debouncer<T, I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Schedule `value` to fire `delay` after `now`, replacing any pending
    /// value. Returns the replaced value.
    pub fn schedule(&mut self, value: T, now: I, delay: Duration) -> Option<T> {
        let replaced = self.cancel();
        self.pending = Some(Pending {
            value,
            due: now + delay,
        });
        replaced
    }

    /// Instant at which the pending value becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<I> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Take the pending value if it is due at `now`.
    pub fn poll_due(&mut self, now: I) -> Option<T> {
        match &self.pending {
            Some(p) if p.due <= now => {
                self.fired = self.fired.saturating_add(1);
                self.pending.take().map(|p| p.value)
            }
            _ => None,
        }
    }
}
