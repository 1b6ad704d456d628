//! Bounded exponential backoff for transport retries.

use std::time::Duration;

/// Doubling backoff with a fixed cap. Reset on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    /// Create a backoff starting at `initial`, doubling up to `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: None,
        }
    }

    /// The next delay to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(current) => self.max.min(current.saturating_mul(2)),
        };
        self.current = Some(next);
        next
    }

    /// Return to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
