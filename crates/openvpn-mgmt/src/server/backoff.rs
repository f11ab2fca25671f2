//! Retry pacing for temporary accept failures.

use std::time::Duration;

/// Exponential backoff applied between consecutive temporary accept errors.
///
/// The first delay is `initial`; each further consecutive error doubles it
/// up to `max`. A successful accept resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl AcceptBackoff {
    /// Delay after the first temporary error.
    pub const DEFAULT_INITIAL: Duration = Duration::from_millis(5);
    /// Upper bound on the delay.
    pub const DEFAULT_MAX: Duration = Duration::from_secs(1);

    /// Creates a backoff starting at `initial` and capped at `max`.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: Duration::ZERO,
        }
    }

    /// Advances to, and returns, the delay for the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let next = if self.current.is_zero() {
            self.initial
        } else {
            self.current.saturating_mul(2)
        };
        self.current = next.min(self.max);
        self.current
    }

    /// Forgets previous failures after a successful accept.
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }

    /// The most recently returned delay, or zero after a reset.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL, Self::DEFAULT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn consecutive_errors_double_the_delay() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<Duration> = (0..3).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [5, 10, 20].map(Duration::from_millis).to_vec()
        );
    }

    #[rstest]
    fn delay_is_capped() {
        let mut backoff = AcceptBackoff::default();
        let last = (0..12).map(|_| backoff.next_delay()).last();
        assert_eq!(last, Some(AcceptBackoff::DEFAULT_MAX));
        assert_eq!(backoff.next_delay(), AcceptBackoff::DEFAULT_MAX);
    }

    #[rstest]
    fn reset_restarts_from_initial_delay() {
        let mut backoff = AcceptBackoff::new(Duration::from_millis(1), Duration::from_millis(3));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_millis(3));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
    }
}
