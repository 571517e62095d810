//! Retry backoff strategy
//!
//! A fixed list of wait intervals: attempt `n` waits for the `n`-th tick,
//! and once the list is exhausted the request is given up for good.

use std::time::Duration;

/// Fixed-interval backoff over a finite tick list
#[derive(Debug, Clone)]
pub struct Backoff {
    ticks: Vec<Duration>,
}

impl Backoff {
    pub fn new(ticks: Vec<Duration>) -> Self {
        Self { ticks }
    }

    /// A backoff that never retries
    pub fn none() -> Self {
        Self { ticks: Vec::new() }
    }

    /// Wait duration for the given 1-based attempt number, or `None` when
    /// retries are exhausted.
    pub fn next(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        self.ticks.get(attempt - 1).copied()
    }

    pub fn max_attempts(&self) -> usize {
        self.ticks.len()
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_millis(100),
            Duration::from_millis(500),
            Duration::from_secs(1),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_returned_in_order() {
        let backoff = Backoff::new(vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]);

        assert_eq!(backoff.next(1), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next(2), Some(Duration::from_millis(20)));
        assert_eq!(backoff.next(3), None);
    }

    #[test]
    fn test_attempt_zero_never_retries() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next(0), None);
    }

    #[test]
    fn test_none_refuses_all_attempts() {
        let backoff = Backoff::none();
        assert_eq!(backoff.next(1), None);
        assert_eq!(backoff.max_attempts(), 0);
    }
}
