//! Publisher metrics for observability
//!
//! One monotonic drop counter covers every way an entry can be lost:
//! full inbound channel, pending-queue eviction, and undelivered entries
//! discarded at shutdown. Suitable for external scraping.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking publisher health
///
/// # Example
///
/// ```
/// use telemetry_relay::TelemetryMetrics;
///
/// let metrics = TelemetryMetrics::new();
/// metrics.record_dropped();
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug)]
pub struct TelemetryMetrics {
    /// Entries not sent to the collector (overflow or shutdown)
    dropped: AtomicU64,

    /// Entries accepted onto the inbound channel
    enqueued: AtomicU64,

    /// Entries handed to the delivery client successfully
    delivered: AtomicU64,

    /// Entries the delivery client failed to ship
    delivery_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub const fn new() -> Self {
        Self {
            dropped: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivery_failure_count(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivery_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.dropped.store(0, Ordering::Relaxed);
        self.enqueued.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.delivery_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TelemetryMetrics {
    /// Create a snapshot of the current counter values
    fn clone(&self) -> Self {
        Self {
            dropped: AtomicU64::new(self.dropped_count()),
            enqueued: AtomicU64::new(self.enqueued_count()),
            delivered: AtomicU64::new(self.delivered_count()),
            delivery_failures: AtomicU64::new(self.delivery_failure_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = TelemetryMetrics::new();
        assert_eq!(metrics.dropped_count(), 0);
        assert_eq!(metrics.enqueued_count(), 0);
        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.delivery_failure_count(), 0);
    }

    #[test]
    fn test_record_dropped_is_monotonic() {
        let metrics = TelemetryMetrics::new();
        assert_eq!(metrics.record_dropped(), 0); // returns previous value
        metrics.record_dropped();
        assert_eq!(metrics.dropped_count(), 2);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let metrics = TelemetryMetrics::new();
        metrics.record_delivered();

        let snapshot = metrics.clone();
        metrics.record_delivered();

        assert_eq!(metrics.delivered_count(), 2);
        assert_eq!(snapshot.delivered_count(), 1);
    }
}
