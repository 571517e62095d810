//! Asynchronous telemetry publisher
//!
//! Decouples log-emission call sites from network delivery latency and
//! availability. A single background worker owns the pending queue: entries
//! arrive over a bounded channel, are buffered while the collector endpoint
//! is unreachable or unconfigured, and drain oldest-first through the
//! enricher to the delivery client once the publisher is ready. Sustained
//! overload evicts the oldest pending entries, so memory stays bounded and
//! callers never block.

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use super::enricher::Enricher;
use super::entry::TelemetryEntry;
use super::error::Result;
use super::metrics::TelemetryMetrics;

/// Depth of the inbound channel between call sites and the worker
pub const DEFAULT_CHANNEL_DEPTH: usize = 32;

/// Capacity of the pending queue; oldest entries are evicted beyond this
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 100;

/// Seam between the publisher and the transport layer
///
/// Implemented by [`crate::delivery::DeliveryClient`] in production and by
/// recording stubs in tests.
pub trait Shipper: Send {
    fn publish(&self, entry: &TelemetryEntry) -> Result<()>;
}

/// Completion counter shared by `enqueue`, `flush` and `close`
///
/// Every enqueued entry holds one unit until it is delivered, dropped, or
/// discarded at shutdown. Waiters block until the count reaches zero.
struct WaitCounter {
    count: Mutex<usize>,
    zero: Condvar,
}

impl WaitCounter {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            zero: Condvar::new(),
        }
    }

    fn add(&self, n: usize) {
        *self.count.lock() += n;
    }

    fn release(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zero.wait(&mut count);
        }
    }
}

struct PendingState {
    queue: VecDeque<TelemetryEntry>,
    /// True once a live, configured delivery destination exists
    ready: bool,
}

struct Inner {
    pending: Mutex<PendingState>,
    /// Swapped under this lock by live URI updates, serialized with delivery
    shipper: Mutex<Option<Box<dyn Shipper>>>,
    completion: WaitCounter,
    metrics: Arc<TelemetryMetrics>,
    max_queue_depth: usize,
}

impl Inner {
    /// Move an entry into the pending queue, evicting the oldest first when
    /// full. Returns whether the publisher is ready, to avoid re-locking.
    fn append_pending(&self, entry: TelemetryEntry) -> bool {
        let mut state = self.pending.lock();
        if state.queue.len() >= self.max_queue_depth {
            state.queue.pop_front();
            // The evicted entry will never be processed; release its unit so
            // flush/close don't hang waiting on dropped work.
            self.completion.release();
            self.metrics.record_dropped();
        }
        state.queue.push_back(entry);
        state.ready
    }
}

/// Handle to a live async publisher and its background worker
pub struct AsyncPublisher {
    inner: Arc<Inner>,
    entries_tx: Sender<TelemetryEntry>,
    quit_tx: Sender<()>,
    uri_update_tx: Sender<()>,
    closing: AtomicBool,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl AsyncPublisher {
    /// Create the publisher and start its worker thread.
    ///
    /// The publisher starts ready when a shipper is supplied; with `None` it
    /// queues entries until a live URI update provides a destination.
    pub fn new(
        enricher: Enricher,
        shipper: Option<Box<dyn Shipper>>,
        channel_depth: usize,
        max_queue_depth: usize,
    ) -> Self {
        let ready = shipper.is_some();
        let (entries_tx, entries_rx) = bounded(channel_depth);
        let (quit_tx, quit_rx) = bounded(1);
        // One-slot signal channel; repeat updates before the worker wakes
        // coalesce into a single wakeup.
        let (uri_update_tx, uri_update_rx) = bounded(1);

        let inner = Arc::new(Inner {
            pending: Mutex::new(PendingState {
                queue: VecDeque::new(),
                ready,
            }),
            shipper: Mutex::new(shipper),
            completion: WaitCounter::new(),
            metrics: Arc::new(TelemetryMetrics::new()),
            max_queue_depth,
        });

        let worker = Worker {
            inner: Arc::clone(&inner),
            enricher,
            entries_rx,
            quit_rx,
            uri_update_rx,
        };
        let handle = thread::spawn(move || worker.run());

        Self {
            inner,
            entries_tx,
            quit_tx,
            uri_update_tx,
            closing: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Register intent to deliver `entry` and hand it to the worker.
    ///
    /// Never blocks and never fails: when the channel is full or shutdown is
    /// in progress the entry is counted as dropped and discarded.
    pub fn enqueue(&self, entry: TelemetryEntry) {
        self.inner.completion.add(1);

        if self.closing.load(Ordering::SeqCst) {
            self.inner.completion.release();
            self.inner.metrics.record_dropped();
            return;
        }

        match self.entries_tx.try_send(entry) {
            Ok(()) => {
                self.inner.metrics.record_enqueued();
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.inner.completion.release();
                self.inner.metrics.record_dropped();
            }
        }
    }

    /// Block until every previously enqueued entry has been delivered,
    /// dropped, or discarded at shutdown.
    ///
    /// Must not be called from the worker's own thread.
    pub fn flush(&self) {
        self.inner.completion.wait();
    }

    /// Signal shutdown and block until the worker has exited.
    ///
    /// Pending entries are discarded, not flushed to the network; their
    /// completion units are released so concurrent `flush` calls return.
    /// Subsequent calls are no-ops.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.completion.add(1);
        let _ = self.quit_tx.send(());
        self.inner.completion.wait();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Inform the worker that the destination URI changed.
    ///
    /// The new shipper must already be installed via [`set_shipper`]; this
    /// only marks the publisher ready and wakes the worker so queued entries
    /// start draining.
    ///
    /// [`set_shipper`]: AsyncPublisher::set_shipper
    pub fn notify_uri_updated(&self) {
        self.inner.pending.lock().ready = true;
        let _ = self.uri_update_tx.try_send(());
    }

    /// Install or replace the delivery shipper, serialized with any
    /// in-flight delivery.
    pub fn set_shipper(&self, shipper: Box<dyn Shipper>) {
        *self.inner.shipper.lock() = Some(shipper);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.pending.lock().ready
    }

    pub fn metrics(&self) -> Arc<TelemetryMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Number of entries buffered in the pending queue
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().queue.len()
    }
}

/// State machine run by the worker thread
struct Worker {
    inner: Arc<Inner>,
    enricher: Enricher,
    entries_rx: Receiver<TelemetryEntry>,
    quit_rx: Receiver<()>,
    uri_update_rx: Receiver<()>,
}

impl Worker {
    /// Worker loop; exists for the lifetime of the owning publisher.
    fn run(self) {
        let mut exit = false;
        while !exit {
            exit = !self.wait_for_event_and_ready();

            let mut has_events = true;
            while has_events {
                match self.entries_rx.try_recv() {
                    Ok(entry) => {
                        self.inner.append_pending(entry);
                    }
                    Err(_) => {
                        let entry = {
                            let mut state = self.inner.pending.lock();
                            if state.ready {
                                state.queue.pop_front()
                            } else {
                                None
                            }
                        };
                        match entry {
                            Some(entry) => self.deliver(entry),
                            None => has_events = false,
                        }
                    }
                }
            }
        }
        self.shutdown();
    }

    /// Blocks until one of: shutdown requested (returns false), an entry
    /// arrived and the publisher is ready, or the URI was updated with
    /// entries already pending (both return true, meaning: drain).
    fn wait_for_event_and_ready(&self) -> bool {
        loop {
            select! {
                recv(self.quit_rx) -> _ => return false,
                recv(self.entries_rx) -> msg => match msg {
                    Ok(entry) => {
                        if self.inner.append_pending(entry) {
                            return true;
                        }
                        // Not ready; keep waiting for a URI update.
                    }
                    // All senders gone: the handle was dropped without close.
                    Err(_) => return false,
                },
                recv(self.uri_update_rx) -> msg => match msg {
                    Ok(()) => {
                        let has_events = !self.inner.pending.lock().queue.is_empty();
                        // Otherwise keep waiting for an entry.
                        if has_events {
                            return true;
                        }
                    }
                    Err(_) => return false,
                },
            }
        }
    }

    /// Enrich one entry and hand it to the shipper. Failures are logged
    /// locally and the entry discarded; nothing here can crash the worker.
    fn deliver(&self, entry: TelemetryEntry) {
        let enriched = self.enricher.enrich(&entry);

        let result = {
            let shipper = self.inner.shipper.lock();
            match shipper.as_ref() {
                Some(shipper) => shipper.publish(&enriched),
                // ready without a shipper cannot normally happen; treat it
                // as a per-entry failure rather than wedging the queue.
                None => Err(super::error::TelemetryError::ShipperUnavailable),
            }
        };

        match result {
            Ok(()) => {
                self.inner.metrics.record_delivered();
            }
            Err(err) => {
                warn!(error = %err, message = %enriched.message, "unable to publish telemetry entry");
                self.inner.metrics.record_delivery_failure();
            }
        }
        self.inner.completion.release();
    }

    /// Drain the inbound channel, then release a completion unit for every
    /// still-pending entry without delivering it. Shutdown trades best-effort
    /// completeness for bounded latency; anyone blocked in `flush` completes
    /// rather than hanging on discarded work.
    fn shutdown(&self) {
        while let Ok(entry) = self.entries_rx.try_recv() {
            self.inner.append_pending(entry);
        }

        let discarded = {
            let mut state = self.inner.pending.lock();
            let n = state.queue.len();
            state.queue.clear();
            n
        };
        for _ in 0..discarded {
            self.inner.metrics.record_dropped();
            self.inner.completion.release();
        }

        info!(discarded, "telemetry publisher shutting down");

        // The unit added by close().
        self.inner.completion.release();
    }
}

/// Publisher capability handed to the telemetry facade
///
/// `Disabled` always reports ready and no-ops delivery, so callers never
/// special-case "telemetry off".
pub enum Publisher {
    Disabled,
    Live(AsyncPublisher),
}

impl Publisher {
    pub fn enqueue(&self, entry: TelemetryEntry) {
        match self {
            Publisher::Disabled => {}
            Publisher::Live(publisher) => publisher.enqueue(entry),
        }
    }

    pub fn flush(&self) {
        if let Publisher::Live(publisher) = self {
            publisher.flush();
        }
    }

    pub fn close(&self) {
        if let Publisher::Live(publisher) = self {
            publisher.close();
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Publisher::Disabled => true,
            Publisher::Live(publisher) => publisher.is_ready(),
        }
    }

    pub fn metrics(&self) -> Option<Arc<TelemetryMetrics>> {
        match self {
            Publisher::Disabled => None,
            Publisher::Live(publisher) => Some(publisher.metrics()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::LogHistoryBuffer;
    use crate::core::level::Level;
    use std::time::Duration;

    fn test_enricher() -> Enricher {
        Enricher::new(
            "test-session",
            "0.0.1",
            Level::Error,
            Arc::new(LogHistoryBuffer::new(2)),
        )
    }

    struct RecordingShipper {
        published: Arc<Mutex<Vec<TelemetryEntry>>>,
    }

    impl Shipper for RecordingShipper {
        fn publish(&self, entry: &TelemetryEntry) -> Result<()> {
            self.published.lock().push(entry.clone());
            Ok(())
        }
    }

    struct FailingShipper;

    impl Shipper for FailingShipper {
        fn publish(&self, _entry: &TelemetryEntry) -> Result<()> {
            Err(super::super::error::TelemetryError::other("collector down"))
        }
    }

    fn recording_pair() -> (Box<dyn Shipper>, Arc<Mutex<Vec<TelemetryEntry>>>) {
        let published = Arc::new(Mutex::new(Vec::new()));
        let shipper = RecordingShipper {
            published: Arc::clone(&published),
        };
        (Box::new(shipper), published)
    }

    fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_ready_publisher_delivers_in_order() {
        let (shipper, published) = recording_pair();
        let publisher = AsyncPublisher::new(test_enricher(), Some(shipper), 32, 100);

        for i in 0..5 {
            publisher.enqueue(TelemetryEntry::new(Level::Info, format!("event-{}", i)));
        }
        publisher.flush();

        let entries = published.lock();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.message, format!("event-{}", i));
        }
        drop(entries);
        publisher.close();
    }

    #[test]
    fn test_unready_publisher_queues_and_evicts_oldest() {
        let publisher = AsyncPublisher::new(test_enricher(), None, 32, 3);

        for i in 0..5 {
            publisher.enqueue(TelemetryEntry::new(Level::Info, format!("event-{}", i)));
        }

        assert!(wait_until(Duration::from_secs(2), || {
            publisher.pending_len() == 3
        }));
        assert_eq!(publisher.metrics().dropped_count(), 2);
        assert!(!publisher.is_ready());
        publisher.close();
    }

    #[test]
    fn test_uri_update_drains_pending_fifo() {
        let publisher = AsyncPublisher::new(test_enricher(), None, 32, 100);

        publisher.enqueue(TelemetryEntry::new(Level::Info, "first"));
        publisher.enqueue(TelemetryEntry::new(Level::Info, "second"));
        assert!(wait_until(Duration::from_secs(2), || {
            publisher.pending_len() == 2
        }));

        let (shipper, published) = recording_pair();
        publisher.set_shipper(shipper);
        publisher.notify_uri_updated();
        publisher.flush();

        let entries = published.lock();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
        drop(entries);
        publisher.close();
    }

    #[test]
    fn test_flush_returns_after_close_with_pending_entries() {
        let publisher = AsyncPublisher::new(test_enricher(), None, 32, 100);

        publisher.enqueue(TelemetryEntry::new(Level::Info, "never delivered"));
        publisher.enqueue(TelemetryEntry::new(Level::Info, "also never"));

        publisher.close();
        // Must not hang: shutdown released the pending units.
        publisher.flush();
        assert_eq!(publisher.metrics().dropped_count(), 2);
    }

    #[test]
    fn test_enqueue_after_close_is_counted_as_drop() {
        let (shipper, _) = recording_pair();
        let publisher = AsyncPublisher::new(test_enricher(), Some(shipper), 32, 100);
        publisher.close();

        publisher.enqueue(TelemetryEntry::new(Level::Info, "late"));
        publisher.flush();
        assert_eq!(publisher.metrics().dropped_count(), 1);
    }

    #[test]
    fn test_close_twice_is_noop() {
        let (shipper, _) = recording_pair();
        let publisher = AsyncPublisher::new(test_enricher(), Some(shipper), 32, 100);
        publisher.close();
        publisher.close();
    }

    #[test]
    fn test_delivery_failure_discards_entry() {
        let publisher =
            AsyncPublisher::new(test_enricher(), Some(Box::new(FailingShipper)), 32, 100);

        publisher.enqueue(TelemetryEntry::new(Level::Info, "doomed"));
        publisher.flush();

        let metrics = publisher.metrics();
        assert_eq!(metrics.delivery_failure_count(), 1);
        assert_eq!(metrics.delivered_count(), 0);
        publisher.close();
    }

    #[test]
    fn test_entries_are_enriched_before_delivery() {
        let (shipper, published) = recording_pair();
        let publisher = AsyncPublisher::new(test_enricher(), Some(shipper), 32, 100);

        publisher.enqueue(TelemetryEntry::new(Level::Info, "event"));
        publisher.flush();

        let entries = published.lock();
        assert!(entries[0].fields.contains_key("session"));
        assert!(entries[0].fields.contains_key("v"));
        drop(entries);
        publisher.close();
    }

    #[test]
    fn test_disabled_publisher_is_ready_and_noops() {
        let publisher = Publisher::Disabled;
        assert!(publisher.is_ready());
        publisher.enqueue(TelemetryEntry::new(Level::Info, "ignored"));
        publisher.flush();
        publisher.close();
        assert!(publisher.metrics().is_none());
    }
}
