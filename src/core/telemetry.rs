//! Telemetry facade
//!
//! Composes the history buffer, enricher and async publisher behind the
//! small surface the logging layer consumes. Telemetry events are formatted
//! as `/Category/Identifier`.

use parking_lot::RwLock;
use std::io::Write;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::config::TelemetryConfig;
use super::enricher::Enricher;
use super::entry::{FieldValue, TelemetryEntry};
use super::error::Result;
use super::history::{HistoryWriter, LogHistoryBuffer};
use super::level::Level;
use super::metrics::TelemetryMetrics;
use super::publisher::{AsyncPublisher, Publisher, Shipper};
use super::publisher::{DEFAULT_CHANNEL_DEPTH, DEFAULT_MAX_QUEUE_DEPTH};

const TELEMETRY_PREFIX: &str = "/";
const TELEMETRY_SEPARATOR: &str = "/";

/// Depth of the log history window attached to high-severity events
pub const LOG_BUFFER_DEPTH: usize = 2;

/// Builds a shipper for a given configuration; called at startup and again
/// on every live URI update.
pub type ShipperFactory = Box<dyn Fn(&TelemetryConfig) -> Result<Box<dyn Shipper>> + Send + Sync>;

/// Telemetry state consumed by the logging layer
pub struct TelemetryState {
    history: Arc<LogHistoryBuffer>,
    publisher: Publisher,
    config: RwLock<TelemetryConfig>,
    factory: ShipperFactory,
    instance_name: String,
}

impl TelemetryState {
    /// Set up telemetry for `cfg`.
    ///
    /// With `enable` unset this yields a disabled, always-ready no-op
    /// publisher. With it set, a missing URI leaves the publisher unready
    /// and queueing until a live URI update supplies a destination; a
    /// factory failure for a configured URI is returned as an error.
    pub fn new(mut cfg: TelemetryConfig, factory: ShipperFactory) -> Result<Self> {
        let history = Arc::new(LogHistoryBuffer::new(LOG_BUFFER_DEPTH));

        let publisher = if cfg.enable {
            if cfg.session_guid.is_empty() {
                cfg.session_guid = Uuid::new_v4().to_string();
            }
            let shipper = if cfg.uri.is_empty() {
                None
            } else {
                Some(factory(&cfg)?)
            };
            let enricher = Enricher::from_config(&cfg, Arc::clone(&history));
            Publisher::Live(AsyncPublisher::new(
                enricher,
                shipper,
                DEFAULT_CHANNEL_DEPTH,
                DEFAULT_MAX_QUEUE_DEPTH,
            ))
        } else {
            Publisher::Disabled
        };

        let instance_name = cfg.instance_name();
        Ok(Self {
            history,
            publisher,
            config: RwLock::new(cfg),
            factory,
            instance_name,
        })
    }

    /// Wrap the logger's output writer so the history buffer keeps the tail
    /// of the local log for attachment to high-severity events.
    pub fn wrap_output<W: Write>(&self, sink: W) -> HistoryWriter<W> {
        self.history.wrap_output(sink)
    }

    pub fn history(&self) -> &Arc<LogHistoryBuffer> {
        &self.history
    }

    /// Record a telemetry event.
    pub fn log_event(
        &self,
        category: &str,
        identifier: &str,
        details: Option<serde_json::Value>,
    ) {
        self.log_telemetry(build_message(&[category, identifier]), details, Vec::new());
    }

    /// Record a metrics observation; a `None` payload is a no-op.
    pub fn log_metrics(
        &self,
        category: &str,
        identifier: &str,
        metrics: Option<serde_json::Value>,
    ) {
        let Some(metrics) = metrics else { return };
        self.log_telemetry(
            build_message(&[category, identifier]),
            None,
            vec![("metrics".to_string(), FieldValue::Json(metrics))],
        );
    }

    /// Record the start of an operation and return a handle that records the
    /// matching stop, with its duration, exactly once.
    pub fn start_operation(&self, category: &str, identifier: &str) -> TelemetryOperation {
        self.log_telemetry(build_message(&[category, identifier, "Start"]), None, Vec::new());
        TelemetryOperation {
            start: Instant::now(),
            category: category.to_string(),
            identifier: identifier.to_string(),
            pending: AtomicI32::new(1),
        }
    }

    fn log_telemetry(
        &self,
        message: String,
        details: Option<serde_json::Value>,
        extra_fields: Vec<(String, FieldValue)>,
    ) {
        let (mut entry, send_to_log) = {
            let cfg = self.config.read();
            let mut entry = TelemetryEntry::new(Level::Info, message)
                .with_field("session", cfg.session_guid.clone())
                .with_field("instanceName", self.instance_name.clone())
                .with_field("v", cfg.version.clone());
            if let Some(details) = details {
                entry = entry.with_field("details", FieldValue::Json(details));
            }
            (entry, cfg.send_to_log)
        };
        for (key, value) in extra_fields {
            entry.fields.insert(key, value);
        }

        if send_to_log {
            info!(target: "telemetry", "{}", entry.message);
        }
        self.publisher.enqueue(entry);
    }

    /// Reconfigure the collector URI without losing in-flight data.
    ///
    /// The new shipper is built and installed before the worker is woken, so
    /// it never drains against a stale endpoint. On failure the previous
    /// configuration stays active and the error is returned.
    pub fn update_uri(&self, uri: impl Into<String>) -> Result<()> {
        let Publisher::Live(publisher) = &self.publisher else {
            return Ok(());
        };

        let mut cfg = self.config.write();
        let mut candidate = cfg.clone();
        candidate.uri = uri.into();

        let shipper = (self.factory)(&candidate)?;
        publisher.set_shipper(shipper);
        *cfg = candidate;
        drop(cfg);

        publisher.notify_uri_updated();
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.publisher.is_ready()
    }

    pub fn metrics(&self) -> Option<Arc<TelemetryMetrics>> {
        self.publisher.metrics()
    }

    pub fn config(&self) -> TelemetryConfig {
        self.config.read().clone()
    }

    /// Block until all previously enqueued events are processed.
    pub fn flush(&self) {
        self.publisher.flush();
    }

    /// Shut down the publisher, discarding pending events.
    pub fn close(&self) {
        self.publisher.close();
    }
}

/// Context for an ongoing operation started via
/// [`TelemetryState::start_operation`]
pub struct TelemetryOperation {
    start: Instant,
    category: String,
    identifier: String,
    pending: AtomicI32,
}

impl TelemetryOperation {
    /// Record the operation stop with its duration. Repeated calls are
    /// no-ops.
    pub fn stop(&self, state: &TelemetryState, details: Option<serde_json::Value>) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        let duration_ms = self.start.elapsed().as_millis() as i64;
        state.log_telemetry(
            build_message(&[&self.category, &self.identifier, "Stop"]),
            details,
            vec![("duration".to_string(), FieldValue::Int(duration_ms))],
        );
    }
}

fn build_message(parts: &[&str]) -> String {
    let mut message = String::from(TELEMETRY_PREFIX);
    message.push_str(&parts.join(TELEMETRY_SEPARATOR));
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message() {
        assert_eq!(build_message(&["Network", "ConnectPeer"]), "/Network/ConnectPeer");
        assert_eq!(
            build_message(&["Agreement", "Round", "Start"]),
            "/Agreement/Round/Start"
        );
    }

    #[test]
    fn test_disabled_state_is_ready() {
        let cfg = TelemetryConfig::new();
        let state = TelemetryState::new(
            cfg,
            Box::new(|_| Err(crate::core::error::TelemetryError::other("unused"))),
        )
        .unwrap();

        assert!(state.is_ready());
        state.log_event("Cat", "Event", None);
        state.flush();
        state.close();
    }

    #[test]
    fn test_enabled_without_uri_is_unready() {
        let mut cfg = TelemetryConfig::new();
        cfg.enable = true;
        let state = TelemetryState::new(
            cfg,
            Box::new(|_| Err(crate::core::error::TelemetryError::other("should not be called"))),
        )
        .unwrap();

        assert!(!state.is_ready());
        state.close();
    }

    #[test]
    fn test_factory_error_surfaces() {
        let mut cfg = TelemetryConfig::new();
        cfg.enable = true;
        cfg.uri = "http://collector:9200".to_string();
        let result = TelemetryState::new(
            cfg,
            Box::new(|_| Err(crate::core::error::TelemetryError::other("refused"))),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_session_guid_generated_when_blank() {
        let mut cfg = TelemetryConfig::new();
        cfg.enable = true;
        let state = TelemetryState::new(
            cfg,
            Box::new(|_| Err(crate::core::error::TelemetryError::other("unused"))),
        )
        .unwrap();

        assert!(!state.config().session_guid.is_empty());
        state.close();
    }
}
