//! # Telemetry Relay
//!
//! An asynchronous, backpressure-aware telemetry event publisher: a bridge
//! between a structured, synchronous logger and a possibly-unavailable
//! remote collector.
//!
//! ## Guarantees
//!
//! - **Never blocks**: enqueueing is non-blocking; logging call sites never
//!   wait on the network
//! - **Never fails**: telemetry unavailability is invisible to callers;
//!   losses are counted, not raised
//! - **Bounded memory**: a fixed-depth pending queue evicts oldest-first
//!   under sustained overload
//! - **Live reconfiguration**: the collector URI can change at runtime
//!   without losing in-flight data

pub mod core;
pub mod delivery;

pub mod prelude {
    pub use crate::core::{
        AsyncPublisher, Enricher, FieldValue, Level, LogHistoryBuffer, Publisher, Result, Shipper,
        TelemetryConfig, TelemetryEntry, TelemetryError, TelemetryMetrics, TelemetryOperation,
        TelemetryState,
    };
    pub use crate::delivery::{Backoff, DeliveryClient};
}

pub use crate::core::{
    sanitize_telemetry_string, telemetry_override, AsyncPublisher, Enricher, FieldValue,
    HistoryWriter, Level, LogHistoryBuffer, Publisher, Result, Shipper, ShipperFactory,
    TelemetryConfig, TelemetryEntry, TelemetryError, TelemetryMetrics, TelemetryOperation,
    TelemetryState, DEFAULT_CHANNEL_DEPTH, DEFAULT_MAX_QUEUE_DEPTH, LOG_BUFFER_DEPTH,
    STACK_MESSAGE_PREFIX, TELEMETRY_CONFIG_FILENAME,
};
pub use crate::delivery::{Backoff, DeliveryClient, DeliveryClientBuilder};

/// Configure and enable telemetry for `cfg`, shipping through the built-in
/// HTTP delivery client.
///
/// With `cfg.enable` unset the returned state is a no-op facade; call sites
/// need no special casing either way.
pub fn enable_telemetry(cfg: TelemetryConfig) -> Result<TelemetryState> {
    TelemetryState::new(cfg, delivery::shipper_factory())
}
