//! Core telemetry pipeline types

pub mod config;
pub mod enricher;
pub mod entry;
pub mod error;
pub mod history;
pub mod level;
pub mod metrics;
pub mod publisher;
pub mod telemetry;

pub use config::{
    sanitize_telemetry_string, telemetry_override, TelemetryConfig, TELEMETRY_CONFIG_FILENAME,
};
pub use enricher::{Enricher, STACK_MESSAGE_PREFIX};
pub use entry::{FieldValue, TelemetryEntry};
pub use error::{Result, TelemetryError};
pub use history::{HistoryWriter, LogHistoryBuffer};
pub use level::Level;
pub use metrics::TelemetryMetrics;
pub use publisher::{
    AsyncPublisher, Publisher, Shipper, DEFAULT_CHANNEL_DEPTH, DEFAULT_MAX_QUEUE_DEPTH,
};
pub use telemetry::{
    ShipperFactory, TelemetryOperation, TelemetryState, LOG_BUFFER_DEPTH,
};
