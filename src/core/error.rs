//! Error types for the telemetry pipeline

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Persisted level code does not map to a runtime level
    #[error("Config level {value} does not correspond to a logging level")]
    UnknownConfigLevel { value: u32 },

    /// No live connection available in the delivery pool
    #[error("No collector connection available")]
    NoConnection,

    /// Collector rejected the request
    #[error("Collector '{url}' returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Transport-level request failure
    #[error("Transport error for '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// Publisher has no shipper configured
    #[error("No shipper configured for delivery")]
    ShipperUnavailable,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TelemetryError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        TelemetryError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        TelemetryError::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Create a transport error
    pub fn transport(url: impl Into<String>, source: ureq::Error) -> Self {
        TelemetryError::Transport {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Other(msg.into())
    }
}
