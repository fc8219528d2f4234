//! Error types for the telemetry pipeline

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Network or transport failure while delivering a batch
    #[error("Delivery to '{endpoint}' failed: {message}")]
    DeliveryFailed { endpoint: String, message: String },

    /// Collector answered with a non-success status
    #[error("Collector at '{endpoint}' rejected batch with status {status}")]
    DeliveryRejected { endpoint: String, status: u16 },

    /// Performance stream registration failed
    #[error("Failed to observe '{stream}' performance entries: {message}")]
    InstrumentationSetup { stream: String, message: String },

    /// No performance instrumentation is available on this platform
    #[error("Performance instrumentation is unavailable")]
    InstrumentationUnavailable,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Pipeline constructed outside of an async runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP client error
    #[cfg(feature = "http")]
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TelemetryError {
    /// Create a delivery failure for an endpoint
    pub fn delivery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        TelemetryError::DeliveryFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a rejection error carrying the collector's status code
    pub fn rejected(endpoint: impl Into<String>, status: u16) -> Self {
        TelemetryError::DeliveryRejected {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Create an instrumentation setup error
    pub fn instrumentation(stream: impl Into<String>, message: impl Into<String>) -> Self {
        TelemetryError::InstrumentationSetup {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        TelemetryError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Other(msg.into())
    }

    /// Whether this error came from an attempt to reach the collector
    pub fn is_delivery_failure(&self) -> bool {
        match self {
            TelemetryError::DeliveryFailed { .. } | TelemetryError::DeliveryRejected { .. } => true,
            #[cfg(feature = "http")]
            TelemetryError::HttpError(_) => true,
            _ => false,
        }
    }
}
