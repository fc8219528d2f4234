//! Core pipeline types: entries, buffers, session and the `Telemetry` handle

pub mod buffer;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod log_entry;
pub mod log_level;
pub mod metric;
pub mod payload;
pub mod session;
pub mod spawner;
pub mod stats;
pub mod telemetry;

pub use buffer::{EntryBuffer, FlushOutcome, LogBuffer, MetricBuffer};
pub use config::{TelemetryConfig, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_FLUSH_THRESHOLD};
pub use connectivity::Connectivity;
pub use error::{Result, TelemetryError};
pub use log_entry::{CapturedError, LogEntry};
pub use log_level::LogLevel;
pub use metric::PerformanceMetric;
pub use payload::{FieldValue, Payload};
pub use session::{generate_session_id, SessionManager};
pub use spawner::TaskSpawner;
pub use stats::PipelineStats;
pub use telemetry::{FlushReport, Telemetry, TelemetryBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
