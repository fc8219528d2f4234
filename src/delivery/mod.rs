//! Delivery of buffered batches to the remote collectors
//!
//! The pipeline has exactly two destinations: log ingestion and metric
//! ingestion. A `DeliveryClient` sends one batch per call and reports
//! success or failure; retrying is the buffer's business.

#[cfg(feature = "http")]
pub mod http;
pub mod token;

use crate::core::{LogEntry, PerformanceMetric, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;

#[cfg(feature = "http")]
pub use http::HttpDeliveryClient;
pub use token::{FileTokenStore, MemoryTokenStore, TokenProvider};

/// Transport for batches bound for the collectors
///
/// # Example
///
/// ```no_run
/// use session_telemetry::core::{LogEntry, PerformanceMetric, Result};
/// use session_telemetry::delivery::DeliveryClient;
/// use async_trait::async_trait;
///
/// struct StdoutClient;
///
/// #[async_trait]
/// impl DeliveryClient for StdoutClient {
///     async fn send_logs(&self, logs: &[LogEntry]) -> Result<()> {
///         println!("{}", serde_json::to_string(logs)?);
///         Ok(())
///     }
///
///     async fn send_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()> {
///         println!("{}", serde_json::to_string(metrics)?);
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "stdout"
///     }
/// }
/// ```
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver a batch of log entries as a single request
    async fn send_logs(&self, logs: &[LogEntry]) -> Result<()>;

    /// Deliver a batch of metrics as a single request
    async fn send_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()>;

    /// Get the client name
    fn name(&self) -> &str;
}

/// Which collector a batch is bound for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Logs,
    Metrics,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Logs => "logs",
            BatchKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry type that can be buffered and delivered in batches
pub trait Deliverable: Send + Sync + 'static + Sized {
    const KIND: BatchKind;

    fn deliver<'a>(client: &'a dyn DeliveryClient, batch: &'a [Self]) -> BoxFuture<'a, Result<()>>;
}

impl Deliverable for LogEntry {
    const KIND: BatchKind = BatchKind::Logs;

    fn deliver<'a>(client: &'a dyn DeliveryClient, batch: &'a [Self]) -> BoxFuture<'a, Result<()>> {
        client.send_logs(batch)
    }
}

impl Deliverable for PerformanceMetric {
    const KIND: BatchKind = BatchKind::Metrics;

    fn deliver<'a>(client: &'a dyn DeliveryClient, batch: &'a [Self]) -> BoxFuture<'a, Result<()>> {
        client.send_metrics(batch)
    }
}

/// Request body for the log collector: `{ "logs": [...] }`
#[derive(Debug, Serialize)]
pub struct LogBatch<'a> {
    pub logs: &'a [LogEntry],
}

/// Request body for the metric collector: `{ "metrics": [...] }`
#[derive(Debug, Serialize)]
pub struct MetricBatch<'a> {
    pub metrics: &'a [PerformanceMetric],
}
