//! HTTP delivery client
//!
//! Posts batches as JSON to the log and metric ingestion endpoints.

use super::token::TokenProvider;
use super::{DeliveryClient, LogBatch, MetricBatch};
use crate::core::{LogEntry, PerformanceMetric, Result, TelemetryConfig, TelemetryError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

/// Delivery client that POSTs `{ logs }` / `{ metrics }` bodies
///
/// # Example
///
/// ```no_run
/// use session_telemetry::core::TelemetryConfig;
/// use session_telemetry::delivery::{HttpDeliveryClient, MemoryTokenStore};
/// use std::sync::Arc;
///
/// let config = TelemetryConfig::default();
/// let client = HttpDeliveryClient::new(&config, Arc::new(MemoryTokenStore::new()))
///     .expect("Failed to build HTTP client");
/// ```
pub struct HttpDeliveryClient {
    client: Client,
    logs_url: String,
    metrics_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpDeliveryClient {
    pub fn new(config: &TelemetryConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            logs_url: config.logs_url(),
            metrics_url: config.metrics_url(),
            tokens,
        })
    }

    pub fn logs_url(&self) -> &str {
        &self.logs_url
    }

    pub fn metrics_url(&self) -> &str {
        &self.metrics_url
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = self.tokens.token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TelemetryError::delivery(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::rejected(url, status.as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send_logs(&self, logs: &[LogEntry]) -> Result<()> {
        self.post(&self.logs_url, &LogBatch { logs }).await
    }

    async fn send_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()> {
        self.post(&self.metrics_url, &MetricBatch { metrics }).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::delivery::MemoryTokenStore;

    #[test]
    fn test_urls_from_config() {
        let config = TelemetryConfig::default().with_base_url("https://collector.test/");
        let client = HttpDeliveryClient::new(&config, Arc::new(MemoryTokenStore::new())).unwrap();

        assert_eq!(client.logs_url(), "https://collector.test/api/monitoring/logs");
        assert_eq!(client.metrics_url(), "https://collector.test/api/monitoring/metrics");
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_a_delivery_failure() {
        // Nothing listens on port 9 of localhost
        let config = TelemetryConfig::default().with_base_url("http://127.0.0.1:9");
        let client = HttpDeliveryClient::new(&config, Arc::new(MemoryTokenStore::new())).unwrap();

        let logs = vec![LogEntry::new(LogLevel::Info, "hello", "s")];
        let err = client.send_logs(&logs).await.unwrap_err();
        assert!(matches!(err, TelemetryError::DeliveryFailed { .. }));
        assert!(err.is_delivery_failure());
    }
}
