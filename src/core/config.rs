//! Pipeline configuration

use super::error::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffer length that triggers an automatic flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50;

/// Collector base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5005";

/// Environment variable overriding the collector base URL
pub const BASE_URL_ENV: &str = "TELEMETRY_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Collector origin, e.g. `https://api.example.com`
    pub base_url: String,

    /// Path of the log ingestion endpoint
    pub logs_path: String,

    /// Path of the metric ingestion endpoint
    pub metrics_path: String,

    /// Queue length at which a buffer flushes itself
    pub flush_threshold: usize,

    /// Per-request timeout; `None` leaves it to the transport
    pub request_timeout_ms: Option<u64>,

    /// Echo every producer call as a local `tracing` event
    pub console_echo: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            logs_path: "/api/monitoring/logs".to_string(),
            metrics_path: "/api/monitoring/metrics".to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            request_timeout_ms: None,
            console_echo: true,
        }
    }
}

impl TelemetryConfig {
    /// Defaults, with the base URL taken from `TELEMETRY_API_URL` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        config
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_console_echo(mut self, enabled: bool) -> Self {
        self.console_echo = enabled;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn logs_url(&self) -> String {
        join_url(&self.base_url, &self.logs_path)
    }

    pub fn metrics_url(&self) -> String {
        join_url(&self.base_url, &self.metrics_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(TelemetryError::config(
                "TelemetryConfig",
                "flush_threshold must be at least 1",
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(TelemetryError::config("TelemetryConfig", "base_url is empty"));
        }
        if !self.logs_path.starts_with('/') || !self.metrics_path.starts_with('/') {
            return Err(TelemetryError::config(
                "TelemetryConfig",
                "endpoint paths must start with '/'",
            ));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
