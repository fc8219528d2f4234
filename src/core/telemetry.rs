//! The telemetry pipeline instance
//!
//! One `Telemetry` is built at application start and handed (cloned) to
//! whatever produces logs and metrics. It owns the session, the connectivity
//! flag and both buffers.

use super::{
    buffer::{FlushOutcome, LogBuffer, MetricBuffer},
    config::TelemetryConfig,
    connectivity::Connectivity,
    error::Result,
    log_entry::{CapturedError, LogEntry},
    log_level::LogLevel,
    metric::PerformanceMetric,
    payload::Payload,
    session::SessionManager,
    spawner::TaskSpawner,
    stats::PipelineStats,
};
use crate::delivery::{DeliveryClient, MemoryTokenStore, TokenProvider};
use crate::platform::{Platform, StaticPlatform};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Default time allowed for the final flush and in-flight deliveries on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of flushing both buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub logs: FlushOutcome,
    pub metrics: FlushOutcome,
}

impl FlushReport {
    /// Total entries accepted by the collectors
    pub fn delivered(&self) -> usize {
        [self.logs, self.metrics]
            .iter()
            .filter_map(|o| match o {
                FlushOutcome::Delivered(n) => Some(*n),
                _ => None,
            })
            .sum()
    }
}

impl fmt::Display for FlushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "logs: {}, metrics: {}", self.logs, self.metrics)
    }
}

struct TelemetryInner {
    config: TelemetryConfig,
    session: SessionManager,
    connectivity: Connectivity,
    logs: LogBuffer,
    metrics: MetricBuffer,
    client: Arc<dyn DeliveryClient>,
    platform: Arc<dyn Platform>,
    spawner: TaskSpawner,
    stats: Arc<PipelineStats>,
}

/// Handle to the telemetry pipeline. Cheap to clone.
///
/// # Example
///
/// ```no_run
/// use session_telemetry::prelude::*;
///
/// # async fn run() -> Result<()> {
/// let telemetry = Telemetry::builder()
///     .config(TelemetryConfig::from_env())
///     .init()?;
///
/// telemetry.set_user_id("user-42");
/// telemetry.log_info("Dashboard opened", None);
/// telemetry.track_api_call("/api/events", "GET", 182.0, 200);
///
/// telemetry.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

impl Telemetry {
    /// Create a builder for Telemetry
    #[must_use]
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::new()
    }

    pub fn session_id(&self) -> &str {
        self.inner.session.session_id()
    }

    /// Attach an authenticated user to every entry created from now on
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.inner.session.set_user_id(user_id);
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.session.user_id()
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.inner.logs
    }

    pub fn metrics(&self) -> &MetricBuffer {
        &self.inner.metrics
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.inner.stats
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.spawner.spawn(future);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Payload>) {
        self.record_log(level, message.into(), data, None);
    }

    #[inline]
    pub fn log_debug(&self, message: impl Into<String>, data: Option<Payload>) {
        self.log(LogLevel::Debug, message, data);
    }

    #[inline]
    pub fn log_info(&self, message: impl Into<String>, data: Option<Payload>) {
        self.log(LogLevel::Info, message, data);
    }

    #[inline]
    pub fn log_warn(&self, message: impl Into<String>, data: Option<Payload>) {
        self.log(LogLevel::Warn, message, data);
    }

    /// Record an ERROR entry.
    ///
    /// Besides being buffered, the entry is sent on its own right away when
    /// online. That send is not awaited and its failure is only logged.
    pub fn log_error(
        &self,
        message: impl Into<String>,
        error: Option<CapturedError>,
        data: Option<Payload>,
    ) {
        self.record_log(LogLevel::Error, message.into(), data, error);
    }

    /// Record an ERROR entry that is only buffered, never sent on its own.
    ///
    /// Used from the panic hook, where a send that panics would report
    /// itself again.
    pub(crate) fn log_error_buffered(
        &self,
        message: impl Into<String>,
        error: Option<CapturedError>,
        data: Option<Payload>,
    ) {
        let entry = self.build_log(LogLevel::Error, message.into(), data, error);
        self.inner.logs.append(entry);
    }

    /// Record a named numeric measurement
    pub fn track_metric(&self, name: impl Into<String>, value: f64, data: Option<Payload>) {
        let metric = PerformanceMetric::new(name, value, self.session_id())
            .with_user(self.user_id())
            .with_data(data);

        if self.inner.config.console_echo {
            tracing::debug!(
                target: "session_telemetry::console",
                data = %metric.additional_data().map(Payload::format_fields).unwrap_or_default(),
                "[Metric] {}: {}",
                metric.name(),
                metric.value()
            );
        }

        self.inner.metrics.append(metric);
    }

    /// Record a user interaction as an INFO log and a `user_action` metric
    pub fn track_user_action(&self, action: &str, data: Option<Payload>) {
        self.log_info(format!("User Action: {}", action), data.clone());

        let mut payload = Payload::new().with_field("action", action);
        if let Some(data) = data {
            payload.merge(data);
        }
        self.track_metric("user_action", 1.0, Some(payload));
    }

    /// Record the duration of an API call; failed calls also log a warning
    pub fn track_api_call(&self, endpoint: &str, method: &str, duration_ms: f64, status: u16) {
        self.track_metric(
            "api_call_duration",
            duration_ms,
            Some(
                Payload::new()
                    .with_field("endpoint", endpoint)
                    .with_field("method", method)
                    .with_field("status", status),
            ),
        );

        if status >= 400 {
            self.log_warn(
                format!("API Error: {} {}", method, endpoint),
                Some(
                    Payload::new()
                        .with_field("status", status)
                        .with_field("duration", duration_ms),
                ),
            );
        }
    }

    /// Flush both buffers and wait for the outcome
    pub async fn flush(&self) -> FlushReport {
        let (logs, metrics) = futures::join!(self.inner.logs.flush(), self.inner.metrics.flush());
        FlushReport { logs, metrics }
    }

    /// Flush both buffers in the background
    pub fn request_flush(&self) {
        self.inner.logs.request_flush();
        self.inner.metrics.request_flush();
    }

    /// Wait for every background delivery started so far
    pub async fn wait_idle(&self) {
        self.inner.spawner.wait_idle().await;
    }

    /// Final flush, then wait for in-flight deliveries.
    ///
    /// Returns `true` if everything finished within `timeout`. Entries still
    /// queued afterwards (offline, or the collector kept failing) are lost
    /// when the process exits.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let start = Instant::now();

        let flushed = match tokio::time::timeout(timeout, self.flush()).await {
            Ok(report) => {
                tracing::debug!(%report, "Final flush finished");
                true
            }
            Err(_) => false,
        };

        let remaining = timeout.saturating_sub(start.elapsed());
        let idle = flushed && self.inner.spawner.wait_idle_timeout(remaining).await;

        if !idle {
            tracing::warn!(
                in_flight = self.inner.spawner.in_flight(),
                "Deliveries did not finish within {:?}, some entries may be lost",
                timeout
            );
        }

        let pending = self.inner.logs.len() + self.inner.metrics.len();
        if pending > 0 {
            tracing::warn!(
                pending,
                failure_rate = self.inner.stats.failure_rate(),
                "Telemetry shutting down with undelivered entries"
            );
        }

        idle
    }

    fn build_log(
        &self,
        level: LogLevel,
        message: String,
        data: Option<Payload>,
        error: Option<CapturedError>,
    ) -> LogEntry {
        let entry = LogEntry::new(level, message, self.session_id())
            .with_user(self.user_id())
            .with_page(
                self.inner.platform.current_url(),
                self.inner.platform.user_agent(),
            )
            .with_data(data)
            .with_error(error);

        if self.inner.config.console_echo {
            echo(&entry);
        }
        entry
    }

    fn record_log(
        &self,
        level: LogLevel,
        message: String,
        data: Option<Payload>,
        error: Option<CapturedError>,
    ) {
        let entry = self.build_log(level, message, data, error);
        let immediate = (level.is_severe() && self.is_online()).then(|| entry.clone());
        self.inner.logs.append(entry);

        if let Some(entry) = immediate {
            self.send_immediately(entry);
        }
    }

    fn send_immediately(&self, entry: LogEntry) {
        self.inner.stats.record_immediate();
        let client = Arc::clone(&self.inner.client);

        self.spawn(async move {
            if let Err(e) = client.send_logs(std::slice::from_ref(&entry)).await {
                tracing::warn!(error = %e, "Failed to send error entry immediately");
            }
        });
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("session_id", &self.session_id())
            .field("online", &self.is_online())
            .field("queued_logs", &self.inner.logs.len())
            .field("queued_metrics", &self.inner.metrics.len())
            .finish()
    }
}

fn echo(entry: &LogEntry) {
    let data = entry.data().map(Payload::format_fields).unwrap_or_default();

    match entry.level() {
        LogLevel::Debug => {
            tracing::debug!(target: "session_telemetry::console", %data, "[Debug] {}", entry.message())
        }
        LogLevel::Info => {
            tracing::info!(target: "session_telemetry::console", %data, "[Info] {}", entry.message())
        }
        LogLevel::Warn => {
            tracing::warn!(target: "session_telemetry::console", %data, "[Warning] {}", entry.message())
        }
        LogLevel::Error => {
            let error = entry.error().map(ToString::to_string).unwrap_or_default();
            tracing::error!(
                target: "session_telemetry::console",
                %data,
                %error,
                "[Error] {}",
                entry.message()
            )
        }
    }
}

/// Builder for constructing Telemetry with a fluent API
///
/// # Example
/// ```no_run
/// use session_telemetry::prelude::*;
/// use std::sync::Arc;
///
/// # fn build() -> Result<Telemetry> {
/// let platform = StaticPlatform::new("https://app.example.com/", "my-app/1.0");
/// let telemetry = Telemetry::builder()
///     .config(TelemetryConfig::default().with_flush_threshold(20))
///     .platform(Arc::new(platform))
///     .tokens(Arc::new(MemoryTokenStore::with_token("jwt")))
///     .init()?;
/// # Ok(telemetry)
/// # }
/// ```
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    client: Option<Arc<dyn DeliveryClient>>,
    platform: Option<Arc<dyn Platform>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    session_id: Option<String>,
    runtime: Option<Handle>,
}

impl TelemetryBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::default(),
            client: None,
            platform: None,
            tokens: None,
            session_id: None,
            runtime: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom delivery client instead of HTTP
    #[must_use = "builder methods return a new value"]
    pub fn client<C: DeliveryClient + 'static>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Use a delivery client the caller keeps a handle to
    #[must_use = "builder methods return a new value"]
    pub fn shared_client(mut self, client: Arc<dyn DeliveryClient>) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Token source for the default HTTP client
    #[must_use = "builder methods return a new value"]
    pub fn tokens(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Fix the session identifier instead of generating one
    #[must_use = "builder methods return a new value"]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Runtime that background deliveries run on.
    ///
    /// Defaults to the runtime `init` is called from.
    #[must_use = "builder methods return a new value"]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validate the configuration and start the pipeline
    pub fn init(self) -> Result<Telemetry> {
        self.config.validate()?;

        let spawner = match self.runtime {
            Some(handle) => TaskSpawner::new(handle),
            None => TaskSpawner::current()?,
        };

        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let client = match self.client {
            Some(client) => client,
            None => default_client(&self.config, tokens)?,
        };

        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(StaticPlatform::default()));

        let session = match self.session_id {
            Some(id) => SessionManager::with_session_id(id),
            None => SessionManager::new(),
        };

        let connectivity = Connectivity::new(platform.is_online());
        let stats = Arc::new(PipelineStats::new());

        let logs = LogBuffer::new(
            self.config.flush_threshold,
            Arc::clone(&client),
            connectivity.clone(),
            spawner.clone(),
            Arc::clone(&stats),
        );
        let metrics = MetricBuffer::new(
            self.config.flush_threshold,
            Arc::clone(&client),
            connectivity.clone(),
            spawner.clone(),
            Arc::clone(&stats),
        );

        tracing::debug!(
            session_id = session.session_id(),
            client = client.name(),
            online = connectivity.is_online(),
            "Telemetry pipeline started"
        );

        Ok(Telemetry {
            inner: Arc::new(TelemetryInner {
                config: self.config,
                session,
                connectivity,
                logs,
                metrics,
                client,
                platform,
                spawner,
                stats,
            }),
        })
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
fn default_client(
    config: &TelemetryConfig,
    tokens: Arc<dyn TokenProvider>,
) -> Result<Arc<dyn DeliveryClient>> {
    Ok(Arc::new(crate::delivery::HttpDeliveryClient::new(config, tokens)?))
}

#[cfg(not(feature = "http"))]
fn default_client(
    _config: &TelemetryConfig,
    _tokens: Arc<dyn TokenProvider>,
) -> Result<Arc<dyn DeliveryClient>> {
    Err(super::error::TelemetryError::config(
        "TelemetryBuilder",
        "a delivery client is required when the `http` feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldValue, TelemetryError};
    use crate::testing::RecordingClient;

    fn pipeline(client: &Arc<RecordingClient>, online: bool) -> Telemetry {
        Telemetry::builder()
            .config(TelemetryConfig::default().with_console_echo(false))
            .shared_client(client.clone())
            .platform(Arc::new(
                StaticPlatform::new("https://app.test/home", "test-agent").with_online(online),
            ))
            .init()
            .unwrap()
    }

    #[tokio::test]
    async fn test_entries_carry_session_user_and_page() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.log_info("before login", None);
        telemetry.set_user_id("u-1");
        telemetry.log_warn("after login", Some(Payload::new().with_field("k", "v")));

        let logs = telemetry.logs().snapshot();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].user_id(), None);
        assert_eq!(logs[1].user_id(), Some("u-1"));
        assert!(logs.iter().all(|e| e.session_id() == telemetry.session_id()));
        assert_eq!(logs[1].url(), "https://app.test/home");
        assert_eq!(logs[1].user_agent(), "test-agent");
    }

    #[tokio::test]
    async fn test_error_is_buffered_and_sent_immediately() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.log_info("noise", None);
        telemetry.log_error("checkout failed", Some(CapturedError::new("card declined")), None);
        telemetry.wait_idle().await;

        let batches = client.log_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].message(), "checkout failed");
        assert_eq!(telemetry.logs().len(), 2);
        assert_eq!(telemetry.stats().immediate_deliveries(), 1);
    }

    #[tokio::test]
    async fn test_error_while_offline_is_only_buffered() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, false);

        telemetry.log_error("offline failure", None, None);
        telemetry.wait_idle().await;

        assert_eq!(client.log_calls(), 0);
        assert_eq!(telemetry.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_immediate_send_keeps_buffered_copy() {
        let client = Arc::new(RecordingClient::new());
        client.set_failing(true);
        let telemetry = pipeline(&client, true);

        telemetry.log_error("lost?", None, None);
        telemetry.wait_idle().await;

        assert_eq!(client.log_calls(), 1);
        assert_eq!(telemetry.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_track_user_action() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.track_user_action("share_event", Some(Payload::new().with_field("event_id", 9)));

        let logs = telemetry.logs().snapshot();
        assert_eq!(logs[0].message(), "User Action: share_event");
        assert_eq!(logs[0].level(), LogLevel::Info);

        let metrics = telemetry.metrics().snapshot();
        assert_eq!(metrics[0].name(), "user_action");
        assert_eq!(metrics[0].value(), 1.0);
        let data = metrics[0].additional_data().unwrap();
        assert_eq!(data.get("action"), Some(&FieldValue::from("share_event")));
        assert_eq!(data.get("event_id"), Some(&FieldValue::Int(9)));
    }

    #[tokio::test]
    async fn test_track_api_call_warns_on_failure_status() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.track_api_call("/api/events", "GET", 120.0, 200);
        assert_eq!(telemetry.logs().len(), 0);

        telemetry.track_api_call("/api/events", "POST", 340.0, 500);
        let logs = telemetry.logs().snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level(), LogLevel::Warn);
        assert_eq!(logs[0].message(), "API Error: POST /api/events");

        let metrics = telemetry.metrics().snapshot();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.name() == "api_call_duration"));
        assert_eq!(
            metrics[1].additional_data().and_then(|d| d.get("status")),
            Some(&FieldValue::Int(500))
        );
    }

    #[tokio::test]
    async fn test_flush_reports_both_buffers() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.log_info("one", None);
        telemetry.track_metric("lcp", 1800.0, None);
        telemetry.track_metric("fid", 12.0, None);

        let report = telemetry.flush().await;
        assert_eq!(report.logs, FlushOutcome::Delivered(1));
        assert_eq!(report.metrics, FlushOutcome::Delivered(2));
        assert_eq!(report.delivered(), 3);

        let report = telemetry.flush().await;
        assert_eq!(report.logs, FlushOutcome::SkippedEmpty);
    }

    #[tokio::test]
    async fn test_shutdown_delivers_pending_entries() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = pipeline(&client, true);

        telemetry.track_metric("page_load_time", 950.0, None);
        assert!(telemetry.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await);
        assert_eq!(client.metric_calls(), 1);
        assert!(telemetry.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_times_out_on_stuck_delivery() {
        let client = Arc::new(RecordingClient::new());
        client.hold_deliveries(true);
        let telemetry = pipeline(&client, true);

        telemetry.track_metric("cls", 0.02, None);
        assert!(!telemetry.shutdown(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_wait_idle_completes_after_shutdown_timeout() {
        let client = Arc::new(RecordingClient::new());
        client.hold_deliveries(true);
        let telemetry = pipeline(&client, true);

        telemetry.track_metric("lcp", 1800.0, None);
        telemetry.request_flush();
        client.wait_for_delivery().await;

        let waiter = {
            let telemetry = telemetry.clone();
            tokio::spawn(async move { telemetry.wait_idle().await })
        };
        tokio::task::yield_now().await;

        assert!(!telemetry.shutdown(Duration::from_millis(30)).await);
        client.release_delivery();

        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait_idle never returned")
            .unwrap();
        assert_eq!(client.metric_calls(), 1);
    }

    #[tokio::test]
    async fn test_fixed_session_id() {
        let client = Arc::new(RecordingClient::new());
        let telemetry = Telemetry::builder()
            .shared_client(client)
            .session_id("fixed-session")
            .init()
            .unwrap();
        assert_eq!(telemetry.session_id(), "fixed-session");
    }

    #[test]
    fn test_init_requires_runtime() {
        let err = Telemetry::builder()
            .client(RecordingClient::new())
            .init()
            .unwrap_err();
        assert!(matches!(err, TelemetryError::NoRuntime(_)));
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let err = Telemetry::builder()
            .config(TelemetryConfig::default().with_flush_threshold(0))
            .client(RecordingClient::new())
            .init()
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidConfiguration { .. }));
    }
}
