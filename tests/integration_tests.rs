//! Integration tests for the telemetry pipeline
//!
//! These tests verify:
//! - Threshold auto-flush and optimistic clear
//! - Requeue ordering when a delivery fails
//! - Offline buffering and flush on reconnect
//! - Immediate delivery of ERROR entries
//! - Lifecycle signal routing
//! - HTTP wire format against an in-process collector

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use session_telemetry::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Collector double that records batches and can fail or stall on demand
#[derive(Default)]
struct MockCollector {
    logs: Mutex<Vec<Vec<LogEntry>>>,
    metrics: Mutex<Vec<Vec<PerformanceMetric>>>,
    failing: AtomicBool,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl MockCollector {
    fn log_messages(&self) -> Vec<Vec<String>> {
        self.logs
            .lock()
            .iter()
            .map(|batch| batch.iter().map(|e| e.message().to_string()).collect())
            .collect()
    }

    async fn outcome(&self) -> Result<()> {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(TelemetryError::delivery("mock", "collector unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeliveryClient for MockCollector {
    async fn send_logs(&self, logs: &[LogEntry]) -> Result<()> {
        self.logs.lock().push(logs.to_vec());
        self.outcome().await
    }

    async fn send_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()> {
        self.metrics.lock().push(metrics.to_vec());
        self.outcome().await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pipeline(collector: &Arc<MockCollector>, online: bool) -> Telemetry {
    init_tracing();
    Telemetry::builder()
        .config(TelemetryConfig::default().with_console_echo(false))
        .shared_client(collector.clone())
        .platform(Arc::new(
            StaticPlatform::new("https://app.test/events", "integration").with_online(online),
        ))
        .init()
        .expect("Failed to start telemetry")
}

fn queued_messages(telemetry: &Telemetry) -> Vec<String> {
    telemetry
        .logs()
        .snapshot()
        .iter()
        .map(|e| e.message().to_string())
        .collect()
}

#[tokio::test]
async fn test_threshold_triggers_single_flush() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, true);

    for i in 0..49 {
        telemetry.log_info(format!("entry {}", i), None);
    }
    telemetry.wait_idle().await;
    assert!(collector.logs.lock().is_empty(), "no flush before the 50th entry");

    telemetry.log_info("entry 49", None);
    assert!(telemetry.logs().is_empty(), "queue cleared before delivery completes");

    telemetry.wait_idle().await;
    let batches = collector.log_messages();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 50);
    assert_eq!(batches[0][0], "entry 0");
    assert_eq!(batches[0][49], "entry 49");
}

#[tokio::test]
async fn test_failed_batch_returns_ahead_of_newer_entries() {
    let collector = Arc::new(MockCollector::default());
    collector.failing.store(true, Ordering::SeqCst);
    collector.hold.store(true, Ordering::SeqCst);
    let telemetry = pipeline(&collector, true);

    for i in 0..3 {
        telemetry.log_info(format!("old {}", i), None);
    }
    telemetry.request_flush();
    collector.entered.notified().await;

    telemetry.log_info("new 0", None);
    telemetry.log_info("new 1", None);
    collector.release.notify_one();
    telemetry.wait_idle().await;

    assert_eq!(
        queued_messages(&telemetry),
        vec!["old 0", "old 1", "old 2", "new 0", "new 1"]
    );
    assert_eq!(telemetry.stats().entries_requeued(), 3);
}

#[tokio::test]
async fn test_flush_skips_when_empty_or_offline() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, true);

    let report = telemetry.flush().await;
    assert_eq!(report.logs, FlushOutcome::SkippedEmpty);
    assert_eq!(report.metrics, FlushOutcome::SkippedEmpty);

    telemetry.connectivity().set_online(false);
    telemetry.log_info("waiting", None);
    let report = telemetry.flush().await;
    assert_eq!(report.logs, FlushOutcome::SkippedOffline);

    assert!(collector.logs.lock().is_empty());
    assert!(collector.metrics.lock().is_empty());
}

#[tokio::test]
async fn test_offline_entries_flush_once_on_reconnect() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, true);
    let router = LifecycleEventRouter::new(telemetry.clone());

    router.handle(LifecycleSignal::Offline);
    for i in 0..5 {
        telemetry.log_info(format!("offline {}", i), None);
    }
    telemetry.wait_idle().await;
    assert!(collector.logs.lock().is_empty());

    router.handle(LifecycleSignal::Online);
    telemetry.wait_idle().await;

    let batches = collector.log_messages();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec!["offline 0", "offline 1", "offline 2", "offline 3", "offline 4"]
    );
}

#[tokio::test]
async fn test_retry_carries_the_same_entries() {
    let collector = Arc::new(MockCollector::default());
    collector.failing.store(true, Ordering::SeqCst);
    let telemetry = pipeline(&collector, true);

    telemetry.track_metric("lcp", 2100.0, None);
    telemetry.track_metric("fid", 16.0, None);
    let before = telemetry.metrics().snapshot();

    let report = telemetry.flush().await;
    assert_eq!(report.metrics, FlushOutcome::Requeued(2));
    assert_eq!(telemetry.metrics().len(), before.len());

    collector.failing.store(false, Ordering::SeqCst);
    let report = telemetry.flush().await;
    assert_eq!(report.metrics, FlushOutcome::Delivered(2));

    let batches = collector.metrics.lock().clone();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1], before);
    assert_eq!(batches[0], batches[1]);
}

#[tokio::test]
async fn test_error_sent_immediately_regardless_of_queue() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, true);

    for i in 0..10 {
        telemetry.log_info(format!("info {}", i), None);
    }
    telemetry.log_error(
        "render crashed",
        Some(CapturedError::new("index out of bounds").with_name("RangeError")),
        None,
    );
    telemetry.wait_idle().await;

    assert_eq!(collector.log_messages(), vec![vec!["render crashed".to_string()]]);
    assert_eq!(telemetry.logs().len(), 11);
}

#[tokio::test]
async fn test_session_id_is_stable() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, true);
    let first = telemetry.session_id().to_string();

    telemetry.set_user_id("u-7");
    telemetry.log_info("a", None);
    telemetry.track_metric("cls", 0.01, None);

    assert_eq!(telemetry.session_id(), first);
    assert_eq!(telemetry.clone().session_id(), first);
    assert!(telemetry.logs().snapshot().iter().all(|e| e.session_id() == first));
}

#[tokio::test]
async fn test_signals_over_channel() {
    let collector = Arc::new(MockCollector::default());
    let telemetry = pipeline(&collector, false);
    let router = LifecycleEventRouter::new(telemetry.clone());
    let (tx, rx) = signal_channel();
    let routing = tokio::spawn(router.run(rx));

    telemetry.log_info("queued while offline", None);
    tx.send(LifecycleSignal::Online).unwrap();
    tx.send(LifecycleSignal::UnhandledRejection(CapturedError::new("fetch aborted")))
        .unwrap();
    drop(tx);
    routing.await.unwrap();
    telemetry.wait_idle().await;

    let delivered: Vec<String> = collector.log_messages().into_iter().flatten().collect();
    assert!(delivered.contains(&"queued while offline".to_string()));
    assert!(delivered.contains(&"Unhandled Promise Rejection".to_string()));
    assert!(!telemetry.logs().snapshot().iter().any(|e| e.message() == "queued while offline"));
}

// ============================================================================
// HTTP round trip
// ============================================================================

#[derive(Default)]
struct Ingest {
    requests: Mutex<Vec<(String, Option<String>, serde_json::Value)>>,
    status: AtomicU16,
}

impl Ingest {
    fn record(&self, path: &str, headers: &HeaderMap, body: serde_json::Value) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().push((path.to_string(), auth, body));
        StatusCode::from_u16(self.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
    }
}

async fn ingest_logs(
    State(ingest): State<Arc<Ingest>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    ingest.record("logs", &headers, body)
}

async fn ingest_metrics(
    State(ingest): State<Arc<Ingest>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    ingest.record("metrics", &headers, body)
}

async fn start_collector() -> (String, Arc<Ingest>) {
    init_tracing();
    let ingest = Arc::new(Ingest::default());
    ingest.status.store(200, Ordering::SeqCst);

    let app = Router::new()
        .route("/api/monitoring/logs", post(ingest_logs))
        .route("/api/monitoring/metrics", post(ingest_metrics))
        .with_state(ingest.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind collector");
    let addr = listener.local_addr().expect("Failed to read collector address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{}", addr), ingest)
}

#[tokio::test]
async fn test_http_delivery_wire_format() {
    let (base_url, ingest) = start_collector().await;
    let telemetry = Telemetry::builder()
        .config(
            TelemetryConfig::default()
                .with_base_url(base_url)
                .with_console_echo(false),
        )
        .tokens(Arc::new(MemoryTokenStore::with_token("secret-token")))
        .platform(Arc::new(StaticPlatform::new("https://app.test/", "integration")))
        .init()
        .expect("Failed to start telemetry");

    telemetry.log_info("first", Some(Payload::new().with_field("step", 1)));
    telemetry.set_user_id("u-1");
    telemetry.log_warn("second", None);
    telemetry.track_metric("page_load_time", 830.0, None);

    let report = telemetry.flush().await;
    assert_eq!(report.logs, FlushOutcome::Delivered(2));
    assert_eq!(report.metrics, FlushOutcome::Delivered(1));

    let requests = ingest.requests.lock().clone();
    let (_, auth, logs_body) = requests.iter().find(|(p, _, _)| p == "logs").unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer secret-token"));

    let logs = logs_body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["level"], 1);
    assert_eq!(logs[0]["message"], "first");
    assert_eq!(logs[0]["data"]["step"], 1);
    assert_eq!(logs[0]["sessionId"], telemetry.session_id());
    assert_eq!(logs[0]["url"], "https://app.test/");
    assert_eq!(logs[0]["userAgent"], "integration");
    assert!(logs[0].get("userId").is_none());
    assert_eq!(logs[1]["level"], 2);
    assert_eq!(logs[1]["userId"], "u-1");

    let (_, _, metrics_body) = requests.iter().find(|(p, _, _)| p == "metrics").unwrap();
    let metrics = metrics_body["metrics"].as_array().unwrap();
    assert_eq!(metrics[0]["name"], "page_load_time");
    assert_eq!(metrics[0]["value"], 830.0);
    assert!(metrics[0].get("additionalData").is_none());
}

#[tokio::test]
async fn test_http_rejection_requeues_and_omits_missing_token() {
    let (base_url, ingest) = start_collector().await;
    ingest.status.store(500, Ordering::SeqCst);

    let telemetry = Telemetry::builder()
        .config(
            TelemetryConfig::default()
                .with_base_url(format!("{}/", base_url))
                .with_console_echo(false),
        )
        .init()
        .expect("Failed to start telemetry");

    telemetry.log_info("keep me", None);
    let report = telemetry.flush().await;
    assert_eq!(report.logs, FlushOutcome::Requeued(1));
    assert_eq!(telemetry.logs().len(), 1);

    {
        let requests = ingest.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, None, "no token, no authorization header");
    }

    ingest.status.store(200, Ordering::SeqCst);
    let report = telemetry.flush().await;
    assert_eq!(report.logs, FlushOutcome::Delivered(1));
    assert_eq!(ingest.requests.lock().len(), 2);
}
