//! In-crate test doubles

use crate::core::{LogEntry, PerformanceMetric, Result, TelemetryError};
use crate::delivery::DeliveryClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Delivery client that records every batch it is handed.
///
/// It can be told to fail, and to park each call until released so tests
/// can act while a delivery is in flight.
#[derive(Default)]
pub struct RecordingClient {
    log_batches: Mutex<Vec<Vec<LogEntry>>>,
    metric_batches: Mutex<Vec<Vec<PerformanceMetric>>>,
    failing: AtomicBool,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn hold_deliveries(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// Wait until a held delivery has started
    pub async fn wait_for_delivery(&self) {
        self.entered.notified().await;
    }

    pub fn release_delivery(&self) {
        self.release.notify_one();
    }

    pub fn log_batches(&self) -> Vec<Vec<LogEntry>> {
        self.log_batches.lock().clone()
    }

    pub fn metric_batches(&self) -> Vec<Vec<PerformanceMetric>> {
        self.metric_batches.lock().clone()
    }

    pub fn log_calls(&self) -> usize {
        self.log_batches.lock().len()
    }

    pub fn metric_calls(&self) -> usize {
        self.metric_batches.lock().len()
    }

    async fn outcome(&self, endpoint: &str) -> Result<()> {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(TelemetryError::delivery(endpoint, "simulated outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeliveryClient for RecordingClient {
    async fn send_logs(&self, logs: &[LogEntry]) -> Result<()> {
        self.log_batches.lock().push(logs.to_vec());
        self.outcome("logs").await
    }

    async fn send_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()> {
        self.metric_batches.lock().push(metrics.to_vec());
        self.outcome("metrics").await
    }

    fn name(&self) -> &str {
        "recording"
    }
}
