//! In-memory queues of entries awaiting delivery
//!
//! A buffer keeps entries in append order. Reaching the flush threshold
//! hands the *whole* queue to the delivery client in the background. A flush
//! swaps the queue out before the request is made; if the request fails the
//! batch goes back in front of whatever was appended in the meantime.
//!
//! The queue lock is only held for synchronous pushes and swaps, never
//! across a delivery await.

use super::connectivity::Connectivity;
use super::spawner::TaskSpawner;
use super::stats::PipelineStats;
use crate::core::{LogEntry, PerformanceMetric};
use crate::delivery::{Deliverable, DeliveryClient};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Buffer of log entries bound for the log collector
pub type LogBuffer = EntryBuffer<LogEntry>;

/// Buffer of metrics bound for the metric collector
pub type MetricBuffer = EntryBuffer<PerformanceMetric>;

/// What a single flush did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The collector accepted this many entries
    Delivered(usize),
    /// Delivery failed; this many entries went back to the head of the queue
    Requeued(usize),
    /// Offline: no request was made
    SkippedOffline,
    /// Nothing queued: no request was made
    SkippedEmpty,
}

impl FlushOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FlushOutcome::SkippedOffline | FlushOutcome::SkippedEmpty)
    }

    /// Entries involved in the attempt, zero when skipped
    pub fn count(&self) -> usize {
        match self {
            FlushOutcome::Delivered(n) | FlushOutcome::Requeued(n) => *n,
            FlushOutcome::SkippedOffline | FlushOutcome::SkippedEmpty => 0,
        }
    }
}

impl fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushOutcome::Delivered(n) => write!(f, "delivered {}", n),
            FlushOutcome::Requeued(n) => write!(f, "requeued {}", n),
            FlushOutcome::SkippedOffline => write!(f, "skipped (offline)"),
            FlushOutcome::SkippedEmpty => write!(f, "skipped (empty)"),
        }
    }
}

struct BufferInner<T> {
    queue: Mutex<VecDeque<T>>,
    threshold: usize,
    client: Arc<dyn DeliveryClient>,
    connectivity: Connectivity,
    spawner: TaskSpawner,
    stats: Arc<PipelineStats>,
}

/// Ordered queue with threshold auto-flush and requeue-on-failure.
///
/// Cloning yields another handle to the same queue.
pub struct EntryBuffer<T> {
    inner: Arc<BufferInner<T>>,
}

impl<T> Clone for EntryBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Deliverable> EntryBuffer<T> {
    pub fn new(
        threshold: usize,
        client: Arc<dyn DeliveryClient>,
        connectivity: Connectivity,
        spawner: TaskSpawner,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                queue: Mutex::new(VecDeque::new()),
                threshold: threshold.max(1),
                client,
                connectivity,
                spawner,
                stats,
            }),
        }
    }

    /// Add an entry to the tail.
    ///
    /// When the queue reaches the threshold the entire queue is swapped out
    /// before this returns, and delivered in the background.
    pub fn append(&self, entry: T) {
        self.inner.stats.record_entry();

        let batch = {
            let mut queue = self.inner.queue.lock();
            queue.push_back(entry);
            if queue.len() < self.inner.threshold {
                return;
            }
            self.take_batch(&mut queue)
        };

        if let Ok(batch) = batch {
            tracing::debug!(
                kind = %T::KIND,
                count = batch.len(),
                "Buffer reached flush threshold"
            );
            let this = self.clone();
            self.inner.spawner.spawn(async move {
                this.deliver(batch).await;
            });
        }
    }

    /// Snapshot, clear and deliver the current queue.
    ///
    /// Offline or empty buffers return immediately without a request.
    pub async fn flush(&self) -> FlushOutcome {
        let batch = {
            let mut queue = self.inner.queue.lock();
            self.take_batch(&mut queue)
        };

        match batch {
            Ok(batch) => self.deliver(batch).await,
            Err(skipped) => skipped,
        }
    }

    /// Start a flush in the background without waiting for it
    pub fn request_flush(&self) {
        let this = self.clone();
        self.inner.spawner.spawn(async move {
            this.flush().await;
        });
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.inner.threshold
    }

    fn take_batch(&self, queue: &mut VecDeque<T>) -> Result<Vec<T>, FlushOutcome> {
        if !self.inner.connectivity.is_online() {
            self.inner.stats.record_skipped();
            return Err(FlushOutcome::SkippedOffline);
        }
        if queue.is_empty() {
            self.inner.stats.record_skipped();
            return Err(FlushOutcome::SkippedEmpty);
        }
        Ok(queue.drain(..).collect())
    }

    async fn deliver(&self, batch: Vec<T>) -> FlushOutcome {
        let count = batch.len();

        match T::deliver(self.inner.client.as_ref(), &batch).await {
            Ok(()) => {
                self.inner.stats.record_delivered(count);
                tracing::trace!(kind = %T::KIND, count, "Batch delivered");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                self.inner.stats.record_failure();
                tracing::warn!(
                    kind = %T::KIND,
                    count,
                    client = self.inner.client.name(),
                    error = %e,
                    "Failed to send batch, requeueing"
                );
                self.requeue_front(batch);
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Put a failed batch back ahead of everything appended since it left.
    ///
    /// With several batches in flight, whichever fails last ends up at the
    /// head: if an older batch fails before a newer one, the newer batch is
    /// requeued in front of it and append order is not preserved.
    fn requeue_front(&self, batch: Vec<T>) {
        let count = batch.len();
        let mut restored = VecDeque::from(batch);

        let mut queue = self.inner.queue.lock();
        restored.append(&mut queue);
        *queue = restored;
        drop(queue);

        self.inner.stats.record_requeued(count);
    }
}

impl<T: Deliverable + Clone> EntryBuffer<T> {
    /// Copy of the queued entries in order
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.queue.lock().iter().cloned().collect()
    }
}
