//! Background task spawning for deliveries
//!
//! Producer calls are synchronous; anything that touches the network is
//! handed to the runtime captured at construction and tracked so shutdown
//! can wait for it.

use super::error::{Result, TelemetryError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

/// Held by a running task. On drop, even by panic or cancellation, the task
/// leaves the tracker before idle waiters are woken.
struct TaskDone {
    token: Option<TaskTrackerToken>,
    finished: Arc<Notify>,
}

impl Drop for TaskDone {
    fn drop(&mut self) {
        drop(self.token.take());
        self.finished.notify_waiters();
    }
}

/// The tracker is never closed, so any number of callers can wait for idle
/// at the same time without affecting each other.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    handle: Handle,
    tracker: TaskTracker,
    finished: Arc<Notify>,
}

impl TaskSpawner {
    /// Capture the runtime of the calling context
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| TelemetryError::NoRuntime(e.to_string()))?;
        Ok(Self::new(handle))
    }

    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Run a future in the background without awaiting it
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let done = TaskDone {
            token: Some(self.tracker.token()),
            finished: Arc::clone(&self.finished),
        };
        self.handle.spawn(async move {
            let _done = done;
            future.await;
        });
    }

    /// Number of background tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every task spawned so far has finished.
    ///
    /// Tasks spawned while waiting are waited for as well.
    pub async fn wait_idle(&self) {
        loop {
            let mut finished = std::pin::pin!(self.finished.notified());
            finished.as_mut().enable();
            if self.tracker.is_empty() {
                return;
            }
            finished.await;
        }
    }

    /// Like `wait_idle`, but gives up after `timeout`. Returns `true` when idle.
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_idle()).await.is_ok()
    }
}
