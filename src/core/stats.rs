//! Pipeline counters for observability
//!
//! Counts what happened to entries on their way to the collectors:
//! recorded, delivered, requeued after a failure, or held back because a
//! flush was skipped.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by both buffers and the immediate-delivery path
///
/// # Example
///
/// ```
/// use session_telemetry::PipelineStats;
///
/// let stats = PipelineStats::new();
/// stats.record_entry();
/// stats.record_delivered(1);
///
/// assert_eq!(stats.entries_recorded(), 1);
/// assert_eq!(stats.entries_delivered(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineStats {
    /// Entries appended to either buffer
    entries_recorded: AtomicU64,

    /// Batches accepted by a collector
    batches_delivered: AtomicU64,

    /// Entries contained in accepted batches
    entries_delivered: AtomicU64,

    /// Delivery attempts that failed
    delivery_failures: AtomicU64,

    /// Entries put back at the head of a buffer after a failure
    entries_requeued: AtomicU64,

    /// Flush triggers that did nothing because the buffer was empty or
    /// offline. While offline every append at or past the threshold counts
    /// as one trigger.
    flushes_skipped: AtomicU64,

    /// Single-entry sends of severe log entries
    immediate_deliveries: AtomicU64,
}

impl PipelineStats {
    /// Create a new stats instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            entries_recorded: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
            entries_delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            entries_requeued: AtomicU64::new(0),
            flushes_skipped: AtomicU64::new(0),
            immediate_deliveries: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn entries_recorded(&self) -> u64 {
        self.entries_recorded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn entries_delivered(&self) -> u64 {
        self.entries_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn entries_requeued(&self) -> u64 {
        self.entries_requeued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flushes_skipped(&self) -> u64 {
        self.flushes_skipped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn immediate_deliveries(&self) -> u64 {
        self.immediate_deliveries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_entry(&self) -> u64 {
        self.entries_recorded.fetch_add(1, Ordering::Relaxed)
    }

    /// Record an accepted batch of `count` entries
    #[inline]
    pub fn record_delivered(&self, count: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.entries_delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_requeued(&self, count: usize) -> u64 {
        self.entries_requeued.fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_skipped(&self) -> u64 {
        self.flushes_skipped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_immediate(&self) -> u64 {
        self.immediate_deliveries.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of delivery attempts that failed, as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been attempted yet.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.delivery_failures() as f64;
        let total = self.batches_delivered() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.entries_recorded.store(0, Ordering::Relaxed);
        self.batches_delivered.store(0, Ordering::Relaxed);
        self.entries_delivered.store(0, Ordering::Relaxed);
        self.delivery_failures.store(0, Ordering::Relaxed);
        self.entries_requeued.store(0, Ordering::Relaxed);
        self.flushes_skipped.store(0, Ordering::Relaxed);
        self.immediate_deliveries.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineStats {
    /// Create a snapshot of the current counter values
    fn clone(&self) -> Self {
        Self {
            entries_recorded: AtomicU64::new(self.entries_recorded()),
            batches_delivered: AtomicU64::new(self.batches_delivered()),
            entries_delivered: AtomicU64::new(self.entries_delivered()),
            delivery_failures: AtomicU64::new(self.delivery_failures()),
            entries_requeued: AtomicU64::new(self.entries_requeued()),
            flushes_skipped: AtomicU64::new(self.flushes_skipped()),
            immediate_deliveries: AtomicU64::new(self.immediate_deliveries()),
        }
    }
}
