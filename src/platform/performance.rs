//! Performance instrumentation capability
//!
//! Streams are subscribed to explicitly and each subscription returns a
//! handle; dropping the handle ends the subscription. Every stream kind has
//! its own entry type, delivered to the callback in batches.

use crate::core::{Result, TelemetryError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Observable performance entry streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [
        StreamKind::LargestContentfulPaint,
        StreamKind::FirstInput,
        StreamKind::LayoutShift,
    ];

    /// Entry type name as used by the web performance APIs
    pub fn entry_type(&self) -> &'static str {
        match self {
            StreamKind::LargestContentfulPaint => "largest-contentful-paint",
            StreamKind::FirstInput => "first-input",
            StreamKind::LayoutShift => "layout-shift",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_type())
    }
}

/// Navigation timing of the current page, in milliseconds from time origin
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NavigationTiming {
    pub fetch_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintTiming {
    pub name: String,
    pub start_time: f64,
}

impl PaintTiming {
    pub fn new(name: impl Into<String>, start_time: f64) -> Self {
        Self {
            name: name.into(),
            start_time,
        }
    }
}

/// Largest-contentful-paint candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LargestContentfulPaint {
    pub start_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstInput {
    pub start_time: f64,
    pub processing_start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutShift {
    pub value: f64,
    pub had_recent_input: bool,
}

/// A batch of entries from one stream
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEntries {
    LargestContentfulPaint(Vec<LargestContentfulPaint>),
    FirstInput(Vec<FirstInput>),
    LayoutShift(Vec<LayoutShift>),
}

impl PerformanceEntries {
    pub fn kind(&self) -> StreamKind {
        match self {
            PerformanceEntries::LargestContentfulPaint(_) => StreamKind::LargestContentfulPaint,
            PerformanceEntries::FirstInput(_) => StreamKind::FirstInput,
            PerformanceEntries::LayoutShift(_) => StreamKind::LayoutShift,
        }
    }
}

pub type EntriesCallback = Arc<dyn Fn(&PerformanceEntries) + Send + Sync>;

/// Handle for an active stream subscription. Dropping it unsubscribes.
pub struct Subscription {
    kind: StreamKind,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(kind: StreamKind, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            kind,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Source of performance samples
pub trait PerformanceSource: Send + Sync {
    /// Start observing a stream. Fails when the stream can't be observed.
    fn subscribe(&self, kind: StreamKind, callback: EntriesCallback) -> Result<Subscription>;

    /// Navigation timing for the current page, once available
    fn navigation_timing(&self) -> Option<NavigationTiming>;

    /// Paint timings recorded so far
    fn paint_timings(&self) -> Vec<PaintTiming>;
}

#[derive(Default)]
struct ManualInner {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, (StreamKind, EntriesCallback)>>,
    navigation: RwLock<Option<NavigationTiming>>,
    paints: RwLock<Vec<PaintTiming>>,
    unsupported: RwLock<HashSet<StreamKind>>,
}

/// Performance source fed by the host.
///
/// The embedding layer pushes samples with [`emit`](Self::emit) as the
/// platform reports them; cloning yields another handle to the same source.
#[derive(Clone, Default)]
pub struct ManualPerformanceSource {
    inner: Arc<ManualInner>,
}

impl ManualPerformanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_navigation_timing(&self, timing: NavigationTiming) {
        *self.inner.navigation.write() = Some(timing);
    }

    pub fn add_paint_timing(&self, paint: PaintTiming) {
        self.inner.paints.write().push(paint);
    }

    /// Make future subscriptions to `kind` fail
    pub fn mark_unsupported(&self, kind: StreamKind) {
        self.inner.unsupported.write().insert(kind);
    }

    /// Deliver a batch to every subscriber of its stream.
    ///
    /// Returns the number of subscribers notified.
    pub fn emit(&self, entries: PerformanceEntries) -> usize {
        let kind = entries.kind();
        let callbacks: Vec<EntriesCallback> = self
            .inner
            .subscribers
            .read()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in &callbacks {
            callback(&entries);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, kind: StreamKind) -> usize {
        self.inner
            .subscribers
            .read()
            .values()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl PerformanceSource for ManualPerformanceSource {
    fn subscribe(&self, kind: StreamKind, callback: EntriesCallback) -> Result<Subscription> {
        if self.inner.unsupported.read().contains(&kind) {
            return Err(TelemetryError::instrumentation(
                kind.entry_type(),
                "entry type is not supported",
            ));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().insert(id, (kind, callback));

        let weak: Weak<ManualInner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(kind, move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.write().remove(&id);
            }
        }))
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        *self.inner.navigation.read()
    }

    fn paint_timings(&self) -> Vec<PaintTiming> {
        self.inner.paints.read().clone()
    }
}
