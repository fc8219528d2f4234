//! Performance observer bridge
//!
//! Turns raw performance samples into metrics:
//!
//! | metric               | value                                                      |
//! |----------------------|------------------------------------------------------------|
//! | `page_load_time`     | `load_event_end - fetch_start`                             |
//! | `dom_content_loaded` | `dom_content_loaded_event_end - fetch_start`               |
//! | `first_paint`        | start time of the `first-paint` paint entry, else 0        |
//! | `lcp`                | start time of the last entry in each LCP batch             |
//! | `fid`                | `processing_start - start_time`, per first-input entry     |
//! | `cls`                | running sum of layout shifts without recent input          |
//!
//! Page-load metrics are taken once, one scheduling tick after the load
//! signal so the navigation entry is complete.

use crate::core::{CapturedError, Payload, Telemetry, TelemetryError};
use crate::platform::{PerformanceEntries, PerformanceSource, StreamKind, Subscription};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Paint entry name used for `first_paint`
pub const FIRST_PAINT: &str = "first-paint";

const SETUP_FAILURE_MESSAGE: &str = "Error setting up performance observers";

/// Per-session state of the web-vitals calculations
#[derive(Debug, Default)]
struct WebVitals {
    cls: Mutex<f64>,
}

impl WebVitals {
    fn record(&self, telemetry: &Telemetry, entries: &PerformanceEntries) {
        match entries {
            PerformanceEntries::LargestContentfulPaint(list) => {
                if let Some(latest) = list.last() {
                    telemetry.track_metric("lcp", latest.start_time, None);
                }
            }
            PerformanceEntries::FirstInput(list) => {
                for entry in list {
                    telemetry.track_metric("fid", entry.processing_start - entry.start_time, None);
                }
            }
            PerformanceEntries::LayoutShift(list) => {
                for entry in list.iter().filter(|e| !e.had_recent_input) {
                    let total = {
                        let mut cls = self.cls.lock();
                        *cls += entry.value;
                        *cls
                    };
                    telemetry.track_metric("cls", total, None);
                }
            }
        }
    }

    fn cumulative_layout_shift(&self) -> f64 {
        *self.cls.lock()
    }
}

/// Subscribes to performance streams and feeds the metric buffer.
///
/// Subscriptions live as long as the bridge; [`detach`](Self::detach) or
/// dropping the bridge ends them.
pub struct PerformanceObserverBridge {
    telemetry: Telemetry,
    source: Option<Arc<dyn PerformanceSource>>,
    vitals: Arc<WebVitals>,
    subscriptions: Mutex<Vec<Subscription>>,
    page_load_recorded: AtomicBool,
}

impl PerformanceObserverBridge {
    /// Subscribe to every stream `source` offers.
    ///
    /// A stream that can't be observed is reported as an ERROR entry and
    /// skipped; the others are still collected. `None` means the platform has
    /// no instrumentation at all.
    pub fn attach(telemetry: Telemetry, source: Option<Arc<dyn PerformanceSource>>) -> Self {
        let bridge = Self {
            telemetry,
            source,
            vitals: Arc::new(WebVitals::default()),
            subscriptions: Mutex::new(Vec::new()),
            page_load_recorded: AtomicBool::new(false),
        };

        match bridge.source.clone() {
            Some(source) => {
                for kind in StreamKind::ALL {
                    bridge.observe(source.as_ref(), kind);
                }
            }
            None => bridge.report_setup_failure(None, &TelemetryError::InstrumentationUnavailable),
        }

        bridge
    }

    fn observe(&self, source: &dyn PerformanceSource, kind: StreamKind) {
        let telemetry = self.telemetry.clone();
        let vitals = Arc::clone(&self.vitals);

        let callback = Arc::new(move |entries: &PerformanceEntries| {
            if entries.kind() == kind {
                vitals.record(&telemetry, entries);
            }
        });

        match source.subscribe(kind, callback) {
            Ok(subscription) => self.subscriptions.lock().push(subscription),
            Err(e) => self.report_setup_failure(Some(kind), &e),
        }
    }

    fn report_setup_failure(&self, kind: Option<StreamKind>, error: &TelemetryError) {
        let data = kind.map(|k| Payload::new().with_field("stream", k.entry_type()));
        self.telemetry
            .log_error(SETUP_FAILURE_MESSAGE, Some(CapturedError::from_error(error)), data);
    }

    /// Record page-load metrics one tick after the page finished loading.
    ///
    /// Only the first call records anything; repeated load signals are ignored.
    pub fn on_page_load(&self) {
        let Some(source) = self.source.clone() else {
            return;
        };
        if self.page_load_recorded.swap(true, Ordering::AcqRel) {
            tracing::debug!("Page load metrics already recorded, ignoring load signal");
            return;
        }
        let telemetry = self.telemetry.clone();

        self.telemetry.spawn(async move {
            tokio::task::yield_now().await;
            record_page_load(&telemetry, source.as_ref());
        });
    }

    /// Streams currently observed
    pub fn observed_streams(&self) -> Vec<StreamKind> {
        self.subscriptions.lock().iter().map(Subscription::kind).collect()
    }

    /// Current CLS running total
    pub fn cumulative_layout_shift(&self) -> f64 {
        self.vitals.cumulative_layout_shift()
    }

    /// End all subscriptions
    pub fn detach(&self) {
        let subscriptions: Vec<Subscription> = self.subscriptions.lock().drain(..).collect();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// Record `page_load_time`, `dom_content_loaded` and `first_paint`.
///
/// Nothing is recorded until the navigation entry exists.
pub fn record_page_load(telemetry: &Telemetry, source: &dyn PerformanceSource) {
    let Some(timing) = source.navigation_timing() else {
        tracing::debug!("Navigation timing not available, skipping page load metrics");
        return;
    };

    telemetry.track_metric("page_load_time", timing.load_event_end - timing.fetch_start, None);
    telemetry.track_metric(
        "dom_content_loaded",
        timing.dom_content_loaded_event_end - timing.fetch_start,
        None,
    );

    let first_paint = source
        .paint_timings()
        .iter()
        .find(|p| p.name == FIRST_PAINT)
        .map(|p| p.start_time)
        .unwrap_or(0.0);
    telemetry.track_metric("first_paint", first_paint, None);
}
