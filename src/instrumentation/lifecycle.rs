//! Lifecycle signal routing
//!
//! The host reports what happens to the application (connectivity changes,
//! visibility, termination, page load, uncaught failures) as
//! [`LifecycleSignal`]s. The router turns each one into a pipeline action.
//! Signals can be handed over directly with [`LifecycleEventRouter::handle`]
//! or sent over a channel consumed by [`LifecycleEventRouter::run`].

use super::performance_bridge::PerformanceObserverBridge;
use crate::core::{CapturedError, Payload, Telemetry};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const UNHANDLED_ERROR_MESSAGE: &str = "Unhandled Error";
pub const UNHANDLED_REJECTION_MESSAGE: &str = "Unhandled Promise Rejection";

/// A failure nothing else caught, with its source location when known
#[derive(Debug, Clone, PartialEq)]
pub struct UncaughtError {
    pub error: CapturedError,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
}

impl UncaughtError {
    pub fn new(error: CapturedError) -> Self {
        Self {
            error,
            filename: None,
            lineno: None,
            colno: None,
        }
    }

    #[must_use]
    pub fn at(mut self, filename: impl Into<String>, lineno: u32, colno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self.colno = Some(colno);
        self
    }

    fn location(&self) -> Payload {
        Payload::new()
            .with_field("filename", self.filename.clone())
            .with_field("lineno", self.lineno)
            .with_field("colno", self.colno)
    }
}

/// Events raised by the host application
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleSignal {
    Online,
    Offline,
    VisibilityChanged { hidden: bool },
    /// The application is about to exit
    Terminate,
    /// The page finished loading
    Load,
    UncaughtError(UncaughtError),
    /// A failed background operation nobody awaited
    UnhandledRejection(CapturedError),
}

pub type SignalSender = mpsc::UnboundedSender<LifecycleSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<LifecycleSignal>;

/// Channel for feeding signals to [`LifecycleEventRouter::run`]
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}

/// Maps lifecycle signals to pipeline actions
#[derive(Clone)]
pub struct LifecycleEventRouter {
    telemetry: Telemetry,
    performance: Option<Arc<PerformanceObserverBridge>>,
}

impl LifecycleEventRouter {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            telemetry,
            performance: None,
        }
    }

    /// Bridge that records page-load metrics on [`LifecycleSignal::Load`]
    #[must_use]
    pub fn with_performance(mut self, bridge: Arc<PerformanceObserverBridge>) -> Self {
        self.performance = Some(bridge);
        self
    }

    pub fn handle(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Online => {
                let was_online = self.telemetry.connectivity().set_online(true);
                if !was_online {
                    tracing::debug!("Connection restored, flushing buffered entries");
                    self.telemetry.request_flush();
                }
            }
            LifecycleSignal::Offline => {
                if self.telemetry.connectivity().set_online(false) {
                    tracing::debug!("Connection lost, buffering entries");
                }
            }
            LifecycleSignal::VisibilityChanged { hidden: true } | LifecycleSignal::Terminate => {
                self.telemetry.request_flush();
            }
            LifecycleSignal::VisibilityChanged { hidden: false } => {}
            LifecycleSignal::Load => {
                if let Some(bridge) = &self.performance {
                    bridge.on_page_load();
                }
            }
            LifecycleSignal::UncaughtError(uncaught) => {
                let location = uncaught.location();
                self.telemetry
                    .log_error(UNHANDLED_ERROR_MESSAGE, Some(uncaught.error), Some(location));
            }
            LifecycleSignal::UnhandledRejection(reason) => {
                self.telemetry
                    .log_error(UNHANDLED_REJECTION_MESSAGE, Some(reason), None);
            }
        }
    }

    /// Route signals until every sender is dropped
    pub async fn run(self, mut signals: SignalReceiver) {
        while let Some(signal) = signals.recv().await {
            self.handle(signal);
        }
        tracing::debug!("Lifecycle signal channel closed");
    }

    /// Report panics as uncaught errors.
    ///
    /// The entry is buffered but not sent on its own, so a delivery client
    /// that panics cannot feed the hook. The previously installed hook still
    /// runs afterwards.
    pub fn install_panic_hook(&self) {
        let telemetry = self.telemetry.clone();
        let previous = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let error = CapturedError::new(panic_message(info.payload())).with_name("panic");
            let uncaught = match info.location() {
                Some(location) => {
                    UncaughtError::new(error).at(location.file(), location.line(), location.column())
                }
                None => UncaughtError::new(error),
            };

            let location = uncaught.location();
            telemetry.log_error_buffered(
                UNHANDLED_ERROR_MESSAGE,
                Some(uncaught.error),
                Some(location),
            );
            previous(info);
        }));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
