//! # Session Telemetry
//!
//! Client-side telemetry pipeline: structured logs and performance metrics
//! are stamped with session and page context, buffered, and shipped in
//! batches to remote collectors.
//!
//! ## Features
//!
//! - **Batched delivery**: entries are sent once a buffer reaches its threshold,
//!   on explicit flush, when the page is hidden and at shutdown
//! - **Offline tolerant**: nothing is sent while offline; buffers flush when
//!   connectivity returns
//! - **No loss on failure**: a failed batch goes back to the head of its buffer
//!   and is retried on the next flush
//! - **Immediate errors**: ERROR entries are also sent on their own right away
//! - **Web vitals**: LCP, FID, CLS and page-load timings from a pluggable
//!   performance source
//!
//! ## Example
//!
//! ```no_run
//! use session_telemetry::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let telemetry = Telemetry::builder()
//!     .config(TelemetryConfig::from_env())
//!     .init()?;
//!
//! let router = LifecycleEventRouter::new(telemetry.clone());
//! router.install_panic_hook();
//!
//! telemetry.track_user_action("open_settings", None);
//! router.handle(LifecycleSignal::Terminate);
//! telemetry.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod delivery;
pub mod instrumentation;
pub mod macros;
pub mod platform;

#[cfg(test)]
mod testing;

pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::delivery::HttpDeliveryClient;
    pub use crate::core::{
        CapturedError, FieldValue, FlushOutcome, FlushReport, LogEntry, LogLevel, Payload,
        PerformanceMetric, PipelineStats, Result, Telemetry, TelemetryBuilder, TelemetryConfig,
        TelemetryError, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::delivery::{DeliveryClient, FileTokenStore, MemoryTokenStore, TokenProvider};
    pub use crate::instrumentation::{
        signal_channel, LifecycleEventRouter, LifecycleSignal, PerformanceObserverBridge,
        UncaughtError,
    };
    pub use crate::platform::{
        ManualPerformanceSource, PerformanceEntries, PerformanceSource, Platform, StaticPlatform,
        StreamKind,
    };
}

#[cfg(feature = "http")]
pub use crate::delivery::HttpDeliveryClient;
pub use crate::core::{
    CapturedError, FieldValue, FlushOutcome, FlushReport, LogEntry, LogLevel, Payload,
    PerformanceMetric, PipelineStats, Result, Telemetry, TelemetryBuilder, TelemetryConfig,
    TelemetryError, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::delivery::{DeliveryClient, FileTokenStore, MemoryTokenStore, TokenProvider};
pub use crate::instrumentation::{LifecycleEventRouter, LifecycleSignal, PerformanceObserverBridge};
