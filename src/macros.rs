//! Logging macros with `format!`-style messages.
//!
//! Each macro takes a [`Telemetry`](crate::Telemetry) handle first. Entries
//! created this way carry no structured data; use the methods directly to
//! attach a [`Payload`](crate::Payload).
//!
//! # Examples
//!
//! ```no_run
//! use session_telemetry::prelude::*;
//! use session_telemetry::{error, info};
//!
//! # fn run(telemetry: Telemetry) {
//! info!(telemetry, "Settings page opened");
//!
//! let attempts = 3;
//! error!(telemetry, "Payment failed after {} attempts", attempts);
//! # }
//! ```

/// Log a message at the given level.
///
/// # Examples
///
/// ```no_run
/// # use session_telemetry::prelude::*;
/// # fn run(telemetry: Telemetry) {
/// use session_telemetry::log;
/// log!(telemetry, LogLevel::Info, "Simple message");
/// log!(telemetry, LogLevel::Warn, "Slow response: {}ms", 2400);
/// # }
/// ```
#[macro_export]
macro_rules! log {
    ($telemetry:expr, $level:expr, $($arg:tt)+) => {
        $telemetry.log($level, format!($($arg)+), None)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($telemetry:expr, $($arg:tt)+) => {
        $crate::log!($telemetry, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```no_run
/// # use session_telemetry::prelude::*;
/// # fn run(telemetry: Telemetry) {
/// use session_telemetry::info;
/// info!(telemetry, "Event {} shared", 42);
/// # }
/// ```
#[macro_export]
macro_rules! info {
    ($telemetry:expr, $($arg:tt)+) => {
        $crate::log!($telemetry, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($telemetry:expr, $($arg:tt)+) => {
        $crate::log!($telemetry, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// Goes through [`Telemetry::log_error`](crate::Telemetry::log_error), so
/// the entry is also sent immediately when online.
#[macro_export]
macro_rules! error {
    ($telemetry:expr, $($arg:tt)+) => {
        $telemetry.log_error(format!($($arg)+), None, None)
    };
}
