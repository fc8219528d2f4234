//! Automatic collection: performance observation and lifecycle routing

pub mod lifecycle;
pub mod performance_bridge;

pub use lifecycle::{
    signal_channel, LifecycleEventRouter, LifecycleSignal, SignalReceiver, SignalSender,
    UncaughtError,
};
pub use performance_bridge::{record_page_load, PerformanceObserverBridge};
