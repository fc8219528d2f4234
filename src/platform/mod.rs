//! Host capabilities the pipeline reads from
//!
//! The pipeline never reaches into a global environment. Everything it needs
//! from the host (page URL, user agent, initial connectivity, performance
//! samples) comes through these interfaces.

pub mod performance;

use parking_lot::RwLock;

pub use performance::{
    EntriesCallback, FirstInput, LargestContentfulPaint, LayoutShift, ManualPerformanceSource,
    NavigationTiming, PaintTiming, PerformanceEntries, PerformanceSource, StreamKind, Subscription,
};

/// Page-level context stamped on every log entry
pub trait Platform: Send + Sync {
    /// Address of the page the entry originates from
    fn current_url(&self) -> String;

    fn user_agent(&self) -> String;

    /// Connectivity at startup; later changes arrive as lifecycle signals
    fn is_online(&self) -> bool;
}

/// Platform with fixed user agent and a settable URL
#[derive(Debug)]
pub struct StaticPlatform {
    url: RwLock<String>,
    user_agent: String,
    online: bool,
}

impl StaticPlatform {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            user_agent: user_agent.into(),
            online: true,
        }
    }

    #[must_use]
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Record a navigation; later entries carry the new URL
    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }
}

impl Default for StaticPlatform {
    fn default() -> Self {
        Self::new(
            String::new(),
            format!("session_telemetry/{}", env!("CARGO_PKG_VERSION")),
        )
    }
}

impl Platform for StaticPlatform {
    fn current_url(&self) -> String {
        self.url.read().clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn is_online(&self) -> bool {
        self.online
    }
}
