//! Shared online/offline state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Two-state connectivity flag shared by the buffers and the lifecycle router.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Update the state, returning the previous value
    pub fn set_online(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst)
    }
}
