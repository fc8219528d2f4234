//! Authentication token sources for collector requests
//!
//! The token is looked up on every request. No token means the request goes
//! out without an `Authorization` header; it is never held back.

use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::PathBuf;

pub trait TokenProvider: Send + Sync {
    /// Current bearer token, if the user is authenticated
    fn token(&self) -> Option<String>;
}

/// Token held in memory, set and cleared by the application
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl TokenProvider for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

/// Token persisted in a file, re-read on every lookup.
///
/// A missing, unreadable or blank file yields no token.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenProvider for FileTokenStore {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Failed to read auth token");
                None
            }
        }
    }
}
