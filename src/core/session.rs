//! Session identity
//!
//! The session identifier is generated once when the pipeline starts and is
//! attached to every entry for the lifetime of the process.

use parking_lot::RwLock;
use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a correlation token: base-36 epoch millis followed by a base-36
/// random component. Not suitable as a secret.
pub fn generate_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    // Eleven base-36 digits
    let random: u64 = rand::thread_rng().gen_range(36u64.pow(10)..36u64.pow(11));
    format!("{}{}", to_base36(millis), to_base36(random))
}

#[derive(Debug)]
pub struct SessionManager {
    session_id: String,
    user_id: RwLock<Option<String>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_session_id(generate_session_id())
    }

    /// Create a manager around a known session identifier
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: RwLock::new(None),
        }
    }

    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Set the authenticated user; the last call wins
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        *self.user_id.write() = Some(user_id.into());
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
