//! Log entry structure

use super::log_level::LogLevel;
use super::payload::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An error captured alongside a log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl CapturedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture any Rust error, keeping its source chain as the stack
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        let captured = Self::new(error.to_string());
        if chain.is_empty() {
            captured
        } else {
            captured.with_stack(chain.join("\n"))
        }
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A single log record queued for delivery to the log collector.
///
/// Entries are built once by the pipeline and only moved afterwards; fields
/// are exposed through accessors so buffered entries can't be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    level: LogLevel,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    session_id: String,
    url: String,
    user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CapturedError>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: session_id.into(),
            url: String::new(),
            user_agent: String::new(),
            data: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.url = url.into();
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Option<Payload>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<CapturedError>) -> Self {
        self.error = error;
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }
}
