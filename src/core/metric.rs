//! Performance metric structure

use super::payload::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named numeric measurement queued for the metric collector.
///
/// Names are not unique within a session: `fid` and `cls` are reported
/// repeatedly as new samples arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    name: String,
    value: f64,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    additional_data: Option<Payload>,
}

impl PerformanceMetric {
    pub fn new(name: impl Into<String>, value: f64, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
            user_id: None,
            session_id: session_id.into(),
            additional_data: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Option<Payload>) -> Self {
        self.additional_data = data;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
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

    pub fn additional_data(&self) -> Option<&Payload> {
        self.additional_data.as_ref()
    }
}
