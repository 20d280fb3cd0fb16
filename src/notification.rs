// EnergyDash - Measurement ingestion and alert fan-out
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Notification event types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Info,
    Warning,
    Success,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Info => "info",
            NotificationCategory::Warning => "warning",
            NotificationCategory::Success => "success",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationCategory::Info),
            "warning" => Ok(NotificationCategory::Warning),
            "success" => Ok(NotificationCategory::Success),
            other => Err(format!("unknown notification category '{other}'")),
        }
    }
}

/// A notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
}

impl NewNotification {
    /// Create a new notification.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            category,
        }
    }
}

/// A stored notification. Only `read` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Assigned by the store
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
    #[serde(rename = "is_read")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// JSON payload pushed to live subscribers.
    pub fn to_payload(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
