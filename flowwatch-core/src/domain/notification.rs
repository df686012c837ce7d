//! Notification domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header attached to error notifications
pub const ERROR_HEADER: &str = "Error: ";

/// Category of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequence number of a notification, never reused within a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transient message shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub header: Option<String>,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Notification {
    /// Header and message as a single line
    pub fn text(&self) -> String {
        match &self.header {
            Some(header) => format!("{}{}", header, self.message),
            None => self.message.clone(),
        }
    }
}
