//! Error types for the monitor

use thiserror::Error;

/// Errors returned by the notification queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// No notification occupies the requested position
    #[error("notification index {index} out of range (active: {len})")]
    IndexOutOfRange { index: usize, len: usize },
}
