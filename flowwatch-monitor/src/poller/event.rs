//! Events emitted by the polling session manager

use flowwatch_core::domain::workflow::{JobStatus, WorkflowId};

/// Outcome of a poll, broadcast to whoever renders the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A fetched update was merged into the held snapshot
    Updated { subject: WorkflowId, status: JobStatus },

    /// The fetch failed; the session keeps polling
    FetchFailed { subject: WorkflowId, message: String },

    /// The job reached a non-running status and its session ended itself
    Finished { subject: WorkflowId, status: JobStatus },
}

impl PollEvent {
    pub fn subject(&self) -> &WorkflowId {
        match self {
            Self::Updated { subject, .. }
            | Self::FetchFailed { subject, .. }
            | Self::Finished { subject, .. } => subject,
        }
    }
}
