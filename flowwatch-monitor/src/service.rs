//! Remote job service seam
//!
//! The poller only needs two reads from the server. They sit behind a trait so
//! tests can script responses instead of talking HTTP.

use async_trait::async_trait;
use flowwatch_client::{Result, WorkflowClient};
use flowwatch_core::domain::workflow::{WorkflowId, WorkflowSnapshot, WorkflowUpdate};

/// Source of workflow state
#[async_trait]
pub trait JobService: Send + Sync {
    /// Fetches the full workflow record
    async fn fetch_workflow(&self, id: &WorkflowId) -> Result<WorkflowSnapshot>;

    /// Fetches the current status and log of a workflow
    async fn fetch_workflow_log(&self, id: &WorkflowId) -> Result<WorkflowUpdate>;
}

#[async_trait]
impl JobService for WorkflowClient {
    async fn fetch_workflow(&self, id: &WorkflowId) -> Result<WorkflowSnapshot> {
        self.get_workflow(id).await
    }

    async fn fetch_workflow_log(&self, id: &WorkflowId) -> Result<WorkflowUpdate> {
        self.get_workflow_log(id).await
    }
}
