//! Workflow API endpoints

use crate::WorkflowClient;
use crate::error::Result;
use flowwatch_core::domain::workflow::{WorkflowId, WorkflowSnapshot, WorkflowUpdate};
use flowwatch_core::dto::workflow::{ApiMessage, PageQuery, SavedWorkflow, WorkflowDraft};
use reqwest::multipart::{Form, Part};

/// Multipart field the server reads uploaded files from
const UPLOAD_FIELD: &str = "file";

/// A file to place in a workflow's input directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Name the file is stored under, relative to the input directory
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl InputFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

impl WorkflowClient {
    fn workflow_url(&self, id: &WorkflowId) -> String {
        format!("{}/api/workflows/{}", self.base_url, id)
    }

    // =============================================================================
    // Queries
    // =============================================================================

    /// List one page of workflows, newest first
    pub async fn list_workflows(&self, page: PageQuery) -> Result<Vec<WorkflowSnapshot>> {
        let url = format!("{}/api/workflows", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("page", page.page), ("page_size", page.page_size)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a workflow by ID
    pub async fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowSnapshot> {
        let response = self.client.get(self.workflow_url(id)).send().await?;

        self.handle_response(response).await
    }

    /// Get the current status and log of a workflow
    ///
    /// # Returns
    /// A partial workflow carrying `status` and `log`
    pub async fn get_workflow_log(&self, id: &WorkflowId) -> Result<WorkflowUpdate> {
        let url = format!("{}/log", self.workflow_url(id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Editing
    // =============================================================================

    /// Create or update a workflow
    ///
    /// Saving to [`NEW_WORKFLOW_ID`](flowwatch_core::dto::workflow::NEW_WORKFLOW_ID)
    /// creates a new workflow; the returned id is the one to use afterwards.
    pub async fn save_workflow(&self, id: &WorkflowId, draft: &WorkflowDraft) -> Result<SavedWorkflow> {
        let response = self
            .client
            .post(self.workflow_url(id))
            .json(draft)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a workflow and its working directory
    pub async fn delete_workflow(&self, id: &WorkflowId) -> Result<()> {
        let response = self.client.delete(self.workflow_url(id)).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Files
    // =============================================================================

    /// Upload files into the workflow's input directory
    ///
    /// Existing files with the same name are overwritten. The server rejects
    /// a request without files.
    pub async fn upload_inputs(&self, id: &WorkflowId, files: Vec<InputFile>) -> Result<ApiMessage> {
        let url = format!("{}/upload", self.workflow_url(id));
        let response = self
            .client
            .post(&url)
            .multipart(upload_form(files))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Download workflow output
    ///
    /// # Arguments
    /// * `path` - File to fetch, relative to the workflow directory (as listed
    ///   in `output_files`). Without it the packed output archive is returned.
    pub async fn download_output(&self, id: &WorkflowId, path: Option<&str>) -> Result<Vec<u8>> {
        let url = format!("{}/download", self.workflow_url(id));
        let mut request = self.client.get(&url);
        if let Some(path) = path {
            request = request.query(&[("path", path)]);
        }

        let response = Self::check_status(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Launch a workflow from scratch
    pub async fn launch_workflow(&self, id: &WorkflowId) -> Result<ApiMessage> {
        self.post_action(id, "launch").await
    }

    /// Relaunch a workflow, reusing cached results of a previous run
    pub async fn resume_workflow(&self, id: &WorkflowId) -> Result<ApiMessage> {
        self.post_action(id, "resume").await
    }

    /// Stop a running workflow; the server marks it as failed
    pub async fn cancel_workflow(&self, id: &WorkflowId) -> Result<ApiMessage> {
        self.post_action(id, "cancel").await
    }

    async fn post_action(&self, id: &WorkflowId, action: &str) -> Result<ApiMessage> {
        let url = format!("{}/{}", self.workflow_url(id), action);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}

fn upload_form(files: Vec<InputFile>) -> Form {
    files.into_iter().fold(Form::new(), |form, file| {
        form.part(UPLOAD_FIELD, Part::bytes(file.contents).file_name(file.file_name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_file_accepts_text_and_bytes() {
        let config = InputFile::new("nextflow.config", "params.x = 1");
        assert_eq!(config.contents, b"params.x = 1");

        let reads = InputFile::new("reads_1.fq", vec![b'@', b'r']);
        assert_eq!(reads.file_name, "reads_1.fq");
        assert_eq!(reads.contents, b"@r");
    }

    #[test]
    fn test_workflow_url() {
        let client = WorkflowClient::new("http://localhost:8080/");
        assert_eq!(
            client.workflow_url(&WorkflowId::new("5f1d-a")),
            "http://localhost:8080/api/workflows/5f1d-a"
        );
    }
}
