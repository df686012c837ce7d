//! Workflow DTOs for the remote API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::workflow::WorkflowId;

/// Id addressing the "new workflow" resource; saving to it creates a workflow
pub const NEW_WORKFLOW_ID: &str = "0";

/// Name of the archive the server packs a finished workflow's output into
pub fn output_archive_name(id: &WorkflowId) -> String {
    format!("{}-output.tar.gz", id)
}

/// Pagination parameters for workflow listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 100,
        }
    }
}

/// Editable workflow fields sent on create/save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    pub pipeline: String,
    pub profiles: String,
    pub revision: String,
    pub input_dir: String,
    pub output_dir: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowDraft {
    /// Creates a draft with the server's defaults for everything but the pipeline
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            pipeline: pipeline.into(),
            profiles: "standard".to_string(),
            revision: "master".to_string(),
            input_dir: "input".to_string(),
            output_dir: "output".to_string(),
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Response to a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedWorkflow {
    #[serde(rename = "_id")]
    pub id: WorkflowId,
}

/// Acknowledgement (or error) body used by action endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub status: u16,
    pub message: String,
}
