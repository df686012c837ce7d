//! Workflow domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque workflow identifier as assigned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkflowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Workflow execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Nascent,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the remote job is still executing. Only a running job is polled.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the job has reached an end state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nascent => "nascent",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally held view of a workflow
///
/// Everything besides the id, status and log is kept as opaque JSON so
/// job metadata passes through without the monitor having to model it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    #[serde(rename = "_id")]
    pub id: WorkflowId,
    pub status: JobStatus,
    /// Accumulated run log; absent until the log endpoint has been read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WorkflowSnapshot {
    pub fn new(id: impl Into<WorkflowId>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            log: None,
            fields: Map::new(),
        }
    }

    /// Applies a partial update field by field.
    ///
    /// Fields missing from `update` keep their current value. The id of the
    /// snapshot is never rewritten.
    pub fn merge(&mut self, update: WorkflowUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.log.is_some() {
            self.log = update.log;
        }
        self.fields.extend(update.fields);
    }

    /// The log text, empty when none has been fetched yet
    pub fn log_text(&self) -> &str {
        self.log.as_deref().unwrap_or("")
    }

    /// Looks up a pass-through field as a string (e.g. `name`, `pipeline`)
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Looks up a pass-through field holding a list of strings
    /// (e.g. `input_files`, `output_files`). Non-string entries are skipped.
    pub fn field_list(&self, key: &str) -> Option<Vec<&str>> {
        let items = self.fields.get(key)?.as_array()?;
        Some(items.iter().filter_map(Value::as_str).collect())
    }

    pub fn field_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }
}

/// Partial workflow as returned by the log endpoint
///
/// Every field is optional; see [`WorkflowSnapshot::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WorkflowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WorkflowUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }
}

impl From<WorkflowSnapshot> for WorkflowUpdate {
    /// A full snapshot applied as an update: status and fields always present,
    /// log only when the snapshot carried one.
    fn from(snapshot: WorkflowSnapshot) -> Self {
        Self {
            id: Some(snapshot.id),
            status: Some(snapshot.status),
            log: snapshot.log,
            fields: snapshot.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(JobStatus::Running.is_running());
        assert!(!JobStatus::Nascent.is_running());
        assert!(!JobStatus::Nascent.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(JobStatus::Failed).unwrap(), json!("failed"));
        let status: JobStatus = serde_json::from_value(json!("nascent")).unwrap();
        assert_eq!(status, JobStatus::Nascent);
        assert!(serde_json::from_value::<JobStatus>(json!("Running")).is_err());
    }

    #[test]
    fn test_merge_overwrites_present_fields() {
        let mut snapshot = WorkflowSnapshot::new("wf-1", JobStatus::Running);
        snapshot.merge(WorkflowUpdate::status(JobStatus::Running).with_log("A"));
        snapshot.merge(WorkflowUpdate::status(JobStatus::Running).with_log("AB"));

        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.log.as_deref(), Some("AB"));
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut snapshot = WorkflowSnapshot::new("wf-1", JobStatus::Running);
        snapshot.merge(WorkflowUpdate::status(JobStatus::Running).with_log("AB"));
        snapshot.merge(WorkflowUpdate::status(JobStatus::Completed));

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.log.as_deref(), Some("AB"));
    }

    #[test]
    fn test_merge_ignores_update_id() {
        let mut snapshot = WorkflowSnapshot::new("wf-1", JobStatus::Running);
        let update: WorkflowUpdate =
            serde_json::from_value(json!({ "_id": "other", "status": "failed" })).unwrap();
        snapshot.merge(update);

        assert_eq!(snapshot.id.as_str(), "wf-1");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(!snapshot.fields.contains_key("_id"));
    }

    #[test]
    fn test_full_snapshot_merge_keeps_fetched_log() {
        let mut held = WorkflowSnapshot::new("wf-1", JobStatus::Running);
        held.merge(WorkflowUpdate::status(JobStatus::Running).with_log("line 1\n"));

        let mut reloaded = WorkflowSnapshot::new("wf-1", JobStatus::Completed);
        reloaded.fields.insert("name".into(), json!("demo"));
        held.merge(reloaded.into());

        assert_eq!(held.status, JobStatus::Completed);
        assert_eq!(held.log_text(), "line 1\n");
        assert_eq!(held.field_str("name"), Some("demo"));
    }

    #[test]
    fn test_file_listing_fields() {
        let snapshot: WorkflowSnapshot = serde_json::from_value(json!({
            "_id": "5f1d",
            "status": "completed",
            "input_files": ["input/reads_1.fq", "input/reads_2.fq"],
            "output_files": [],
            "output_data": true
        }))
        .unwrap();

        assert_eq!(
            snapshot.field_list("input_files"),
            Some(vec!["input/reads_1.fq", "input/reads_2.fq"])
        );
        assert_eq!(snapshot.field_list("output_files"), Some(vec![]));
        assert_eq!(snapshot.field_list("missing"), None);
        assert_eq!(snapshot.field_bool("output_data"), Some(true));
        assert_eq!(snapshot.field_bool("input_files"), None);
    }

    #[test]
    fn test_snapshot_passes_through_metadata() {
        let mut snapshot: WorkflowSnapshot = serde_json::from_value(json!({
            "_id": "5f1d",
            "name": "rnaseq",
            "pipeline": "nf-core/rnaseq",
            "status": "running",
            "date_created": 1600000000000u64
        }))
        .unwrap();

        assert_eq!(snapshot.log, None);
        assert_eq!(snapshot.log_text(), "");
        assert_eq!(snapshot.field_str("pipeline"), Some("nf-core/rnaseq"));

        snapshot.merge(serde_json::from_value(json!({ "pid": 4242 })).unwrap());
        assert_eq!(snapshot.field_str("name"), Some("rnaseq"));
        assert_eq!(snapshot.fields.get("pid"), Some(&json!(4242)));

        let round = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(round["_id"], json!("5f1d"));
        assert_eq!(round["date_created"], json!(1600000000000u64));
    }
}
