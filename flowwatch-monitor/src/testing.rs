//! Scripted job service for tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flowwatch_client::{ClientError, Result};
use flowwatch_core::domain::workflow::{JobStatus, WorkflowId, WorkflowSnapshot, WorkflowUpdate};

use crate::service::JobService;

/// Answers log fetches from a queue of scripted responses.
///
/// Once the queue is empty every fetch reports the job as still running.
#[derive(Default)]
pub(crate) struct ScriptedService {
    workflows: Mutex<HashMap<WorkflowId, WorkflowSnapshot>>,
    responses: Mutex<VecDeque<Result<WorkflowUpdate>>>,
    latency: Duration,
    log_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn add_workflow(&self, snapshot: WorkflowSnapshot) {
        self.workflows
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    pub(crate) fn respond(&self, response: Result<WorkflowUpdate>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn respond_log(&self, status: JobStatus, log: &str) {
        self.respond(Ok(WorkflowUpdate::status(status).with_log(log)));
    }

    pub(crate) fn fail(&self, status: u16, message: &str) {
        self.respond(Err(ClientError::api_error(status, message)));
    }

    pub(crate) fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn fetch_workflow(&self, id: &WorkflowId) -> Result<WorkflowSnapshot> {
        self.workflows
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn fetch_workflow_log(&self, _id: &WorkflowId) -> Result<WorkflowUpdate> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(WorkflowUpdate::status(JobStatus::Running)))
    }
}

pub(crate) fn running(id: &str) -> WorkflowSnapshot {
    WorkflowSnapshot::new(id, JobStatus::Running)
}
