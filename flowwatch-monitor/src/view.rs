//! Workflow view adapter
//!
//! A [`WorkflowView`] stands for one page showing workflows. It owns the
//! polling sessions started for that page and turns polling failures into
//! notifications. Closing or dropping the view stops all of its polling.

use std::collections::HashMap;
use std::sync::Arc;

use flowwatch_client::Result as ClientResult;
use flowwatch_core::domain::workflow::{JobStatus, WorkflowId, WorkflowSnapshot};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::notify::NotificationQueue;
use crate::poller::{PollEvent, PollingSessionManager};
use crate::service::JobService;

pub struct WorkflowView {
    service: Arc<dyn JobService>,
    sessions: PollingSessionManager,
    notifications: Arc<NotificationQueue>,
    relay: JoinHandle<()>,
}

impl WorkflowView {
    /// Creates a view reporting into `notifications`.
    ///
    /// Fails if `config` does not validate. Must be called from within a
    /// Tokio runtime.
    pub fn new(
        service: Arc<dyn JobService>,
        notifications: Arc<NotificationQueue>,
        config: &MonitorConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let sessions = PollingSessionManager::new(Arc::clone(&service), config.poll_interval);
        let relay = tokio::spawn(relay_events(
            sessions.subscribe(),
            Arc::clone(&notifications),
        ));

        Ok(Self {
            service,
            sessions,
            notifications,
            relay,
        })
    }

    /// Loads a workflow, shows its current log and polls it while it runs.
    ///
    /// Opening a workflow that is already shown refreshes it; polling is
    /// never doubled. A failure to load pushes an error notification and is
    /// returned; a failure to read the log only notifies.
    pub async fn open(&self, id: &WorkflowId) -> ClientResult<watch::Receiver<WorkflowSnapshot>> {
        let mut snapshot = match self.service.fetch_workflow(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.notifications
                    .error(format!("failed to load workflow {}: {}", id, e));
                return Err(e);
            }
        };

        match self.service.fetch_workflow_log(id).await {
            Ok(update) => snapshot.merge(update),
            Err(e) => {
                warn!(subject = %id, error = %e, "Failed to read workflow log");
                self.notifications
                    .error(format!("failed to read log of workflow {}: {}", id, e));
            }
        }

        let receiver = self.sessions.track(snapshot);
        self.sessions.start_if_needed(id);
        Ok(receiver)
    }

    /// Stops polling one workflow
    pub fn stop(&self, id: &WorkflowId) -> bool {
        self.sessions.cancel(id)
    }

    pub fn sessions(&self) -> &PollingSessionManager {
        &self.sessions
    }

    pub fn notifications(&self) -> &Arc<NotificationQueue> {
        &self.notifications
    }

    /// Tears the view down; equivalent to dropping it
    pub fn close(self) {}
}

impl Drop for WorkflowView {
    fn drop(&mut self) {
        let cancelled = self.sessions.cancel_all();
        self.relay.abort();
        debug!(sessions = cancelled, "Workflow view closed");
    }
}

/// Reports poll outcomes to the user.
///
/// Repeats of the same failure for a workflow are suppressed until that
/// workflow updates successfully again, so a server outage yields one
/// notification rather than one per tick.
async fn relay_events(
    mut events: broadcast::Receiver<PollEvent>,
    notifications: Arc<NotificationQueue>,
) {
    let mut last_failure: HashMap<WorkflowId, String> = HashMap::new();

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Poll event relay lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            PollEvent::FetchFailed { subject, message } => {
                if last_failure.get(&subject) == Some(&message) {
                    debug!(subject = %subject, "Suppressing repeated poll failure");
                    continue;
                }
                notifications.error(format!("failed to refresh workflow {}: {}", subject, message));
                last_failure.insert(subject, message);
            }
            PollEvent::Updated { subject, .. } => {
                last_failure.remove(&subject);
            }
            PollEvent::Finished { subject, status } => {
                last_failure.remove(&subject);
                match status {
                    JobStatus::Completed => {
                        notifications.success(format!("Workflow {} completed", subject));
                    }
                    JobStatus::Failed => {
                        notifications.error(format!("workflow {} failed", subject));
                    }
                    JobStatus::Nascent | JobStatus::Running => {}
                }
            }
        }
    }
}
