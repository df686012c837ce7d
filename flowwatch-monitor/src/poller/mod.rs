//! Polling session manager
//!
//! Keeps the locally held snapshot of each tracked workflow current by
//! re-fetching its log while the job runs. There is at most one session per
//! workflow; it ends on its own once the job leaves `running`, or when it is
//! cancelled. Dropping the manager cancels everything it started.
//!
//! Snapshot receivers follow tokio's `watch` rules: do not hold a
//! [`borrow`](watch::Receiver::borrow) across a call into the manager, clone
//! what you need out of it first.

mod event;

pub use event::PollEvent;

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use flowwatch_client::Result as ClientResult;
use flowwatch_core::domain::workflow::{WorkflowId, WorkflowSnapshot, WorkflowUpdate};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::JobService;
use crate::timer::{self, TimerHandle};

/// Capacity of the event channel; slow subscribers see `Lagged` beyond this
const EVENT_CAPACITY: usize = 64;

/// Shortest period a session polls at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Recurring fetch for one workflow
struct PollingSession {
    token: CancellationToken,
    timer: TimerHandle,
}

impl PollingSession {
    fn cancel(self) {
        // cancelling the token first makes any in-flight tick discard its result
        self.token.cancel();
        self.timer.cancel();
    }
}

/// Held state for one tracked workflow
struct Subject {
    snapshot: Arc<watch::Sender<WorkflowSnapshot>>,
    session: Option<PollingSession>,
}

struct Inner {
    service: Arc<dyn JobService>,
    interval: Duration,
    subjects: Mutex<HashMap<WorkflowId, Subject>>,
    events: broadcast::Sender<PollEvent>,
}

/// Owns the polling sessions of one view
pub struct PollingSessionManager {
    inner: Arc<Inner>,
}

impl PollingSessionManager {
    /// Creates a manager polling through `service` every `interval`.
    ///
    /// An interval below [`MIN_POLL_INTERVAL`] is raised to it; use
    /// [`MonitorConfig::validate`](crate::MonitorConfig::validate) to reject a
    /// zero interval up front.
    pub fn new(service: Arc<dyn JobService>, interval: Duration) -> Self {
        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(
                interval_ms = interval.as_millis() as u64,
                "Poll interval too short, using {}ms",
                MIN_POLL_INTERVAL.as_millis()
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                service,
                interval,
                subjects: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Records a freshly fetched snapshot and returns a receiver that follows it.
    ///
    /// If the workflow is already tracked the snapshot is merged onto the held
    /// one. This is what [`start_if_needed`](Self::start_if_needed) decides on.
    pub fn track(&self, snapshot: WorkflowSnapshot) -> watch::Receiver<WorkflowSnapshot> {
        let mut subjects = self.inner.subjects();

        if let Some(subject) = subjects.get(&snapshot.id) {
            let sender = Arc::clone(&subject.snapshot);
            drop(subjects);

            sender.send_modify(|held| held.merge(snapshot.into()));
            return sender.subscribe();
        }

        let id = snapshot.id.clone();
        let (sender, receiver) = watch::channel(snapshot);
        subjects.insert(
            id,
            Subject {
                snapshot: Arc::new(sender),
                session: None,
            },
        );
        receiver
    }

    /// Starts polling `id` if its held status is `running` and no session exists.
    ///
    /// Returns `true` when a session was created. Calling it again while the
    /// workflow is already polled does nothing.
    pub fn start_if_needed(&self, id: &WorkflowId) -> bool {
        let mut subjects = self.inner.subjects();

        let Some(subject) = subjects.get_mut(id) else {
            debug!(subject = %id, "Workflow not tracked, not polling");
            return false;
        };

        if subject.session.is_some() {
            return false;
        }

        let status = subject.snapshot.borrow().status;
        if !status.is_running() {
            debug!(subject = %id, %status, "Workflow not running, not polling");
            return false;
        }

        subject.session = Some(self.arm(id.clone()));
        info!(
            subject = %id,
            interval_ms = self.inner.interval.as_millis() as u64,
            "Started polling session"
        );
        true
    }

    /// Stops polling `id`. Returns `true` if a session was active.
    pub fn cancel(&self, id: &WorkflowId) -> bool {
        let mut subjects = self.inner.subjects();

        match subjects.get_mut(id).and_then(|s| s.session.take()) {
            Some(session) => {
                session.cancel();
                info!(subject = %id, "Cancelled polling session");
                true
            }
            None => false,
        }
    }

    /// Stops every session. No tick of this manager runs after it returns.
    ///
    /// Returns the number of sessions that were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut subjects = self.inner.subjects();

        let mut cancelled = 0;
        for session in subjects.values_mut().filter_map(|s| s.session.take()) {
            session.cancel();
            cancelled += 1;
        }

        if cancelled > 0 {
            info!(sessions = cancelled, "Cancelled all polling sessions");
        }
        cancelled
    }

    pub fn is_polling(&self, id: &WorkflowId) -> bool {
        self.inner
            .subjects()
            .get(id)
            .is_some_and(|s| s.session.is_some())
    }

    /// Workflows that currently have a session
    pub fn active_sessions(&self) -> Vec<WorkflowId> {
        let subjects = self.inner.subjects();
        let mut ids: Vec<_> = subjects
            .iter()
            .filter(|(_, s)| s.session.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Current held snapshot of a tracked workflow
    pub fn snapshot(&self, id: &WorkflowId) -> Option<WorkflowSnapshot> {
        self.inner
            .subjects()
            .get(id)
            .map(|s| s.snapshot.borrow().clone())
    }

    /// Receiver following the held snapshot of a tracked workflow
    pub fn watch(&self, id: &WorkflowId) -> Option<watch::Receiver<WorkflowSnapshot>> {
        self.inner.subjects().get(id).map(|s| s.snapshot.subscribe())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.inner.events.subscribe()
    }

    fn arm(&self, subject: WorkflowId) -> PollingSession {
        let token = CancellationToken::new();
        let inner = Arc::downgrade(&self.inner);
        let session_token = token.clone();

        let timer = timer::every(self.inner.interval, token.clone(), move || {
            let inner: Weak<Inner> = inner.clone();
            let subject = subject.clone();
            let token = session_token.clone();
            async move {
                match inner.upgrade() {
                    Some(inner) => inner.tick(&subject, &token).await,
                    None => ControlFlow::Break(()),
                }
            }
        });

        PollingSession { token, timer }
    }
}

impl Drop for PollingSessionManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl Inner {
    fn subjects(&self) -> MutexGuard<'_, HashMap<WorkflowId, Subject>> {
        self.subjects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One poll: fetch, then apply the result unless the session was cancelled meanwhile
    async fn tick(&self, subject: &WorkflowId, token: &CancellationToken) -> ControlFlow<()> {
        debug!(subject = %subject, "Polling workflow log");
        let result = self.service.fetch_workflow_log(subject).await;
        self.apply(subject, token, result)
    }

    fn apply(
        &self,
        subject: &WorkflowId,
        token: &CancellationToken,
        result: ClientResult<WorkflowUpdate>,
    ) -> ControlFlow<()> {
        let sender = {
            let subjects = self.subjects();

            // checked under the lock: cancel() cancels the token while holding it
            if token.is_cancelled() {
                debug!(subject = %subject, "Discarding poll result of cancelled session");
                return ControlFlow::Break(());
            }

            match subjects.get(subject) {
                Some(entry) => Arc::clone(&entry.snapshot),
                None => return ControlFlow::Break(()),
            }
        };

        let update = match result {
            Ok(update) => update,
            Err(_) if token.is_cancelled() => return ControlFlow::Break(()),
            Err(e) => {
                warn!(subject = %subject, error = %e, "Failed to poll workflow");
                let _ = self.events.send(PollEvent::FetchFailed {
                    subject: subject.clone(),
                    message: e.to_string(),
                });
                return ControlFlow::Continue(());
            }
        };

        // published outside the subjects lock, token re-checked under the write lock
        let applied = sender.send_if_modified(|held| {
            if token.is_cancelled() {
                return false;
            }
            held.merge(update);
            true
        });
        if !applied {
            debug!(subject = %subject, "Discarding poll result of cancelled session");
            return ControlFlow::Break(());
        }

        let status = sender.borrow().status;
        let _ = self.events.send(PollEvent::Updated {
            subject: subject.clone(),
            status,
        });

        if status.is_running() {
            return ControlFlow::Continue(());
        }

        {
            let mut subjects = self.subjects();
            if token.is_cancelled() {
                return ControlFlow::Break(());
            }
            // an uncancelled token means the held session is still this one
            if let Some(session) = subjects.get_mut(subject).and_then(|s| s.session.take()) {
                session.cancel();
            }
        }

        info!(subject = %subject, %status, "Workflow no longer running, polling stopped");
        let _ = self.events.send(PollEvent::Finished {
            subject: subject.clone(),
            status,
        });
        ControlFlow::Break(())
    }
}

#[cfg(test)]
mod tests;
