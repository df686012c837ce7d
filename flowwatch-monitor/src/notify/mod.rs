//! Notification timer queue
//!
//! Transient notifications ("toasts") kept in insertion order. Each one
//! expires on its own timer and can be removed earlier by position or by id.
//! A notification's timer is cancelled exactly once, whichever way it leaves
//! the queue, and an expiry that arrives for an already removed notification
//! does nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use flowwatch_core::domain::notification::{
    ERROR_HEADER, Notification, NotificationId, NotificationKind,
};
use tokio::sync::watch;
use tracing::debug;

use crate::error::NotifyError;
use crate::timer::{self, TimerHandle};

struct ActiveNotification {
    notification: Notification,
    expiry: TimerHandle,
}

struct QueueState {
    next_id: u64,
    active: Vec<ActiveNotification>,
    published: watch::Sender<Vec<Notification>>,
}

impl QueueState {
    fn publish(&self) {
        let visible = self.active.iter().map(|a| a.notification.clone()).collect();
        self.published.send_replace(visible);
    }

    fn position(&self, id: NotificationId) -> Option<usize> {
        self.active.iter().position(|a| a.notification.id == id)
    }
}

/// Active notifications of the application
///
/// Create one per process and share it (e.g. behind an `Arc`) with every
/// view that reports to the user. Must be used from within a Tokio runtime.
pub struct NotificationQueue {
    state: Arc<Mutex<QueueState>>,
    lifetime: Duration,
}

impl NotificationQueue {
    /// Creates an empty queue whose notifications live for `lifetime`
    pub fn new(lifetime: Duration) -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            state: Arc::new(Mutex::new(QueueState {
                next_id: 1,
                active: Vec::new(),
                published,
            })),
            lifetime,
        }
    }

    /// Appends a notification and arms its expiry timer
    pub fn push(
        &self,
        kind: NotificationKind,
        header: Option<String>,
        message: impl Into<String>,
    ) -> NotificationId {
        let mut state = lock(&self.state);

        let id = NotificationId(state.next_id);
        state.next_id += 1;

        let weak = Arc::downgrade(&self.state);
        let expiry = timer::once(self.lifetime, move || expire(&weak, id));

        let notification = Notification {
            id,
            kind,
            header,
            message: message.into(),
            created_at: chrono::Utc::now(),
        };
        debug!(id = %id, %kind, message = %notification.message, "Notification pushed");

        state.active.push(ActiveNotification {
            notification,
            expiry,
        });
        state.publish();
        id
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.push(NotificationKind::Success, None, message)
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.push(NotificationKind::Info, None, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.push(NotificationKind::Warning, None, message)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.push(
            NotificationKind::Error,
            Some(ERROR_HEADER.to_string()),
            message,
        )
    }

    /// Removes the notification currently shown at `index`
    ///
    /// # Errors
    /// [`NotifyError::IndexOutOfRange`] when nothing occupies `index`; the
    /// queue is left untouched.
    pub fn remove(&self, index: usize) -> Result<Notification, NotifyError> {
        let mut state = lock(&self.state);

        let len = state.active.len();
        if index >= len {
            return Err(NotifyError::IndexOutOfRange { index, len });
        }

        let removed = state.active.remove(index);
        removed.expiry.cancel();
        state.publish();
        debug!(id = %removed.notification.id, index, "Notification removed");
        Ok(removed.notification)
    }

    /// Removes a notification by id; `None` if it already left the queue
    pub fn dismiss(&self, id: NotificationId) -> Option<Notification> {
        let mut state = lock(&self.state);

        let index = state.position(id)?;
        let removed = state.active.remove(index);
        removed.expiry.cancel();
        state.publish();
        debug!(id = %id, "Notification dismissed");
        Some(removed.notification)
    }

    /// Removes every notification and cancels their timers
    pub fn clear(&self) {
        let mut state = lock(&self.state);

        if state.active.is_empty() {
            return;
        }
        for entry in state.active.drain(..) {
            entry.expiry.cancel();
        }
        state.publish();
    }

    /// Snapshot of the active notifications, oldest first
    pub fn active(&self) -> Vec<Notification> {
        lock(&self.state)
            .active
            .iter()
            .map(|a| a.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver following the active list; updated on every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        lock(&self.state).published.subscribe()
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl Drop for NotificationQueue {
    fn drop(&mut self) {
        self.clear();
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Expiry callback; looks the notification up by id since earlier removals shift positions
fn expire(state: &Weak<Mutex<QueueState>>, id: NotificationId) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = lock(&state);

    let Some(index) = state.position(id) else {
        debug!(id = %id, "Expired notification already removed");
        return;
    };

    // the timer firing here is this entry's own; dropping the handle is enough
    state.active.remove(index);
    state.publish();
    debug!(id = %id, "Notification expired");
}
