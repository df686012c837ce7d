//! Timer facility
//!
//! Fire-once and periodic timers backed by Tokio tasks. A timer fires its
//! callback from its own task; cancelling it through [`TimerHandle::cancel`]
//! guarantees the callback does not run afterwards.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to an armed timer
#[derive(Debug)]
pub struct TimerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancels the timer. Consumes the handle so a timer is cancelled at most once.
    pub fn cancel(self) {
        self.cancel.cancel();
        self.task.abort();
    }

    /// Whether the timer task has ended (fired, stopped or cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Runs `callback` once after `delay`.
///
/// Must be called from within a Tokio runtime.
pub fn once<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = time::sleep(delay) => callback(),
        }
    });

    TimerHandle { cancel, task }
}

/// Runs `tick` every `period`, starting one period from now.
///
/// Fire times sit on a fixed grid anchored at arming time, so a slow tick does
/// not shift later ones. A tick's future is awaited before the next fire is
/// considered; fires that fall due meanwhile are skipped, never run
/// concurrently. The timer stops when `tick` returns [`ControlFlow::Break`]
/// or `cancel` is triggered.
///
/// # Panics
/// Panics if `period` is zero.
pub fn every<F, Fut>(period: Duration, cancel: CancellationToken, mut tick: F) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if tick().await.is_break() {
                break;
            }
        }
    });

    TimerHandle { cancel, task }
}
