use std::sync::Arc;
use std::time::Duration;

use flowwatch_core::domain::workflow::{JobStatus, WorkflowId, WorkflowSnapshot, WorkflowUpdate};
use tokio::time::sleep;

use super::*;
use crate::testing::{ScriptedService, running};

const INTERVAL: Duration = Duration::from_secs(2);

fn manager(service: &Arc<ScriptedService>) -> PollingSessionManager {
    PollingSessionManager::new(Arc::clone(service) as Arc<dyn JobService>, INTERVAL)
}

fn id(s: &str) -> WorkflowId {
    WorkflowId::new(s)
}

#[tokio::test(start_paused = true)]
async fn test_start_if_needed_is_idempotent() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);
    sessions.track(running("wf-1"));

    assert!(sessions.start_if_needed(&id("wf-1")));
    assert!(!sessions.start_if_needed(&id("wf-1")));
    assert_eq!(sessions.active_sessions(), vec![id("wf-1")]);

    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(service.log_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_session_unless_running() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);

    for (name, status) in [
        ("nascent", JobStatus::Nascent),
        ("completed", JobStatus::Completed),
        ("failed", JobStatus::Failed),
    ] {
        sessions.track(WorkflowSnapshot::new(name, status));
        assert!(!sessions.start_if_needed(&id(name)));
    }
    assert!(!sessions.start_if_needed(&id("untracked")));

    sleep(Duration::from_secs(10)).await;
    assert!(sessions.active_sessions().is_empty());
    assert_eq!(service.log_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_merge_and_publish() {
    let service = Arc::new(ScriptedService::new());
    service.respond_log(JobStatus::Running, "A");
    service.respond_log(JobStatus::Running, "AB");
    let sessions = manager(&service);
    let mut rx = sessions.track(running("wf-1"));
    rx.borrow_and_update();
    sessions.start_if_needed(&id("wf-1"));

    sleep(Duration::from_millis(2_100)).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().log.as_deref(), Some("A"));

    sleep(INTERVAL).await;
    let held = rx.borrow_and_update().clone();
    assert_eq!(held.status, JobStatus::Running);
    assert_eq!(held.log.as_deref(), Some("AB"));
    assert!(sessions.is_polling(&id("wf-1")));
}

#[tokio::test(start_paused = true)]
async fn test_session_ends_on_terminal_status() {
    for terminal in [JobStatus::Completed, JobStatus::Failed] {
        let service = Arc::new(ScriptedService::new());
        service.respond_log(JobStatus::Running, "AB");
        service.respond(Ok(WorkflowUpdate::status(terminal)));
        let sessions = manager(&service);
        let mut events = sessions.subscribe();
        sessions.track(running("wf-1"));
        sessions.start_if_needed(&id("wf-1"));

        sleep(Duration::from_millis(4_100)).await;
        assert!(!sessions.is_polling(&id("wf-1")));

        let held = sessions.snapshot(&id("wf-1")).unwrap();
        assert_eq!(held.status, terminal);
        assert_eq!(held.log.as_deref(), Some("AB"));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(service.log_calls(), 2);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received.last(),
            Some(&PollEvent::Finished {
                subject: id("wf-1"),
                status: terminal,
            })
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_keeps_polling() {
    let service = Arc::new(ScriptedService::new());
    service.fail(503, "unavailable");
    service.respond_log(JobStatus::Running, "still going");
    let sessions = manager(&service);
    let mut events = sessions.subscribe();
    sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));

    sleep(Duration::from_millis(2_100)).await;
    assert!(sessions.is_polling(&id("wf-1")));
    match events.try_recv().unwrap() {
        PollEvent::FetchFailed { subject, message } => {
            assert_eq!(subject, id("wf-1"));
            assert!(message.contains("unavailable"));
        }
        other => panic!("unexpected event {:?}", other),
    }

    sleep(INTERVAL).await;
    assert_eq!(service.log_calls(), 2);
    assert_eq!(
        sessions.snapshot(&id("wf-1")).unwrap().log.as_deref(),
        Some("still going")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);
    sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));

    assert!(sessions.cancel(&id("wf-1")));
    assert!(!sessions.cancel(&id("wf-1")));
    assert!(!sessions.cancel(&id("never-tracked")));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(service.log_calls(), 0);

    // a cancelled subject can be polled again
    assert!(sessions.start_if_needed(&id("wf-1")));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_stops_every_session() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);
    for name in ["a", "b", "c"] {
        sessions.track(running(name));
        sessions.start_if_needed(&id(name));
    }

    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(service.log_calls(), 3);

    assert_eq!(sessions.cancel_all(), 3);
    assert!(sessions.active_sessions().is_empty());

    sleep(Duration::from_secs(20)).await;
    assert_eq!(service.log_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_result_after_cancel_is_discarded() {
    let service = Arc::new(ScriptedService::with_latency(Duration::from_secs(1)));
    service.respond_log(JobStatus::Completed, "late");
    let sessions = manager(&service);
    let mut events = sessions.subscribe();
    let rx = sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));

    // the first fetch is in flight between 2.0s and 3.0s
    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(service.log_calls(), 1);
    sessions.cancel(&id("wf-1"));

    sleep(Duration::from_secs(5)).await;
    let held = rx.borrow().clone();
    assert_eq!(held.status, JobStatus::Running);
    assert_eq!(held.log, None);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetches_do_not_overlap() {
    let service = Arc::new(ScriptedService::with_latency(Duration::from_secs(3)));
    let sessions = manager(&service);
    sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));

    sleep(Duration::from_secs(20)).await;
    assert!(service.log_calls() >= 3);
    assert_eq!(service.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_sessions() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);
    sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));
    drop(sessions);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(service.log_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_views_own_separate_sessions() {
    let service = Arc::new(ScriptedService::new());
    let first = manager(&service);
    let second = manager(&service);
    for sessions in [&first, &second] {
        sessions.track(running("shared"));
        assert!(sessions.start_if_needed(&id("shared")));
    }

    sleep(Duration::from_millis(2_100)).await;
    assert_eq!(service.log_calls(), 2);

    drop(first);
    sleep(INTERVAL).await;
    assert_eq!(service.log_calls(), 3);
    assert!(second.is_polling(&id("shared")));
}

#[tokio::test(start_paused = true)]
async fn test_track_merges_onto_held_snapshot() {
    let service = Arc::new(ScriptedService::new());
    service.respond_log(JobStatus::Running, "partial log");
    let sessions = manager(&service);
    sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));
    sleep(Duration::from_millis(2_100)).await;

    let mut reloaded = running("wf-1");
    reloaded.fields.insert("name".into(), serde_json::json!("rnaseq"));
    let rx = sessions.track(reloaded);

    let held = rx.borrow().clone();
    assert_eq!(held.log.as_deref(), Some("partial log"));
    assert_eq!(held.field_str("name"), Some("rnaseq"));
    assert_eq!(sessions.active_sessions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_still_polls() {
    let service = Arc::new(ScriptedService::new());
    let sessions =
        PollingSessionManager::new(Arc::clone(&service) as Arc<dyn JobService>, Duration::ZERO);
    sessions.track(running("wf-1"));

    assert!(sessions.start_if_needed(&id("wf-1")));
    sleep(Duration::from_millis(10)).await;

    assert!(sessions.is_polling(&id("wf-1")));
    assert!(service.log_calls() >= 5);
}

#[tokio::test(start_paused = true)]
async fn test_apply_with_cancelled_token_changes_nothing() {
    let service = Arc::new(ScriptedService::new());
    let sessions = manager(&service);
    let mut rx = sessions.track(running("wf-1"));
    rx.borrow_and_update();
    let mut events = sessions.subscribe();

    let token = CancellationToken::new();
    token.cancel();
    let flow = sessions.inner.apply(
        &id("wf-1"),
        &token,
        Ok(WorkflowUpdate::status(JobStatus::Completed).with_log("late")),
    );

    assert_eq!(flow, ControlFlow::Break(()));
    assert!(!rx.has_changed().unwrap());
    let held = sessions.snapshot(&id("wf-1")).unwrap();
    assert_eq!(held.status, JobStatus::Running);
    assert_eq!(held.log, None);
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_holding_borrow_does_not_block_ticks() {
    let service = Arc::new(ScriptedService::new());
    let sessions = PollingSessionManager::new(
        Arc::clone(&service) as Arc<dyn JobService>,
        Duration::from_millis(1),
    );
    let rx = sessions.track(running("wf-1"));
    sessions.start_if_needed(&id("wf-1"));

    let started = std::time::Instant::now();
    while started.elapsed() < Duration::from_millis(200) {
        let held = rx.borrow();
        assert!(sessions.is_polling(&held.id));
        assert_eq!(sessions.active_sessions().len(), 1);
        std::thread::sleep(Duration::from_micros(200));
        drop(held);
        tokio::task::yield_now().await;
    }

    assert!(service.log_calls() > 0);
}
