//! Task lifecycle integration tests against the in-memory session backend
//!
//! 메모리 세션 백엔드로 태스크 수명주기를 검증한다.
//!
//! `cargo test -p tether-task --test lifecycle_test`

mod common;

use common::{workdir, Harness};
use std::time::Duration;
use tether_task::{Clock, StartOptions, TaskId, TaskManagerConfig, TaskRequest, TaskState};

fn request(instruction: &str) -> TaskRequest {
    TaskRequest::new(instruction, workdir())
}

async fn assert_consistent(h: &Harness, id: TaskId) {
    let task = h.manager.get(id).await.expect("task registered");
    assert!(
        task.is_consistent(),
        "endedAt must be set iff not running: {:?}",
        task
    );
}

#[tokio::test]
async fn test_start_detached_then_status() {
    let h = Harness::new();

    let started = h.manager.start(request("fix the build"), StartOptions::detached()).await;
    assert_eq!(started.status, TaskState::Running);
    assert!(started.output.is_none());

    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert_eq!(status.status, TaskState::Running);
    assert!(status.last_output.contains("started tether-"));
    assert_consistent(&h, started.task_id).await;

    let task = h.manager.get(started.task_id).await.unwrap();
    assert_eq!(task.session, started.task_id.session_name("tether-"));
    let session = h.sessions.session(&task.session).unwrap();
    assert_eq!(session.working_dir, workdir());
    assert!(session.command.contains("base64 -d"));
    assert!(!session.command.contains("fix the build"));
}

#[tokio::test]
async fn test_runtime_tracks_clock() {
    let h = Harness::new();
    let started = h.manager.start(request("a"), StartOptions::detached()).await;

    h.clock.advance(Duration::from_secs(42));
    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert!((status.runtime_seconds - 42.0).abs() < 1e-6);

    // Runtime freezes once the task ends
    h.manager.stop(started.task_id).await;
    h.clock.advance(Duration::from_secs(100));
    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert!((status.runtime_seconds - 42.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_creation_failure_is_failed_and_stable() {
    let h = Harness::new();
    h.sessions.fail_create("no server running on /tmp/tmux-0/default");

    let started = h.manager.start(request("x"), StartOptions::wait(Duration::from_secs(30))).await;
    assert_eq!(started.status, TaskState::Failed);
    let diagnostic = started.output.clone().unwrap();
    assert!(diagnostic.contains("no server running"));
    assert_consistent(&h, started.task_id).await;

    for _ in 0..3 {
        let status = h.manager.get_status(started.task_id).await.unwrap();
        assert_eq!(status.status, TaskState::Failed);
        assert_eq!(status.last_output, diagnostic);

        let output = h.manager.get_output(started.task_id, None).await.unwrap();
        assert_eq!(output.status, TaskState::Failed);
        assert_eq!(output.output, diagnostic);
    }

    let send = h.manager.send(started.task_id, "hello").await;
    assert!(!send.sent);
    assert!(send.error.unwrap().is_invalid_state());

    let stop = h.manager.stop(started.task_id).await;
    assert!(!stop.stopped);
}

#[tokio::test]
async fn test_missing_working_directory_fails() {
    let h = Harness::new();
    let req = TaskRequest::new("x", workdir().join("tether-does-not-exist-7f3a"));

    let started = h.manager.start(req, StartOptions::detached()).await;
    assert_eq!(started.status, TaskState::Failed);
    assert!(started.output.unwrap().contains("working directory"));
    assert_eq!(h.sessions.session_count(), 0);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let h = Harness::new();
    let id = TaskId::new();

    assert!(h.manager.get_status(id).await.unwrap_err().is_not_found());
    assert!(h.manager.get_output(id, Some(10)).await.unwrap_err().is_not_found());
    assert!(h.manager.send(id, "x").await.error.unwrap().is_not_found());
    assert!(h.manager.stop(id).await.error.unwrap().is_not_found());
    assert!(h.manager.get(id).await.is_none());
}

#[tokio::test]
async fn test_stop_twice() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;

    let first = h.manager.stop(started.task_id).await;
    assert!(first.stopped);
    assert!(first.error.is_none());

    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert_eq!(status.status, TaskState::Stopped);
    assert_eq!(status.last_output, "(session ended)");
    assert_consistent(&h, started.task_id).await;

    let second = h.manager.stop(started.task_id).await;
    assert!(!second.stopped);
    let err = second.error.unwrap();
    assert!(err.is_invalid_state());
    assert!(err.to_string().contains("not running"));
}

#[tokio::test]
async fn test_stop_marks_stopped_even_if_kill_fails() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;

    h.sessions.fail_kill(true);
    assert!(h.manager.stop(started.task_id).await.stopped);

    let task = h.manager.get(started.task_id).await.unwrap();
    assert_eq!(task.state, TaskState::Stopped);
    assert!(task.ended_at.is_some());
}

#[tokio::test]
async fn test_send_delivers_to_running_session() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;

    let send = h.manager.send(started.task_id, "yes, continue").await;
    assert!(send.sent);
    assert!(send.error.is_none());

    let session = h.manager.get(started.task_id).await.unwrap().session;
    assert_eq!(h.sessions.session(&session).unwrap().sent, vec!["yes, continue"]);

    let output = h.manager.get_output(started.task_id, Some(1)).await.unwrap();
    assert_eq!(output.output, "yes, continue");
}

#[tokio::test]
async fn test_send_after_session_ended_completes_task() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;
    let session = h.manager.get(started.task_id).await.unwrap().session;

    h.sessions.end(&session);

    let send = h.manager.send(started.task_id, "hello?").await;
    assert!(!send.sent);
    let err = send.error.unwrap();
    assert!(err.is_invalid_state());
    assert!(err.to_string().contains("already completed"));

    let task = h.manager.get(started.task_id).await.unwrap();
    assert_eq!(task.state, TaskState::Completed);
    assert!(h.sessions.session(&session).unwrap().sent.is_empty());
    assert_consistent(&h, started.task_id).await;
}

#[tokio::test]
async fn test_send_delivery_failure_keeps_task_running() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;

    h.sessions.fail_send(true);
    let send = h.manager.send(started.task_id, "hello").await;
    assert!(!send.sent);
    assert_eq!(send.error.unwrap().kind(), "delivery");

    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert_eq!(status.status, TaskState::Running);
}

#[tokio::test]
async fn test_list_reconciles_running_tasks() {
    let h = Harness::new();

    let mut ids = Vec::new();
    for name in ["first", "second", "third"] {
        ids.push(h.manager.start(request(name), StartOptions::detached()).await.task_id);
        h.clock.advance(Duration::from_secs(1));
    }

    assert!(h.manager.stop(ids[1]).await.stopped);

    let listed = h.manager.list().await;
    assert_eq!(listed.len(), 3);
    assert_eq!(
        listed.iter().map(|t| t.task_id).collect::<Vec<_>>(),
        ids,
        "list is oldest first"
    );
    assert_eq!(listed[0].status, TaskState::Running);
    assert_eq!(listed[1].status, TaskState::Stopped);
    assert_eq!(listed[2].status, TaskState::Running);
    assert_eq!(listed[0].prompt_summary, "first");
    assert_eq!(listed[0].working_directory, workdir());

    let third = h.manager.get(ids[2]).await.unwrap().session;
    h.sessions.end(&third);

    let listed = h.manager.list().await;
    assert_eq!(listed[0].status, TaskState::Running);
    assert_eq!(listed[1].status, TaskState::Stopped);
    assert_eq!(listed[2].status, TaskState::Completed);

    for id in ids {
        assert_consistent(&h, id).await;
    }

    let stats = h.manager.stats().await;
    assert_eq!(stats.total_tasks, 3);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.stopped, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_list_order_is_stable() {
    let h = Harness::new();
    for i in 0..5 {
        h.manager.start(request(&format!("task {}", i)), StartOptions::detached()).await;
    }

    let a: Vec<_> = h.manager.list().await.into_iter().map(|t| t.task_id).collect();
    let b: Vec<_> = h.manager.list().await.into_iter().map(|t| t.task_id).collect();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_prompt_summary_truncation() {
    let h = Harness::new();
    let long = "x".repeat(150);
    let short = "y".repeat(50);

    h.manager.start(request(&long), StartOptions::detached()).await;
    h.clock.advance(Duration::from_secs(1));
    h.manager.start(request(&short), StartOptions::detached()).await;

    let listed = h.manager.list().await;
    assert_eq!(listed[0].prompt_summary, format!("{}...", "x".repeat(100)));
    assert_eq!(listed[1].prompt_summary, short);
}

#[tokio::test]
async fn test_wait_returns_on_completion() {
    let h = Harness::new();
    h.sessions.set_lifetime(Some(Duration::from_secs(5)));
    let t0 = h.clock.now();

    let started = h
        .manager
        .start(request("x"), StartOptions::wait(Duration::from_secs(60)))
        .await;

    assert_eq!(started.status, TaskState::Completed);
    assert!(started.message.is_none());
    // Capture after the session is gone yields the sentinel
    assert_eq!(started.output.as_deref(), Some("(session ended)"));

    let waited = (h.clock.now() - t0).num_seconds();
    assert!((5..=6).contains(&waited), "waited {}s", waited);
    assert_consistent(&h, started.task_id).await;
}

#[tokio::test]
async fn test_wait_timeout_then_completion() {
    let h = Harness::new();
    h.sessions.set_lifetime(Some(Duration::from_secs(5)));

    let started = h
        .manager
        .start(request("x"), StartOptions::wait(Duration::from_secs(1)))
        .await;

    assert_eq!(started.status, TaskState::Running);
    assert!(started.message.unwrap().contains("Timeout reached"));
    assert_eq!(
        h.manager.get(started.task_id).await.unwrap().state,
        TaskState::Running
    );

    h.clock.advance(Duration::from_secs(10));
    let status = h.manager.get_status(started.task_id).await.unwrap();
    assert_eq!(status.status, TaskState::Completed);
    assert_consistent(&h, started.task_id).await;
}

#[tokio::test]
async fn test_wait_honours_poll_interval() {
    let config = TaskManagerConfig {
        poll_interval: Duration::from_secs(2),
        ..Default::default()
    };
    let h = Harness::with_config(config);

    let before = h.sessions.exists_calls();
    let started = h
        .manager
        .start(request("x"), StartOptions::wait(Duration::from_secs(10)))
        .await;
    assert_eq!(started.status, TaskState::Running);

    // Checks at t = 0, 2, 4, 6, 8, 10
    assert_eq!(h.sessions.exists_calls() - before, 6);
}

#[tokio::test]
async fn test_stop_during_wait_is_observed() {
    let h = Harness::new();

    let manager = h.manager.clone();
    let waiter = tokio::spawn(async move {
        manager
            .start(request("long job"), StartOptions::wait(Duration::from_secs(100_000)))
            .await
    });

    let id = loop {
        if let Some(task) = h.manager.list().await.first() {
            break task.task_id;
        }
        tokio::task::yield_now().await;
    };
    assert!(h.manager.stop(id).await.stopped);

    let started = waiter.await.unwrap();
    assert_eq!(started.task_id, id);
    assert_eq!(started.status, TaskState::Stopped);
    assert!(started.message.is_none());
    assert_consistent(&h, id).await;
}

#[tokio::test]
async fn test_concurrent_status_single_transition() {
    let h = Harness::new();
    let started = h.manager.start(request("x"), StartOptions::detached()).await;
    let session = h.manager.get(started.task_id).await.unwrap().session;
    h.sessions.end(&session);
    h.clock.advance(Duration::from_secs(3));

    let calls = (0..8).map(|_| h.manager.get_status(started.task_id));
    let results = futures::future::join_all(calls).await;

    let ended_at = h.manager.get(started.task_id).await.unwrap().ended_at;
    for result in results {
        let status = result.unwrap();
        assert_eq!(status.status, TaskState::Completed);
        assert!((status.runtime_seconds - 3.0).abs() < 1e-6);
    }
    assert!(ended_at.is_some());
}

#[tokio::test]
async fn test_many_tasks_unique_ids_and_sessions() {
    let h = Harness::new();
    let mut ids = std::collections::HashSet::new();
    for _ in 0..50 {
        let started = h.manager.start(request("x"), StartOptions::detached()).await;
        assert_eq!(started.status, TaskState::Running);
        assert!(ids.insert(started.task_id));
    }
    assert_eq!(h.sessions.session_count(), 50);
}
