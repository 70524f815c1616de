//! Session Manager 与事件流集成测试

mod common;

use std::sync::Arc;
use std::time::Duration;

use algopeeps::dispatch::mailbox;
use algopeeps::opencode::{
    consume_events, spawn_subscription, supervise_subscription, Part, PartSource,
};
use algopeeps::{
    BackendEvent, Error, Message, SessionManager, SessionPolicy, SessionStatus, Source,
};
use common::{recv, MockBackend};
use tokio_util::sync::CancellationToken;

fn manager(backend: &Arc<MockBackend>) -> SessionManager {
    SessionManager::new(backend.clone(), SessionPolicy::default())
}

fn fast_policy(max_attempts: u32) -> SessionPolicy {
    SessionPolicy {
        max_attempts,
        retry_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_ensure_session_is_idempotent_when_healthy() {
    let backend = Arc::new(MockBackend::new());
    let session = manager(&backend);
    assert_eq!(session.status(), SessionStatus::NoSession);

    let first = session.ensure_session().await.unwrap();
    let second = session.ensure_session().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.create_count(), 1);
    // 第二次只做存活探测
    assert_eq!(backend.get_count(), 1);
    assert!(session.is_connected());
    assert_eq!(session.session_id(), Some(first));
}

#[tokio::test(start_paused = true)]
async fn test_ensure_session_exhausts_retry_budget() {
    let backend = Arc::new(MockBackend::new().failing_creates(u32::MAX));
    let session = manager(&backend);

    let err = session.ensure_session().await.unwrap_err();

    match &err {
        Error::SessionCreation { attempts, source } => {
            assert_eq!(*attempts, 3);
            assert!(source.to_string().contains("create failed #3"));
        }
        other => panic!("Expected SessionCreation, got {:?}", other),
    }
    assert!(err.to_string().contains("create failed #3"));

    let times = backend.create_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(1), "gap too short: {:?}", gap);
        assert!(gap < Duration::from_millis(1100), "gap too long: {:?}", gap);
    }

    assert_eq!(session.status(), SessionStatus::NoSession);
    assert!(session.session_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ensure_session_recovers_after_transient_failures() {
    let backend = Arc::new(MockBackend::new().failing_creates(2));
    let session = manager(&backend);

    let id = session.ensure_session().await.unwrap();

    assert_eq!(id, "ses_1");
    assert_eq!(backend.create_count(), 3);
    assert_eq!(session.status(), SessionStatus::Connected);
}

#[tokio::test]
async fn test_failed_probe_recreates_session() {
    let backend = Arc::new(MockBackend::new());
    let session = SessionManager::new(backend.clone(), fast_policy(3));

    let first = session.ensure_session().await.unwrap();
    backend.set_healthy(false);
    let second = session.ensure_session().await.unwrap();

    assert_ne!(first, second);
    assert_eq!(backend.create_count(), 2);
    assert_eq!(session.session_id(), Some(second));
}

#[tokio::test]
async fn test_concurrent_ensure_creates_single_session() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(SessionManager::new(backend.clone(), fast_policy(3)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.ensure_session().await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    assert!(ids.iter().all(|id| id == &ids[0]));
    assert_eq!(backend.create_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ensure_shares_failed_sequence() {
    let backend = Arc::new(MockBackend::new().failing_creates(u32::MAX));
    let session = Arc::new(manager(&backend));
    let started = tokio::time::Instant::now();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.ensure_session().await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        match err {
            Error::SessionCreation { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("create failed #3"));
            }
            other => panic!("Expected SessionCreation, got {:?}", other),
        }
    }

    // 一轮重试，而不是每个调用方各一轮
    assert_eq!(backend.create_count(), 3);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(session.status(), SessionStatus::NoSession);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_after_shared_failure_starts_new_sequence() {
    let backend = Arc::new(MockBackend::new().failing_creates(3));
    let session = Arc::new(manager(&backend));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.ensure_session().await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }
    assert_eq!(backend.create_count(), 3);

    // 后端恢复后的新调用重新创建
    let id = session.ensure_session().await.unwrap();
    assert_eq!(id, "ses_1");
    assert_eq!(backend.create_count(), 4);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_send_prompt_requires_session() {
    let backend = Arc::new(MockBackend::new());
    let session = manager(&backend);

    let err = session.send_prompt("code-reviewer", "hello").await.unwrap_err();
    assert!(matches!(err, Error::NoActiveSession));
    assert!(backend.prompts().is_empty());

    let id = session.ensure_session().await.unwrap();
    session.send_prompt("code-reviewer", "hello").await.unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].session_id, id);
    assert_eq!(prompts[0].agent, "code-reviewer");
    assert_eq!(prompts[0].text, "hello");
}

#[tokio::test]
async fn test_send_prompt_failure_is_not_retried() {
    let backend = Arc::new(MockBackend::new());
    backend.set_fail_prompts(true);
    let session = manager(&backend);
    session.ensure_session().await.unwrap();

    assert!(session.send_prompt("bug-spotter", "x").await.is_err());
    assert_eq!(backend.prompts().len(), 1);
}

fn delta(agent: &str, text: &str) -> BackendEvent {
    BackendEvent::MessagePartUpdated {
        part: Part {
            source: Some(PartSource {
                kind: "agent".to_string(),
                value: agent.to_string(),
            }),
            ..Default::default()
        },
        delta: Some(text.to_string()),
    }
}

#[tokio::test]
async fn test_consume_events_translates_until_stream_ends() {
    let backend = Arc::new(MockBackend::new().with_events(vec![
        Ok(delta("code-reviewer", "Looks ")),
        Ok(BackendEvent::Unrecognized {
            event_type: "file.edited".to_string(),
        }),
        Ok(delta("code-reviewer", "good.")),
        Ok(BackendEvent::SessionIdle {
            session_id: "ses_other".to_string(),
        }),
        Ok(BackendEvent::SessionIdle {
            session_id: "ses_1".to_string(),
        }),
    ]));
    let session = manager(&backend);
    session.ensure_session().await.unwrap();

    let (tx, mut rx) = mailbox(16);
    consume_events(&session, &tx, CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }

    assert_eq!(
        messages,
        vec![
            Message::AgentText {
                agent: "code-reviewer".to_string(),
                text: "Looks ".to_string(),
            },
            Message::AgentText {
                agent: "code-reviewer".to_string(),
                text: "good.".to_string(),
            },
            Message::AgentIdle {
                agent: "code-reviewer".to_string(),
            },
            Message::AgentIdle {
                agent: "bug-spotter".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_consume_events_stream_error_is_terminal() {
    let backend = Arc::new(MockBackend::new().with_events(vec![
        Ok(delta("bug-spotter", "a")),
        Err(Error::Stream("connection reset".to_string())),
        Ok(delta("bug-spotter", "never delivered")),
    ]));
    let session = manager(&backend);
    session.ensure_session().await.unwrap();

    let (tx, mut rx) = mailbox(16);
    let err = consume_events(&session, &tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Stream(ref m) if m.contains("connection reset")));

    drop(tx);
    assert!(matches!(rx.recv().await, Some(Message::AgentText { .. })));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_consume_events_requires_session() {
    let backend = Arc::new(MockBackend::new());
    let session = manager(&backend);
    let (tx, _rx) = mailbox(4);

    let err = consume_events(&session, &tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoActiveSession));
}

#[tokio::test]
async fn test_consume_events_cancellation_unblocks() {
    let backend = Arc::new(MockBackend::new().holding_stream_open());
    let session = manager(&backend);
    session.ensure_session().await.unwrap();

    let (tx, _rx) = mailbox(4);
    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { consume_events(&session, &tx, cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_spawn_subscription_reports_ready_then_stream_error_once() {
    let backend = Arc::new(MockBackend::new().with_events(vec![Err(Error::Stream(
        "eof".to_string(),
    ))]));
    let session = Arc::new(manager(&backend));
    let (tx, mut rx) = mailbox(16);

    let handle = spawn_subscription(session, tx, CancellationToken::new());
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(Error::Stream(_))));

    assert_eq!(
        recv(&mut rx).await,
        Message::SessionReady {
            session_id: "ses_1".to_string()
        }
    );
    assert_eq!(
        recv(&mut rx).await,
        Message::ConnectionStatus {
            source: Source::Backend,
            connected: true
        }
    );
    match recv(&mut rx).await {
        Message::Error { context, message } => {
            assert_eq!(context, "OpenCode event stream");
            assert!(message.contains("eof"));
        }
        other => panic!("Expected Error, got {:?}", other),
    }
    assert_eq!(
        recv(&mut rx).await,
        Message::ConnectionStatus {
            source: Source::Backend,
            connected: false
        }
    );
    // 所有发送方已退出，不会再有第二条错误
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_spawn_subscription_reports_session_failure() {
    let backend = Arc::new(MockBackend::new().failing_creates(u32::MAX));
    let session = Arc::new(SessionManager::new(backend.clone(), fast_policy(2)));
    let (tx, mut rx) = mailbox(16);

    let result = spawn_subscription(session, tx, CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(result, Err(Error::SessionCreation { attempts: 2, .. })));

    match recv(&mut rx).await {
        Message::Error { context, .. } => assert_eq!(context, "OpenCode session initialization"),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
    assert_eq!(backend.create_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_subscription_recovers_when_backend_comes_up() {
    let backend = Arc::new(MockBackend::new().failing_creates(2).holding_stream_open());
    let session = Arc::new(SessionManager::new(backend.clone(), fast_policy(2)));
    let (tx, mut rx) = mailbox(16);
    let cancel = CancellationToken::new();
    let started = tokio::time::Instant::now();

    let handle = supervise_subscription(
        session.clone(),
        tx,
        Duration::from_secs(5),
        cancel.clone(),
    );

    match rx.recv().await.unwrap() {
        Message::Error { context, .. } => assert_eq!(context, "OpenCode session initialization"),
        other => panic!("Expected Error, got {:?}", other),
    }

    // 等待间隔后重新订阅成功
    assert_eq!(
        rx.recv().await.unwrap(),
        Message::SessionReady {
            session_id: "ses_1".to_string()
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        rx.recv().await.unwrap(),
        Message::ConnectionStatus {
            source: Source::Backend,
            connected: true
        }
    );
    assert_eq!(backend.create_count(), 3);

    cancel.cancel();
    handle.await.unwrap();
    assert!(session.is_connected());
}
