//! Agent 事件流消费
//!
//! 订阅后端推送事件，翻译为 mailbox 消息。流错误终止订阅并只上报一次，
//! 这一层不自动重新订阅。

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::session::SessionManager;
use super::types::BackendEvent;
use crate::dispatch::{AgentRole, Mailbox, Message, Source};
use crate::{Error, Result};

/// 把一条后端事件翻译为零或多条消息
///
/// `session_id` 为当前持有的 session，只有匹配的 idle 事件才会扇出。
pub fn translate(event: BackendEvent, session_id: Option<&str>) -> Vec<Message> {
    match event {
        BackendEvent::MessagePartUpdated { part, delta } => match delta {
            Some(text) if !text.is_empty() => vec![Message::AgentText {
                agent: part.agent_name().to_string(),
                text,
            }],
            _ => Vec::new(),
        },
        BackendEvent::SessionIdle { session_id: idle_id } => {
            if session_id == Some(idle_id.as_str()) {
                AgentRole::ALL
                    .iter()
                    .map(|role| Message::AgentIdle {
                        agent: role.as_str().to_string(),
                    })
                    .collect()
            } else {
                Vec::new()
            }
        }
        BackendEvent::Unrecognized { event_type } => {
            tracing::trace!("忽略后端事件: {}", event_type);
            Vec::new()
        }
    }
}

/// 消费事件流直到后端关闭流或被取消
///
/// 需要已有 session；流错误作为唯一的终止错误返回。
pub async fn consume_events(
    session: &SessionManager,
    mailbox: &Mailbox,
    cancel: CancellationToken,
) -> Result<()> {
    if session.session_id().is_none() {
        return Err(Error::NoActiveSession);
    }

    let mut stream = session.backend().stream_events().await?;
    tracing::info!("📡 已订阅后端事件流");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("📡 事件流订阅已取消");
                return Ok(());
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                let current = session.session_id();
                for message in translate(event, current.as_deref()) {
                    mailbox.send(message).await;
                }
            }
            Some(Err(e)) => {
                return Err(match e {
                    Error::Stream(_) => e,
                    other => Error::Stream(other.to_string()),
                });
            }
            None => {
                tracing::info!("📡 后端关闭了事件流");
                return Ok(());
            }
        }
    }
}

/// 启动后端连接：创建 session → 上报状态 → 消费事件流
///
/// 任何终止错误都以 `Message::Error` 上报一次，并通过 JoinHandle 返回给调用方。
pub fn spawn_subscription(
    session: Arc<SessionManager>,
    mailbox: Mailbox,
    cancel: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let session_id = match session.ensure_session().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("OpenCode session 初始化失败: {}", e);
                mailbox
                    .send(Message::error("OpenCode session initialization", &e))
                    .await;
                return Err(e);
            }
        };

        mailbox.send(Message::SessionReady { session_id }).await;
        mailbox
            .send(Message::ConnectionStatus {
                source: Source::Backend,
                connected: true,
            })
            .await;

        let result = consume_events(&session, &mailbox, cancel).await;
        if let Err(e) = &result {
            tracing::error!("事件流终止: {}", e);
            mailbox.send(Message::error("OpenCode event stream", e)).await;
            mailbox
                .send(Message::ConnectionStatus {
                    source: Source::Backend,
                    connected: false,
                })
                .await;
        }
        result
    })
}

/// 持续保持订阅：每次订阅结束（初始化失败、流错误或流关闭）后
/// 等待 `retry_delay` 再重新订阅，直到被取消
pub fn supervise_subscription(
    session: Arc<SessionManager>,
    mailbox: Mailbox,
    retry_delay: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let handle = spawn_subscription(session.clone(), mailbox.clone(), cancel.clone());
            match handle.await {
                Ok(Ok(())) => tracing::debug!("📡 订阅结束"),
                Ok(Err(e)) => tracing::debug!("📡 订阅失败: {}", e),
                Err(e) => tracing::error!("订阅任务异常退出: {}", e),
            }

            if cancel.is_cancelled() || mailbox.is_closed() {
                break;
            }

            tracing::info!("📡 {:?} 后重新订阅后端事件流", retry_delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(retry_delay) => {}
            }
        }
    })
}
