//! Dispatch Sink
//!
//! 单消费者：逐条处理 mailbox 消息、更新 UI 状态，并在 buffer 事件上
//! 向两个 Agent 扇出提示词。提示词提交是 fire-and-forget，不阻塞处理循环。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::mailbox::{mailbox, Mailbox, MailboxReceiver, WeakMailbox};
use super::message::{AgentRole, BufferUpdate, Message};
use super::prompt::{build_prompt, shape_content};
use super::state::{Effect, UiState};
use crate::config::ShapingPolicy;
use crate::opencode::SessionManager;

/// 单次提示词提交的结果（仅用于观测）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOutcome {
    pub agent: String,
    pub result: std::result::Result<(), String>,
}

/// Dispatcher
pub struct Dispatcher {
    state: UiState,
    inbox: MailboxReceiver,
    mailbox: WeakMailbox,
    session: Option<Arc<SessionManager>>,
    shaping: ShapingPolicy,
    snapshots: watch::Sender<UiState>,
    outcomes: Option<mpsc::Sender<PromptOutcome>>,
}

impl Dispatcher {
    /// 创建 Dispatcher 及其 mailbox
    ///
    /// 没有 `session` 时 buffer 事件只更新 UI 状态。
    pub fn new(
        capacity: usize,
        session: Option<Arc<SessionManager>>,
        shaping: ShapingPolicy,
    ) -> (Self, Mailbox) {
        let (tx, inbox) = mailbox(capacity);
        let state = UiState::new();
        let (snapshots, _) = watch::channel(state.clone());

        let dispatcher = Self {
            state,
            inbox,
            mailbox: tx.downgrade(),
            session,
            shaping,
            snapshots,
            outcomes: None,
        };
        (dispatcher, tx)
    }

    /// 开启提示词结果队列（有界，满时丢弃）
    pub fn with_outcomes(mut self, capacity: usize) -> (Self, mpsc::Receiver<PromptOutcome>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.outcomes = Some(tx);
        (self, rx)
    }

    /// 订阅 UI 状态快照
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.snapshots.subscribe()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    /// 处理单条消息
    pub fn handle(&mut self, message: Message) {
        if let Some(Effect::FanOut(update)) = self.state.apply(message) {
            self.fan_out(update);
        }
        self.snapshots.send_replace(self.state.clone());
    }

    /// 处理循环：所有发送方退出或被取消时结束，返回最终状态
    pub async fn run(mut self, cancel: CancellationToken) -> UiState {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = self.inbox.recv() => message,
            };
            match message {
                Some(message) => self.handle(message),
                None => break,
            }
        }
        tracing::debug!("Dispatcher 退出");
        self.state
    }

    fn fan_out(&self, update: BufferUpdate) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let content = shape_content(&update.content, update.cursor_line, &self.shaping);
        let prompt: Arc<str> = Arc::from(build_prompt(&update, &content));
        let mailbox = self.mailbox.clone();
        let outcomes = self.outcomes.clone();

        tokio::spawn(async move {
            let previous = session.session_id();
            let session_id = match session.ensure_session().await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("⚠️ 无法获取 session，跳过本次提示: {}", e);
                    if let Some(mailbox) = mailbox.upgrade() {
                        mailbox.send(Message::error("OpenCode session", &e)).await;
                        for role in AgentRole::ALL {
                            mailbox
                                .send(Message::AgentIdle {
                                    agent: role.as_str().to_string(),
                                })
                                .await;
                        }
                    }
                    return;
                }
            };

            if previous.as_deref() != Some(session_id.as_str()) {
                if let Some(mailbox) = mailbox.upgrade() {
                    mailbox.send(Message::SessionReady { session_id }).await;
                }
            }

            for role in AgentRole::ALL {
                let session = session.clone();
                let prompt = prompt.clone();
                let outcomes = outcomes.clone();
                tokio::spawn(async move {
                    let agent = role.as_str();
                    let result = session.send_prompt(agent, &prompt).await;
                    if let Err(e) = &result {
                        tracing::warn!("提交提示词失败: agent={}, error={}", agent, e);
                    }
                    if let Some(tx) = outcomes {
                        let outcome = PromptOutcome {
                            agent: agent.to_string(),
                            result: result.map_err(|e| e.to_string()),
                        };
                        if tx.try_send(outcome).is_err() {
                            tracing::trace!("结果队列已满，丢弃");
                        }
                    }
                });
            }
        });
    }
}
