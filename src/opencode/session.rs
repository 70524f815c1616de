//! Session Manager
//!
//! 维护与后端的单个逻辑会话：懒创建、存活探测、有限次重试。
//! `id` 与状态只由这里写入。

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::sleep;

use super::backend::AgentBackend;
use crate::config::SessionPolicy;
use crate::{Error, Result};

/// Session 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// 没有可用 session
    NoSession,
    /// session 已创建或已通过探测
    Connected,
    /// 创建失败，正在等待重试
    Reconnecting,
}

#[derive(Debug)]
struct SessionState {
    id: Option<String>,
    status: SessionStatus,
    /// 每完成一轮 ensure 加一
    generation: u64,
    /// 最近一轮失败的原因
    last_failure: Option<String>,
}

/// Session Manager
pub struct SessionManager {
    backend: Arc<dyn AgentBackend>,
    policy: SessionPolicy,
    state: RwLock<SessionState>,
    /// 串行化 ensure_session，避免并发创建出多个 session
    ensure_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AgentBackend>, policy: SessionPolicy) -> Self {
        Self {
            backend,
            policy,
            state: RwLock::new(SessionState {
                id: None,
                status: SessionStatus::NoSession,
                generation: 0,
                last_failure: None,
            }),
            ensure_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AgentBackend> {
        &self.backend
    }

    /// 当前 session id
    pub fn session_id(&self) -> Option<String> {
        self.state.read().id.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    fn set_state(&self, status: SessionStatus, id: Option<String>) {
        let mut state = self.state.write();
        state.status = status;
        state.id = id;
    }

    /// 确保存在可用 session，返回其 id
    ///
    /// 已连接且探测成功时直接返回；否则按策略重试创建，
    /// 全部失败后返回包装了最后一次错误的 [`Error::SessionCreation`]。
    ///
    /// 并发调用合并为一轮：等锁期间若已有其他调用方完成一轮，
    /// 直接沿用那一轮的结果（成功或失败），不再重新探测或创建。
    pub async fn ensure_session(&self) -> Result<String> {
        let seen = self.state.read().generation;
        let _guard = self.ensure_lock.lock().await;

        if let Some(result) = self.coalesced(seen) {
            return result;
        }

        let result = self.establish().await;

        let mut state = self.state.write();
        state.generation += 1;
        state.last_failure = match &result {
            Ok(_) => None,
            Err(Error::SessionCreation { source, .. }) => Some(source.to_string()),
            Err(e) => Some(e.to_string()),
        };
        result
    }

    /// 读取等锁期间完成的那一轮结果
    fn coalesced(&self, seen: u64) -> Option<Result<String>> {
        let state = self.state.read();
        if state.generation == seen {
            return None;
        }

        tracing::debug!("复用并发 ensure 的结果: generation={}", state.generation);
        let result = match (state.status, &state.id) {
            (SessionStatus::Connected, Some(id)) => Ok(id.clone()),
            _ => {
                let reason = state
                    .last_failure
                    .clone()
                    .unwrap_or_else(|| "session 不可用".to_string());
                Err(Error::SessionCreation {
                    attempts: self.policy.max_attempts,
                    source: Box::new(Error::Backend(reason)),
                })
            }
        };
        Some(result)
    }

    /// 探测现有 session，不可用时按策略重建
    async fn establish(&self) -> Result<String> {
        let current = {
            let state = self.state.read();
            match (state.status, &state.id) {
                (SessionStatus::Connected, Some(id)) => Some(id.clone()),
                _ => None,
            }
        };

        if let Some(id) = current {
            match self.backend.get_session(&id).await {
                Ok(_) => return Ok(id),
                Err(e) => {
                    tracing::warn!("⚠️ Session {} 探测失败，重新创建: {}", id, e);
                    self.set_state(SessionStatus::NoSession, None);
                }
            }
        }

        let attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.set_state(SessionStatus::Reconnecting, None);
                sleep(self.policy.retry_delay).await;
            }

            let title = session_title(Local::now());
            let result = match self.backend.create_session(&title).await {
                Ok(info) if info.id.is_empty() => {
                    Err(Error::Backend("后端返回了空的 session id".to_string()))
                }
                other => other,
            };

            match result {
                Ok(info) => {
                    tracing::info!("✅ Session 已创建: id={}, attempt={}", info.id, attempt);
                    self.set_state(SessionStatus::Connected, Some(info.id.clone()));
                    return Ok(info.id);
                }
                Err(e) => {
                    tracing::warn!("创建 session 失败 (attempt={}/{}): {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        self.set_state(SessionStatus::NoSession, None);
        let source = last_error.unwrap_or_else(|| Error::Config("重试次数为 0".to_string()));
        Err(Error::SessionCreation {
            attempts,
            source: Box::new(source),
        })
    }

    /// 向指定 Agent 提交提示词，失败不重试
    pub async fn send_prompt(&self, agent: &str, text: &str) -> Result<()> {
        let session_id = self.session_id().ok_or(Error::NoActiveSession)?;
        self.backend.send_prompt(&session_id, agent, text).await
    }
}

/// 以当天日期命名 session
pub fn session_title(now: DateTime<Local>) -> String {
    format!("Algopeeps Council - {}", now.format("%Y-%m-%d"))
}
