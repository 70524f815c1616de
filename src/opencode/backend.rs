//! Agent 后端抽象
//!
//! Session Manager 与事件流只通过这个 trait 访问网络。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::types::{BackendEvent, SessionInfo};
use crate::Result;

/// 后端推送事件流（drop 即取消订阅）
pub type EventStream = Pin<Box<dyn Stream<Item = Result<BackendEvent>> + Send>>;

/// Agent 后端客户端
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// 查询 session（存活探测）
    async fn get_session(&self, id: &str) -> Result<SessionInfo>;

    /// 创建 session，返回后端分配的 id
    async fn create_session(&self, title: &str) -> Result<SessionInfo>;

    /// 向指定 Agent 提交单段文本提示词
    async fn send_prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()>;

    /// 订阅后端推送事件
    async fn stream_events(&self) -> Result<EventStream>;
}
