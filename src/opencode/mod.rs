//! Agent 后端模块
//!
//! - `backend`: 后端抽象（trait）
//! - `client`: OpenCode HTTP/SSE 实现（feature `opencode`）
//! - `session`: Session 生命周期
//! - `stream`: 推送事件消费

mod backend;
mod session;
mod stream;
mod types;

#[cfg(feature = "opencode")]
mod client;

pub use backend::{AgentBackend, EventStream};
pub use session::{session_title, SessionManager, SessionStatus};
pub use stream::{consume_events, spawn_subscription, supervise_subscription, translate};
pub use types::{BackendEvent, Part, PartSource, SessionInfo};

#[cfg(feature = "opencode")]
pub use client::OpenCodeClient;
