//! algopeeps - 编辑器 → AI Agent 事件桥
//!
//! 把编辑器插件推送的 buffer 事件转发给终端仪表盘状态和 OpenCode 后端的 Agent。
//!
//! # 核心组件
//!
//! - **Event Model** (`protocol`): 编辑器事件的线上格式与校验
//! - **Ingestion Listener** (`listener`): 接收多个编辑器连接，按行解码并投递
//! - **Session Manager** (`opencode::SessionManager`): 后端会话的懒创建、探测与重试
//! - **Stream Consumer** (`opencode::consume_events`): 后端推送事件 → 内部通知
//! - **Dispatch Sink** (`dispatch`): 单消费者 mailbox，更新 UI 状态并向 Agent 扇出提示词
//!
//! # Feature Flags
//!
//! - `opencode`: OpenCode HTTP/SSE 客户端（默认开启）

pub mod config;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod opencode;
pub mod protocol;

// Re-exports
pub use config::{Config, SessionPolicy, ShapingPolicy};
pub use dispatch::{AgentRole, Dispatcher, Mailbox, Message, Source, UiState};
pub use error::{Error, Result};
pub use listener::Listener;
pub use opencode::{AgentBackend, BackendEvent, SessionManager, SessionStatus};
pub use protocol::{Buffer, BufferEvent, Cursor, EventKind, MessageKind};

#[cfg(feature = "opencode")]
pub use opencode::OpenCodeClient;
