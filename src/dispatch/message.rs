//! Mailbox 消息定义
//!
//! Ingestion Listener 与 Agent 事件流都只投递这里定义的消息。

use crate::protocol::{BufferEvent, EventKind};

/// 连接来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// 编辑器连接
    Editor,
    /// OpenCode 后端
    Backend,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Editor => "editor",
            Source::Backend => "opencode",
        }
    }
}

/// 被咨询的 Agent
///
/// 后端 agent 名、UI 状态键、idle 扇出统一使用 `as_str()` 的连字符形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Reviewer,
    Spotter,
}

impl AgentRole {
    /// 系统始终驱动的两个 Agent
    pub const ALL: [AgentRole; 2] = [AgentRole::Reviewer, AgentRole::Spotter];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Reviewer => "code-reviewer",
            AgentRole::Spotter => "bug-spotter",
        }
    }

    /// 面板标题
    pub fn title(&self) -> &'static str {
        match self {
            AgentRole::Reviewer => "Code Reviewer",
            AgentRole::Spotter => "Bug Spotter",
        }
    }
}

/// 无法识别来源时的 Agent 名
pub const UNKNOWN_AGENT: &str = "unknown";

/// 解码后的 buffer 事件（UI 视角）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferUpdate {
    pub filename: String,
    pub path: String,
    pub filetype: String,
    pub cursor_line: i64,
    pub cursor_col: i64,
    pub line_count: i64,
    pub last_event: EventKind,
    pub content: String,
}

impl BufferUpdate {
    /// 提示词中使用的文件路径（未保存的 buffer 回退到名称）
    pub fn display_path(&self) -> &str {
        if self.path.is_empty() {
            &self.filename
        } else {
            &self.path
        }
    }
}

impl From<BufferEvent> for BufferUpdate {
    fn from(event: BufferEvent) -> Self {
        let buffer = event.buffer;
        Self {
            filename: buffer.name,
            path: buffer.path,
            filetype: buffer.filetype,
            cursor_line: buffer.cursor.line,
            cursor_col: buffer.cursor.col,
            line_count: buffer.line_count,
            last_event: event.event,
            content: buffer.content,
        }
    }
}

/// 投递给 Dispatch Sink 的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 连接状态变化
    ConnectionStatus { source: Source, connected: bool },
    /// Session 已就绪
    SessionReady { session_id: String },
    /// 编辑器 buffer 事件
    BufferUpdate(BufferUpdate),
    /// Agent 增量文本
    AgentText { agent: String, text: String },
    /// Agent 空闲
    AgentIdle { agent: String },
    /// 需要展示给用户的错误
    Error { context: String, message: String },
}

impl Message {
    pub fn error(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Message::Error {
            context: context.into(),
            message: err.to_string(),
        }
    }
}
