//! UI 状态模型
//!
//! 只由 Dispatcher 修改（一次处理一条消息），渲染端通过 watch 通道拿快照。

use std::collections::HashMap;

use super::message::{AgentRole, BufferUpdate, Message, Source};
use crate::protocol::EventKind;

/// 单个 Agent 面板
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPanel {
    /// 累积的输出文本
    pub output: String,
    /// 是否正在等待回复
    pub thinking: bool,
}

/// 当前 buffer 摘要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferSummary {
    pub filename: String,
    pub filetype: String,
    pub cursor_line: i64,
    pub cursor_col: i64,
    pub line_count: i64,
    pub last_event: Option<EventKind>,
}

/// 处理消息后需要 Dispatcher 执行的副作用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// 向所有 Agent 扇出提示词
    FanOut(BufferUpdate),
}

/// UI 状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    /// 当前编辑器连接数
    pub editor_connections: usize,
    pub backend_connected: bool,
    pub session_id: Option<String>,
    pub agents: HashMap<String, AgentPanel>,
    pub buffer: BufferSummary,
    pub last_error: Option<String>,
    /// 已处理的 buffer 事件数
    pub buffer_events: u64,
}

impl UiState {
    pub fn new() -> Self {
        let agents = AgentRole::ALL
            .iter()
            .map(|role| (role.as_str().to_string(), AgentPanel::default()))
            .collect();
        Self {
            agents,
            ..Default::default()
        }
    }

    pub fn editor_connected(&self) -> bool {
        self.editor_connections > 0
    }

    pub fn agent(&self, name: &str) -> Option<&AgentPanel> {
        self.agents.get(name)
    }

    /// 应用一条消息
    pub fn apply(&mut self, message: Message) -> Option<Effect> {
        match message {
            Message::ConnectionStatus { source, connected } => {
                match source {
                    Source::Editor => {
                        if connected {
                            self.editor_connections += 1;
                        } else {
                            self.editor_connections = self.editor_connections.saturating_sub(1);
                        }
                    }
                    Source::Backend => {
                        self.backend_connected = connected;
                        if !connected {
                            self.session_id = None;
                        }
                    }
                }
                None
            }
            Message::SessionReady { session_id } => {
                self.backend_connected = true;
                self.session_id = Some(session_id);
                None
            }
            Message::Error { context, message } => {
                self.last_error = Some(format!("{}: {}", context, message));
                None
            }
            Message::AgentText { agent, text } => {
                let panel = self.agents.entry(agent).or_default();
                panel.output.push_str(&text);
                panel.thinking = false;
                None
            }
            Message::AgentIdle { agent } => {
                self.agents.entry(agent).or_default().thinking = false;
                None
            }
            Message::BufferUpdate(update) => {
                self.buffer = BufferSummary {
                    filename: update.filename.clone(),
                    filetype: update.filetype.clone(),
                    cursor_line: update.cursor_line,
                    cursor_col: update.cursor_col,
                    line_count: update.line_count,
                    last_event: Some(update.last_event),
                };
                self.buffer_events += 1;
                for role in AgentRole::ALL {
                    self.agents.entry(role.as_str().to_string()).or_default().thinking = true;
                }
                Some(Effect::FanOut(update))
            }
        }
    }

    /// 单行 buffer 摘要
    pub fn summary(&self) -> String {
        let b = &self.buffer;
        let filename = if b.filename.is_empty() { "no file" } else { b.filename.as_str() };
        let filetype = if b.filetype.is_empty() { "unknown" } else { b.filetype.as_str() };
        let last_event = b.last_event.map(|e| e.as_str()).unwrap_or("Waiting...");
        format!(
            "📄 {} ({}) | Line {}, Col {} | {} lines | {}",
            filename, filetype, b.cursor_line, b.cursor_col, b.line_count, last_event
        )
    }
}
