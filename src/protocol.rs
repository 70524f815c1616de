//! 编辑器事件协议
//!
//! 通信方式：TCP + JSONL（每条消息一行 JSON + '\n'），仅编辑器 → algopeeps 单向。
//!
//! ```json
//! {"type":"buffer_update","timestamp":"2026-01-01T00:00:00Z","event":"text_changed",
//!  "buffer":{"id":1,"name":"main.go","path":"/src/main.go","filetype":"go",
//!            "cursor":{"line":3,"col":0},"line_count":42,"content":"..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// 消息类型
///
/// 未知值解码为 `Unknown`（向前兼容），但不会被分发。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    BufferUpdate,
    Ping,
    Disconnect,
    #[default]
    #[serde(other)]
    Unknown,
}

/// 触发事件的编辑器动作
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TextChanged,
    BufferWrite,
    BufferEnter,
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TextChanged => "text_changed",
            EventKind::BufferWrite => "buffer_write",
            EventKind::BufferEnter => "buffer_enter",
            EventKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 缺失或为 null 的字段取零值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 光标位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursor {
    #[serde(deserialize_with = "null_as_default")]
    pub line: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub col: i64,
}

/// 单个 buffer 的快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buffer {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    /// 未命名 buffer 时为空
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub filetype: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cursor: Cursor,
    #[serde(deserialize_with = "null_as_default")]
    pub line_count: i64,
    /// 完整内容，协议层不限制大小（裁剪在下游进行）
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
}

impl Buffer {
    /// 光标行列均非负
    pub fn has_valid_cursor(&self) -> bool {
        self.cursor.line >= 0 && self.cursor.col >= 0
    }
}

/// 一次编辑器状态观测
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferEvent {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "event", default)]
    pub event: EventKind,
    /// 必填
    pub buffer: Buffer,
}

/// 单行解码失败
#[derive(Error, Debug)]
pub enum DecodeError {
    /// 顶层不是 JSON 对象
    #[error("期望 JSON 对象")]
    NotAnObject,

    /// JSON 语法或结构不匹配
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// 业务规则校验失败（仅供调用方使用，监听器不拒绝这类事件）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("buffer id 为负: {0}")]
    NegativeId(i64),

    #[error("光标位置为负: line={line}, col={col}")]
    NegativeCursor { line: i64, col: i64 },

    #[error("行数为负: {0}")]
    NegativeLineCount(i64),
}

impl BufferEvent {
    /// 从一行字节解码（未知字段忽略，`buffer` 必填）
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        if first != Some(&b'{') {
            return Err(DecodeError::NotAnObject);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// 编码为一行 JSONL（带 '\n'）
    pub fn to_line(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }

    /// 结构校验：能解码即通过
    pub fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// 严格的业务规则校验
    pub fn check(&self) -> Result<(), ValidationError> {
        let buffer = &self.buffer;
        if buffer.id < 0 {
            return Err(ValidationError::NegativeId(buffer.id));
        }
        if !buffer.has_valid_cursor() {
            return Err(ValidationError::NegativeCursor {
                line: buffer.cursor.line,
                col: buffer.cursor.col,
            });
        }
        if buffer.line_count < 0 {
            return Err(ValidationError::NegativeLineCount(buffer.line_count));
        }
        Ok(())
    }

    /// 消息类型与事件类型均为已知值
    pub fn is_actionable(&self) -> bool {
        self.kind != MessageKind::Unknown && self.event != EventKind::Unknown
    }
}
