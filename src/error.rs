//! 错误类型定义

use thiserror::Error;

/// 库错误类型
///
/// 分三类：传输（bind/accept/read）、解码（单行 JSON）、后端（session/prompt/stream）。
#[derive(Error, Debug)]
pub enum Error {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 单行事件解码失败（连接不受影响）
    #[error("解码错误: {0}")]
    Decode(#[from] crate::protocol::DecodeError),

    /// 监听地址绑定失败（启动期致命）
    #[error("绑定 {addr} 失败: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 监听器已在运行
    #[error("监听器已启动")]
    AlreadyStarted,

    /// 后端请求失败
    #[error("后端错误: {0}")]
    Backend(String),

    /// 尚未建立 session
    #[error("没有可用的 session，请先调用 ensure_session")]
    NoActiveSession,

    /// 重试耗尽后仍无法创建 session
    #[error("创建 session 失败（重试 {attempts} 次）: {source}")]
    SessionCreation {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// 事件流错误（订阅终止）
    #[error("事件流错误: {0}")]
    Stream(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// HTTP 错误
    #[cfg(feature = "opencode")]
    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
