//! 运行配置

use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9999";

/// 默认 OpenCode 后端地址
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4096";

/// 顶层配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 编辑器连接的监听地址（host:port，端口 0 表示临时端口）
    pub listen_addr: String,
    /// Agent 后端 base URL
    pub backend_url: String,
    /// Session 创建策略
    pub session: SessionPolicy,
    /// 内容裁剪策略
    pub shaping: ShapingPolicy,
    /// Mailbox 容量（满时阻塞对应连接的读取）
    pub mailbox_capacity: usize,
    /// 事件流订阅结束后重新订阅的间隔
    pub resubscribe_delay: Duration,
}

/// Session 创建重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 两次尝试之间的固定间隔
    pub retry_delay: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// 大文件内容裁剪策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapingPolicy {
    /// 超过该字节数才裁剪
    pub max_content_bytes: usize,
    /// 光标两侧保留的行数
    pub context_lines: usize,
}

impl Default for ShapingPolicy {
    fn default() -> Self {
        Self {
            max_content_bytes: 100 * 1024,
            context_lines: 50,
        }
    }
}

impl Config {
    /// 从环境变量创建配置，未设置的项使用默认值
    ///
    /// - `ALGOPEEPS_LISTEN_ADDR`: 监听地址
    /// - `ALGOPEEPS_OPENCODE_URL`: OpenCode 后端地址
    pub fn from_env() -> Self {
        let listen_addr = env_or("ALGOPEEPS_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let backend_url = env_or("ALGOPEEPS_OPENCODE_URL", DEFAULT_BACKEND_URL);

        Self {
            listen_addr,
            backend_url,
            session: SessionPolicy::default(),
            shaping: ShapingPolicy::default(),
            mailbox_capacity: 256,
            resubscribe_delay: Duration::from_secs(5),
        }
    }

    /// 指定监听地址（测试用 `127.0.0.1:0`）
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// 指定后端地址，空字符串回退到默认值
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.backend_url = if url.trim().is_empty() {
            DEFAULT_BACKEND_URL.to_string()
        } else {
            url
        };
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}
