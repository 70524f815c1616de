//! 测试用的内存后端与辅助函数

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use algopeeps::opencode::{EventStream, SessionInfo};
use algopeeps::{AgentBackend, BackendEvent, Error, Message, Result};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// 已提交的提示词
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPrompt {
    pub session_id: String,
    pub agent: String,
    pub text: String,
}

/// 可编排的内存后端
pub struct MockBackend {
    /// 接下来失败的创建次数（u32::MAX 表示永远失败）
    fail_creates: AtomicU32,
    /// 存活探测是否成功
    healthy: AtomicBool,
    /// 提示词是否失败
    fail_prompts: AtomicBool,
    next_id: AtomicU32,
    gets: AtomicU32,
    creates: Mutex<Vec<Instant>>,
    prompts: Mutex<Vec<SubmittedPrompt>>,
    /// 事件流脚本
    events: Mutex<Vec<Result<BackendEvent>>>,
    /// 脚本放完后保持流打开
    hold_stream_open: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            fail_creates: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            fail_prompts: AtomicBool::new(false),
            next_id: AtomicU32::new(1),
            gets: AtomicU32::new(0),
            creates: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            hold_stream_open: AtomicBool::new(false),
        }
    }

    pub fn failing_creates(self, count: u32) -> Self {
        self.fail_creates.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_events(self, events: Vec<Result<BackendEvent>>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    pub fn holding_stream_open(self) -> Self {
        self.hold_stream_open.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_fail_prompts(&self, fail: bool) {
        self.fail_prompts.store(fail, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn create_times(&self) -> Vec<Instant> {
        self.creates.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<SubmittedPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn get_session(&self, id: &str) -> Result<SessionInfo> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(SessionInfo {
                id: id.to_string(),
                title: String::new(),
            })
        } else {
            Err(Error::Backend(format!("session {} not found", id)))
        }
    }

    async fn create_session(&self, title: &str) -> Result<SessionInfo> {
        let attempt = {
            let mut creates = self.creates.lock().unwrap();
            creates.push(Instant::now());
            creates.len()
        };

        let remaining = self.fail_creates.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_creates.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(Error::Backend(format!("create failed #{}", attempt)));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SessionInfo {
            id: format!("ses_{}", n),
            title: title.to_string(),
        })
    }

    async fn send_prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()> {
        self.prompts.lock().unwrap().push(SubmittedPrompt {
            session_id: session_id.to_string(),
            agent: agent.to_string(),
            text: text.to_string(),
        });
        if self.fail_prompts.load(Ordering::SeqCst) {
            return Err(Error::Backend("prompt rejected".to_string()));
        }
        Ok(())
    }

    async fn stream_events(&self) -> Result<EventStream> {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let scripted = stream::iter(events);
        if self.hold_stream_open.load(Ordering::SeqCst) {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }
}

/// 带超时地接收下一条消息
pub async fn recv(rx: &mut mpsc::Receiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("mailbox closed")
}

/// 跳过连接状态消息，接收下一条其他消息
pub async fn recv_non_status(rx: &mut mpsc::Receiver<Message>) -> Message {
    loop {
        match recv(rx).await {
            Message::ConnectionStatus { .. } => continue,
            other => return other,
        }
    }
}

/// 一行合法的 buffer_update 事件
pub fn event_line(name: &str, line: i64) -> String {
    format!(
        "{{\"type\":\"buffer_update\",\"event\":\"text_changed\",\"buffer\":{{\"id\":1,\"name\":\"{}\",\"filetype\":\"go\",\"cursor\":{{\"line\":{},\"col\":0}},\"line_count\":42,\"content\":\"...\"}}}}\n",
        name, line
    )
}
