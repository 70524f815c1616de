//! TCP 监听服务
//!
//! 每个连接一个读取任务；坏行只记录日志，连接保持打开。

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::{ClientRegistry, ConnId};
use crate::dispatch::{Mailbox, Message, Source};
use crate::protocol::{BufferEvent, EventKind, MessageKind};
use crate::{Error, Result};

/// 监听器与连接任务共享的状态
struct Shared {
    registry: ClientRegistry,
    sink: RwLock<Option<Mailbox>>,
}

impl Shared {
    /// 投递消息；尚未设置 sink 时静默丢弃
    async fn deliver(&self, message: Message) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.send(message).await,
            None => tracing::trace!("未设置 sink，丢弃消息"),
        }
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

/// Ingestion Listener
pub struct Listener {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl Listener {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: ClientRegistry::new(),
                sink: RwLock::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    /// 设置投递目标（启动前后均可）
    pub fn set_sink(&self, sink: Mailbox) {
        *self.shared.sink.write() = Some(sink);
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.shared.registry
    }

    /// 当前编辑器连接数
    pub fn connection_count(&self) -> usize {
        self.shared.registry.connection_count()
    }

    /// 实际监听地址（未启动时为 None）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    /// 绑定地址并启动 accept 循环，返回实际监听地址
    pub async fn start(&self, addr: &str) -> Result<SocketAddr> {
        if self.running.lock().is_some() {
            return Err(Error::AlreadyStarted);
        }

        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        let mut running = self.running.lock();
        if running.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let shutdown = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.shared.clone(),
            shutdown.clone(),
        ));
        *running = Some(Running {
            addr: local_addr,
            shutdown,
            accept_task,
        });

        tracing::info!("🚀 Listener 启动: {}", local_addr);
        Ok(local_addr)
    }

    /// 关闭监听 socket（幂等）
    ///
    /// 已建立的连接不受影响，直到各自读取失败。
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return Ok(());
        };

        running.shutdown.cancel();
        running
            .accept_task
            .await
            .map_err(|e| Error::Other(anyhow::Error::new(e)))?;

        tracing::info!("🛑 Listener 已停止: {}", running.addr);
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let conn_id = shared.registry.register(peer);
                        let shared = shared.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, conn_id, shared).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("接受连接失败: {}", e);
                    }
                }
            }
        }
    }
    // listener 在此 drop，socket 关闭
}

/// 处理单个编辑器连接
async fn handle_connection(stream: TcpStream, conn_id: ConnId, shared: Arc<Shared>) {
    tracing::debug!("📥 新连接: conn_id={}", conn_id);
    shared
        .deliver(Message::ConnectionStatus {
            source: Source::Editor,
            connected: true,
        })
        .await;

    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if line.last() != Some(&b'\n') {
                    // 对端在行中途关闭
                    tracing::debug!("丢弃未结束的行: conn_id={}, bytes={}", conn_id, line.len());
                    break;
                }
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    continue;
                }

                match BufferEvent::decode(&line) {
                    Ok(event) => forward_event(&shared, conn_id, event).await,
                    Err(e) => {
                        tracing::warn!("解析事件失败: conn_id={}, error={}", conn_id, e);
                    }
                }
            }
            Err(e) => {
                tracing::debug!("读取失败: conn_id={}, error={}", conn_id, e);
                break;
            }
        }
    }

    shared.registry.unregister(conn_id);
    shared
        .deliver(Message::ConnectionStatus {
            source: Source::Editor,
            connected: false,
        })
        .await;
    tracing::debug!("📤 连接关闭: conn_id={}", conn_id);
}

async fn forward_event(shared: &Shared, conn_id: ConnId, event: BufferEvent) {
    if let Err(e) = event.validate() {
        tracing::warn!("事件校验失败: conn_id={}, error={}", conn_id, e);
        return;
    }

    let (kind, event_kind) = (event.kind, event.event);
    match kind {
        MessageKind::BufferUpdate if event_kind != EventKind::Unknown => {
            shared.deliver(Message::BufferUpdate(event.into())).await;
        }
        MessageKind::Ping => tracing::trace!("ping: conn_id={}", conn_id),
        MessageKind::Disconnect => {
            tracing::debug!("编辑器声明断开: conn_id={}", conn_id);
        }
        _ => {
            tracing::debug!(
                "忽略未知事件: conn_id={}, type={:?}, event={}",
                conn_id,
                kind,
                event_kind
            );
        }
    }
}
