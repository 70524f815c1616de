//! 编辑器连接注册表
//!
//! 只在 accept 和连接清理时修改；读取（连接数）不要求与投递时序一致。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// 连接 ID
pub type ConnId = u64;

/// 已连接的编辑器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

/// 连接注册表
pub struct ClientRegistry {
    clients: RwLock<HashMap<ConnId, ClientInfo>>,
    next_conn_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// 注册新连接，返回连接 ID
    pub fn register(&self, peer: SocketAddr) -> ConnId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.clients.write().insert(
            conn_id,
            ClientInfo {
                peer,
                connected_at: Utc::now(),
            },
        );
        tracing::debug!("📡 Connection registered: conn_id={}, peer={}", conn_id, peer);
        conn_id
    }

    /// 注销连接
    pub fn unregister(&self, conn_id: ConnId) -> Option<ClientInfo> {
        let removed = self.clients.write().remove(&conn_id);
        tracing::debug!("📡 Connection unregistered: conn_id={}", conn_id);
        removed
    }

    /// 当前连接数
    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn has_connections(&self) -> bool {
        !self.clients.read().is_empty()
    }

    /// 某连接的信息
    pub fn get(&self, conn_id: ConnId) -> Option<ClientInfo> {
        self.clients.read().get(&conn_id).cloned()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
