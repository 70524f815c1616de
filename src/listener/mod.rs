//! Ingestion Listener 模块
//!
//! 接收编辑器 TCP 连接，按行解码 buffer 事件并投递到 Dispatch Sink。

mod registry;
mod server;

pub use registry::{ClientInfo, ClientRegistry, ConnId};
pub use server::Listener;
