//! algopeeps - 编辑器 → AI Agent 事件桥
//!
//! 负责：
//! - 监听编辑器连接
//! - 维护 OpenCode session 与事件流
//! - 输出 UI 状态摘要

use std::sync::Arc;

use algopeeps::opencode::supervise_subscription;
use algopeeps::{Config, Dispatcher, Listener, OpenCodeClient, SessionManager};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志（stderr）
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("algopeeps=debug".parse()?))
        .init();

    tracing::info!("🚀 algopeeps v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    tracing::info!("OpenCode: {}", config.backend_url);

    let backend = Arc::new(OpenCodeClient::new(&config.backend_url)?);
    let session = Arc::new(SessionManager::new(backend, config.session));

    let (dispatcher, mailbox) =
        Dispatcher::new(config.mailbox_capacity, Some(session.clone()), config.shaping);
    let mut snapshots = dispatcher.subscribe();

    let listener = Listener::new();
    listener.set_sink(mailbox.clone());
    // 绑定失败是唯一的致命错误
    let addr = listener.start(&config.listen_addr).await?;
    tracing::info!("等待编辑器连接: {}", addr);

    let cancel = CancellationToken::new();
    // 后端启动前或事件流断开后都会重新订阅
    let subscription =
        supervise_subscription(session, mailbox, config.resubscribe_delay, cancel.clone());
    let dispatch_task = tokio::spawn(dispatcher.run(cancel.clone()));

    // 状态摘要
    let summary_task = tokio::spawn(async move {
        let mut last = String::new();
        while snapshots.changed().await.is_ok() {
            let line = {
                let state = snapshots.borrow_and_update();
                let error = state
                    .last_error
                    .as_deref()
                    .map(|e| format!(" | Error: {}", e))
                    .unwrap_or_default();
                format!(
                    "{} | editors={} | opencode={}{}",
                    state.summary(),
                    state.editor_connections,
                    if state.backend_connected { "●" } else { "○" },
                    error
                )
            };
            if line != last {
                tracing::info!("{}", line);
                last = line;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("收到中断信号，准备退出...");

    listener.stop().await?;
    cancel.cancel();
    if let Err(e) = subscription.await {
        tracing::debug!("订阅任务异常退出: {}", e);
    }
    let state = dispatch_task.await?;
    summary_task.abort();

    tracing::info!("👋 algopeeps exiting ({} buffer events)", state.buffer_events);
    Ok(())
}
