//! Dispatch Sink 的 mailbox
//!
//! 多个发送方（每个编辑器连接、事件流、临时任务），单个消费方（Dispatcher）。
//! 有界通道：消费慢时阻塞的是发送方自身所在的任务，不影响其他连接。

use tokio::sync::mpsc;

use super::message::Message;

/// Mailbox 接收端
pub type MailboxReceiver = mpsc::Receiver<Message>;

/// 创建 mailbox
pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Mailbox { tx }, rx)
}

/// Mailbox 发送端
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Message>,
}

impl Mailbox {
    /// 投递消息；消费方已退出时静默丢弃
    pub async fn send(&self, message: Message) {
        if self.tx.send(message).await.is_err() {
            tracing::trace!("📪 Mailbox closed, dropping message");
        }
    }

    /// 非阻塞投递，返回是否成功
    pub fn try_send(&self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("📪 Mailbox full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// 消费方是否已退出
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// 不阻止 mailbox 关闭的弱引用
    pub fn downgrade(&self) -> WeakMailbox {
        WeakMailbox {
            tx: self.tx.downgrade(),
        }
    }
}

/// Mailbox 弱引用（Dispatcher 自身持有，避免自己让通道永不关闭）
#[derive(Debug, Clone)]
pub struct WeakMailbox {
    tx: mpsc::WeakSender<Message>,
}

impl WeakMailbox {
    pub fn upgrade(&self) -> Option<Mailbox> {
        self.tx.upgrade().map(|tx| Mailbox { tx })
    }
}
