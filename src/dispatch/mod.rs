//! Dispatch Sink 模块
//!
//! Listener 与事件流投递消息的唯一目标。

mod mailbox;
mod message;
mod prompt;
mod sink;
mod state;

pub use mailbox::{mailbox, Mailbox, MailboxReceiver, WeakMailbox};
pub use message::{AgentRole, BufferUpdate, Message, Source, UNKNOWN_AGENT};
pub use prompt::{build_prompt, shape_content, window_around_cursor};
pub use sink::{Dispatcher, PromptOutcome};
pub use state::{AgentPanel, BufferSummary, Effect, UiState};
