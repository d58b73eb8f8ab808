//! Callbacks into whatever renders the client's state.

use gax_shared::{Chat, ChatId, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short, user-visible status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }

    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Receives snapshots after every visible mutation.
///
/// Called with the session lock released, so implementations may call back
/// into the session.
pub trait RenderSink: Send + Sync {
    fn chats_changed(&self, chats: &[Chat]);

    fn messages_changed(&self, chat_id: &ChatId, messages: &[Message]);

    fn notice(&self, notice: &Notice);
}

/// Discards everything.
pub struct NullSink;

impl RenderSink for NullSink {
    fn chats_changed(&self, _chats: &[Chat]) {}

    fn messages_changed(&self, _chat_id: &ChatId, _messages: &[Message]) {}

    fn notice(&self, _notice: &Notice) {}
}

/// Logs every callback.
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn chats_changed(&self, chats: &[Chat]) {
        tracing::debug!(count = chats.len(), "chats changed");
    }

    fn messages_changed(&self, chat_id: &ChatId, messages: &[Message]) {
        tracing::debug!(chat_id = %chat_id, count = messages.len(), "messages changed");
    }

    fn notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(text = %notice.text, "notice"),
            NoticeLevel::Warning => tracing::warn!(text = %notice.text, "notice"),
            NoticeLevel::Error => tracing::error!(text = %notice.text, "notice"),
        }
    }
}
