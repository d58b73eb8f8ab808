//! Shared fixtures for session tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gax_net::MockGateway;
use gax_shared::{Chat, ChatId, Message};
use gax_store::MemoryStorage;

use crate::config::ClientConfig;
use crate::events::{Notice, NoticeLevel, RenderSink};
use crate::session::Session;
use crate::state::{ChatState, StateView};

/// Remembers every callback.
#[derive(Default)]
pub struct RecordingSink {
    pub notices: Mutex<Vec<Notice>>,
    pub chat_renders: Mutex<usize>,
    pub message_renders: Mutex<Vec<(ChatId, usize)>>,
}

impl RecordingSink {
    pub fn has_error_notice(&self) -> bool {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.level == NoticeLevel::Error)
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }

    pub fn chat_render_count(&self) -> usize {
        *self.chat_renders.lock().unwrap()
    }

    /// Sequence lengths handed to `messages_changed` for `chat_id`, in order.
    pub fn message_renders_for(&self, chat_id: &ChatId) -> Vec<usize> {
        self.message_renders
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, len)| *len)
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn chats_changed(&self, _chats: &[Chat]) {
        *self.chat_renders.lock().unwrap() += 1;
    }

    fn messages_changed(&self, chat_id: &ChatId, messages: &[Message]) {
        self.message_renders
            .lock()
            .unwrap()
            .push((chat_id.clone(), messages.len()));
    }

    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

pub struct Harness {
    pub session: Session,
    pub mock: Arc<MockGateway>,
    pub sink: Arc<RecordingSink>,
    pub storage: MemoryStorage,
}

impl Harness {
    /// Instant mock backend that answers from the session's own state.
    pub fn new() -> Self {
        Self::build(MemoryStorage::new(), Duration::ZERO, true)
    }

    /// Mock backend that ignores local state and always serves fixtures.
    pub fn detached(latency: Duration) -> Self {
        Self::build(MemoryStorage::new(), latency, false)
    }

    /// A second session over the same storage, as after a restart.
    pub fn reopen(&self) -> Self {
        Self::build(self.storage.clone(), Duration::ZERO, true)
    }

    fn build(storage: MemoryStorage, latency: Duration, with_view: bool) -> Self {
        let shared: Arc<MemoryStorage> = Arc::new(storage.clone());
        let state = ChatState::shared(shared.clone());
        let mut mock = MockGateway::new().with_latency(latency);
        if with_view {
            mock = mock.with_view(Arc::new(StateView::new(state.clone())));
        }
        let mock = Arc::new(mock);
        let sink = Arc::new(RecordingSink::default());
        let session = Session::from_parts(
            ClientConfig::default(),
            state,
            shared,
            mock.clone(),
            sink.clone(),
        );
        Self {
            session,
            mock,
            sink,
            storage,
        }
    }
}

pub async fn signed_in() -> Harness {
    let h = Harness::new();
    h.session.sign_up("alice", "alice@example.com").await.unwrap();
    h
}
