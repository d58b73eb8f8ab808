//! Application state owned by a [`Session`](crate::Session).
//!
//! The [`ChatState`] struct is wrapped in `Arc<Mutex<>>`. The lock is only
//! ever held for synchronous mutations and never across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gax_net::LocalView;
use gax_shared::{Chat, ChatId, Message, PresenceStatus, User, UserId};
use gax_store::{ChatDirectory, MessageStore, Persistence};

pub type SharedState = Arc<Mutex<ChatState>>;

/// Everything the client knows for the signed-in user.
pub struct ChatState {
    /// `None` until sign-up or restore.
    pub user: Option<User>,

    /// Bearer token issued at sign-up.
    pub token: Option<String>,

    pub directory: ChatDirectory,

    pub messages: MessageStore,

    /// Chat whose messages are on screen.
    pub current_chat: Option<ChatId>,

    /// Last presence reported by the push channel.
    pub presence: HashMap<UserId, PresenceStatus>,
}

impl ChatState {
    pub fn new(storage: Arc<dyn Persistence>) -> Self {
        Self {
            user: None,
            token: None,
            directory: ChatDirectory::new(storage.clone()),
            messages: MessageStore::new(storage),
            current_chat: None,
            presence: HashMap::new(),
        }
    }

    pub fn shared(storage: Arc<dyn Persistence>) -> SharedState {
        Arc::new(Mutex::new(Self::new(storage)))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn is_current(&self, chat_id: &ChatId) -> bool {
        self.current_chat.as_ref() == Some(chat_id)
    }

    /// Drop the session's in-memory state. Storage is not touched.
    pub fn reset(&mut self) {
        self.user = None;
        self.token = None;
        self.directory.reset();
        self.messages.reset();
        self.current_chat = None;
        self.presence.clear();
    }
}

/// Lock `state`, recovering from a poisoned mutex.
pub fn lock(state: &SharedState) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only window on the state for the mock gateway.
pub struct StateView(SharedState);

impl StateView {
    pub fn new(state: SharedState) -> Self {
        Self(state)
    }
}

impl LocalView for StateView {
    fn chats(&self) -> Vec<Chat> {
        lock(&self.0).directory.list().to_vec()
    }

    fn messages(&self, chat_id: &ChatId) -> Option<Vec<Message>> {
        let state = lock(&self.0);
        state
            .messages
            .has_chat(chat_id)
            .then(|| state.messages.get(chat_id).to_vec())
    }
}
