//! The ordered list of chats shown in the sidebar.
//!
//! [`ChatDirectory`] is the single source of truth for which chats exist and
//! in what order they display. Every mutation writes the whole list through to
//! storage under [`KEY_CHATS`]; a failed write is logged and ignored.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use gax_shared::constants::KEY_CHATS;
use gax_shared::{Chat, ChatId};

use crate::error::NotFound;
use crate::storage::{get_json, write_through, Persistence};

pub struct ChatDirectory {
    chats: Vec<Chat>,
    storage: Arc<dyn Persistence>,
}

impl ChatDirectory {
    /// An empty directory backed by `storage`. Nothing is read yet; see
    /// [`ChatDirectory::restore`].
    pub fn new(storage: Arc<dyn Persistence>) -> Self {
        Self {
            chats: Vec::new(),
            storage,
        }
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// Returns `true` if a list was found and decoded. Missing or unreadable
    /// data leaves the directory untouched.
    pub fn restore(&mut self) -> bool {
        match get_json::<Vec<Chat>>(self.storage.as_ref(), KEY_CHATS) {
            Ok(Some(chats)) => {
                self.chats = dedup_by_id(chats);
                debug!(count = self.chats.len(), "restored chats from storage");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not restore chats");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Current display order.
    pub fn list(&self) -> &[Chat] {
        &self.chats
    }

    pub fn get(&self, id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ChatId) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<&Chat> {
        self.chats.first()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert `chat` at the head. An existing entry with the same id is
    /// removed first, so the length only grows for new ids.
    pub fn upsert_front(&mut self, chat: Chat) {
        if let Ok(index) = self.position(&chat.id) {
            self.chats.remove(index);
        }
        debug!(chat_id = %chat.id, "chat moved to front");
        self.chats.insert(0, chat);
        self.persist();
    }

    /// Discard the previous order and membership entirely.
    pub fn replace_all(&mut self, chats: Vec<Chat>) {
        self.chats = dedup_by_id(chats);
        self.persist();
    }

    /// Set the preview text and bump the activity time to
    /// `max(current, at)`. No-op for an unknown id.
    pub fn update_preview(&mut self, id: &ChatId, text: &str, at: DateTime<Utc>) -> bool {
        self.modify(id, |chat| chat.record_activity(text, at))
    }

    /// Returns the new unread count, or `None` for an unknown id.
    pub fn increment_unread(&mut self, id: &ChatId) -> Option<u32> {
        let mut count = None;
        self.modify(id, |chat| {
            chat.unread_count = chat.unread_count.saturating_add(1);
            count = Some(chat.unread_count);
        });
        count
    }

    pub fn mark_read(&mut self, id: &ChatId) -> bool {
        if self.get(id).is_some_and(|c| c.unread_count == 0) {
            return true;
        }
        self.modify(id, |chat| chat.unread_count = 0)
    }

    /// Forget every chat in memory. Storage is not touched.
    pub fn reset(&mut self) {
        self.chats.clear();
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn position(&self, id: &ChatId) -> Result<usize, NotFound> {
        self.chats
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| NotFound::chat(id))
    }

    fn modify(&mut self, id: &ChatId, f: impl FnOnce(&mut Chat)) -> bool {
        match self.position(id) {
            Ok(index) => {
                f(&mut self.chats[index]);
                self.persist();
                true
            }
            Err(e) => {
                debug!(error = %e, "ignoring update");
                false
            }
        }
    }

    fn persist(&self) {
        write_through(self.storage.as_ref(), KEY_CHATS, &self.chats);
    }
}

/// Keep the first occurrence of every id.
fn dedup_by_id(chats: Vec<Chat>) -> Vec<Chat> {
    let mut seen = HashSet::new();
    chats
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}
