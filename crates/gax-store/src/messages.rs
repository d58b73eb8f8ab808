//! Per-chat message sequences.
//!
//! [`MessageStore`] maps a chat id to its messages in display order (oldest
//! first). Appends never reorder existing entries and status updates patch a
//! message in place. The whole mapping is written through to storage under
//! [`KEY_MESSAGES`] after every mutation.
//!
//! Each chat carries a revision drawn from a store-wide counter. A reload
//! that captured the revision before going to the network can tell whether
//! local changes landed while it was in flight, see
//! [`MessageStore::replace_from_snapshot`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use gax_shared::constants::KEY_MESSAGES;
use gax_shared::{ChatId, DeliveryStatus, Message, MessageId, MessagePatch};

use crate::error::NotFound;
use crate::storage::{get_json, write_through, Persistence};

/// Revision value of a chat that has never been touched.
pub const UNTOUCHED: u64 = 0;

#[derive(Debug, Default)]
struct ChatLog {
    messages: Vec<Message>,
    /// Revision at which each message was last written, parallel to `messages`.
    stamps: Vec<u64>,
    revision: u64,
}

impl ChatLog {
    fn push(&mut self, message: Message, revision: u64) {
        self.messages.push(message);
        self.stamps.push(revision);
        self.revision = revision;
    }

    fn reset(&mut self, messages: Vec<Message>, revision: u64) {
        self.stamps = vec![revision; messages.len()];
        self.messages = messages;
        self.revision = revision;
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }
}

/// How a snapshot from the backend was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The snapshot became the whole sequence.
    Replaced,
    /// Local changes happened in between or unsent messages were carried
    /// over; `kept_local` of them were re-appended after the snapshot.
    Merged { kept_local: usize },
}

pub struct MessageStore {
    logs: HashMap<ChatId, ChatLog>,
    storage: Arc<dyn Persistence>,
    next_revision: u64,
}

impl MessageStore {
    pub fn new(storage: Arc<dyn Persistence>) -> Self {
        Self {
            logs: HashMap::new(),
            storage,
            next_revision: UNTOUCHED,
        }
    }

    /// Replace in-memory state with the persisted mapping.
    ///
    /// Returns `true` if a mapping was found and decoded.
    pub fn restore(&mut self) -> bool {
        match get_json::<HashMap<ChatId, Vec<Message>>>(self.storage.as_ref(), KEY_MESSAGES) {
            Ok(Some(mapping)) => {
                self.logs.clear();
                for (chat_id, messages) in mapping {
                    let revision = self.bump();
                    self.logs.entry(chat_id).or_default().reset(messages, revision);
                }
                debug!(chats = self.logs.len(), "restored messages from storage");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not restore messages");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Messages of `chat_id` in display order. Empty if none are known.
    pub fn get(&self, chat_id: &ChatId) -> &[Message] {
        self.logs
            .get(chat_id)
            .map(|log| log.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any sequence (even an empty one) exists for `chat_id`.
    pub fn has_chat(&self, chat_id: &ChatId) -> bool {
        self.logs.contains_key(chat_id)
    }

    pub fn find(&self, chat_id: &ChatId, message_id: &MessageId) -> Option<&Message> {
        self.get(chat_id).iter().find(|m| &m.id == message_id)
    }

    /// Current revision of a chat's sequence, [`UNTOUCHED`] if never written.
    pub fn revision(&self, chat_id: &ChatId) -> u64 {
        self.logs.get(chat_id).map_or(UNTOUCHED, |log| log.revision)
    }

    pub fn chat_ids(&self) -> impl Iterator<Item = &ChatId> {
        self.logs.keys()
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Add `message` to the end of the chat's sequence, creating it if absent.
    pub fn append(&mut self, chat_id: &ChatId, mut message: Message) {
        if &message.chat_id != chat_id {
            warn!(
                chat_id = %chat_id,
                message_chat = %message.chat_id,
                "message filed under a different chat, re-homing"
            );
            message.chat_id = chat_id.clone();
        }
        let revision = self.bump();
        self.logs
            .entry(chat_id.clone())
            .or_default()
            .push(message, revision);
        self.persist();
    }

    /// Append unless a message with the same id is already present.
    pub fn append_if_absent(&mut self, chat_id: &ChatId, message: Message) -> bool {
        if self.find(chat_id, &message.id).is_some() {
            debug!(chat_id = %chat_id, message_id = %message.id, "duplicate message ignored");
            return false;
        }
        self.append(chat_id, message);
        true
    }

    /// Total replacement, keeping the given order.
    pub fn replace_all(&mut self, chat_id: &ChatId, messages: Vec<Message>) {
        let revision = self.bump();
        self.logs
            .entry(chat_id.clone())
            .or_default()
            .reset(messages, revision);
        self.persist();
    }

    /// Apply a backend snapshot that was requested when the chat was at
    /// revision `based_on`.
    ///
    /// The snapshot wins for every id it contains. Local messages missing
    /// from it are re-appended in their current order when they were written
    /// after `based_on` or are not yet `Sent`, so `Pending` and `Failed`
    /// messages survive any reload. With nothing to keep and no change since
    /// `based_on` this is [`Self::replace_all`].
    pub fn replace_from_snapshot(
        &mut self,
        chat_id: &ChatId,
        snapshot: Vec<Message>,
        based_on: u64,
    ) -> ReplaceOutcome {
        let current = self.revision(chat_id);
        let known: HashSet<MessageId> = snapshot.iter().map(|m| m.id.clone()).collect();
        let kept: Vec<Message> = self
            .logs
            .get(chat_id)
            .map(|log| {
                log.messages
                    .iter()
                    .zip(&log.stamps)
                    .filter(|(m, stamp)| {
                        !known.contains(&m.id)
                            && (**stamp > based_on || m.delivery_status != DeliveryStatus::Sent)
                    })
                    .map(|(m, _)| m.clone())
                    .collect()
            })
            .unwrap_or_default();

        if current == based_on && kept.is_empty() {
            self.replace_all(chat_id, snapshot);
            return ReplaceOutcome::Replaced;
        }

        let kept_local = kept.len();
        debug!(
            chat_id = %chat_id,
            based_on,
            current,
            kept_local,
            "merging snapshot with local changes"
        );

        let revision = self.bump();
        let log = self.logs.entry(chat_id.clone()).or_default();
        log.reset(snapshot, revision);
        for message in kept {
            log.push(message, revision);
        }
        self.persist();

        ReplaceOutcome::Merged { kept_local }
    }

    /// Merge `patch` into the message `message_id` without moving it.
    ///
    /// An unknown chat or message is a no-op: the message may have been
    /// superseded by a reload. After an id-changing patch the old id no
    /// longer resolves.
    pub fn update_status(
        &mut self,
        chat_id: &ChatId,
        message_id: &MessageId,
        patch: &MessagePatch,
    ) -> bool {
        let index = match self.locate(chat_id, message_id) {
            Ok(index) => index,
            Err(e) => {
                debug!(error = %e, "ignoring status update");
                return false;
            }
        };

        let revision = self.bump();
        let Some(log) = self.logs.get_mut(chat_id) else {
            return false;
        };
        if !log.messages[index].apply(patch) {
            warn!(
                chat_id = %chat_id,
                message_id = %message_id,
                from = ?log.messages[index].delivery_status,
                to = ?patch.delivery_status,
                "rejected illegal delivery status transition"
            );
            return true;
        }
        log.stamps[index] = revision;
        log.revision = revision;
        self.persist();
        true
    }

    /// Drop a single message. Used when an acknowledged copy already arrived
    /// by another route and the provisional one would duplicate it.
    pub fn remove(&mut self, chat_id: &ChatId, message_id: &MessageId) -> bool {
        let index = match self.locate(chat_id, message_id) {
            Ok(index) => index,
            Err(e) => {
                debug!(error = %e, "ignoring removal");
                return false;
            }
        };

        let revision = self.bump();
        let Some(log) = self.logs.get_mut(chat_id) else {
            return false;
        };
        log.messages.remove(index);
        log.stamps.remove(index);
        log.revision = revision;
        self.persist();
        true
    }

    /// Forget everything in memory. Storage is not touched.
    pub fn reset(&mut self) {
        self.logs.clear();
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn locate(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<usize, NotFound> {
        let log = self.logs.get(chat_id).ok_or_else(|| NotFound::chat(chat_id))?;
        log.position(message_id)
            .ok_or_else(|| NotFound::message(message_id))
    }

    fn bump(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }

    fn persist(&self) {
        let mapping: BTreeMap<&ChatId, &[Message]> = self
            .logs
            .iter()
            .map(|(id, log)| (id, log.messages.as_slice()))
            .collect();
        write_through(self.storage.as_ref(), KEY_MESSAGES, &mapping);
    }
}
