//! Client-side entities.
//!
//! These are the shapes persisted under the storage keys and exchanged with
//! the backend. Field names serialize in camelCase; aliases accept the older
//! names the web client used to write (`name`, `lastMessage`, `timestamp`,
//! `unread`, `members`).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, ChatKind, DeliveryStatus, MessageId, MessageKind, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The signed-in account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Free-form profile text.
    #[serde(default, alias = "about_me", skip_serializing_if = "String::is_empty")]
    pub about: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            about: String::new(),
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Summary of a conversation as shown in the chat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "lastMessage")]
    pub last_message_preview: String,
    #[serde(alias = "timestamp")]
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, alias = "unread")]
    pub unread_count: u32,
    /// Direct: exactly the peer. Group: one or more members.
    #[serde(default, alias = "members")]
    pub participants: BTreeSet<UserId>,
}

impl Chat {
    pub fn direct(
        id: ChatId,
        display_name: impl Into<String>,
        peer: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: ChatKind::Direct,
            display_name: display_name.into(),
            last_message_preview: String::new(),
            last_activity_at: created_at,
            unread_count: 0,
            participants: BTreeSet::from([peer]),
        }
    }

    pub fn group(
        id: ChatId,
        display_name: impl Into<String>,
        members: impl IntoIterator<Item = UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
            display_name: display_name.into(),
            last_message_preview: String::new(),
            last_activity_at: created_at,
            unread_count: 0,
            participants: members.into_iter().collect(),
        }
    }

    /// The peer of a direct chat.
    pub fn peer(&self) -> Option<&UserId> {
        match self.kind {
            ChatKind::Direct => self.participants.iter().next(),
            ChatKind::Group => None,
        }
    }

    /// Set the preview text and move `last_activity_at` forward.
    /// The activity timestamp never moves backward.
    pub fn record_activity(&mut self, preview: impl Into<String>, at: DateTime<Utc>) {
        self.last_message_preview = preview.into();
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message, owned by the sequence of its chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(rename = "type", default = "default_message_kind")]
    pub kind: MessageKind,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "status")]
    pub delivery_status: DeliveryStatus,
}

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

impl Message {
    /// A freshly submitted text message with a provisional id.
    pub fn pending(chat_id: ChatId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::provisional(),
            chat_id,
            sender_id,
            content: content.into(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            delivery_status: DeliveryStatus::Pending,
        }
    }

    /// A system notice inside a chat (welcome lines and the like).
    pub fn system(
        id: MessageId,
        chat_id: ChatId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            chat_id,
            sender_id: UserId::system(),
            content: content.into(),
            kind: MessageKind::System,
            created_at,
            delivery_status: DeliveryStatus::Sent,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System || self.sender_id.is_system()
    }

    /// Merge `patch` into this message.
    ///
    /// Returns `false` and changes nothing when the patch carries a status
    /// change that the delivery state machine forbids.
    pub fn apply(&mut self, patch: &MessagePatch) -> bool {
        if let Some(next) = patch.delivery_status {
            if !self.delivery_status.can_transition_to(next) {
                return false;
            }
            self.delivery_status = next;
        }
        if let Some(id) = &patch.id {
            self.id = id.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(at) = patch.created_at {
            self.created_at = at;
        }
        true
    }
}

/// Partial update of a message. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
}

impl MessagePatch {
    /// Backend acknowledgment: authoritative id and timestamp, status `Sent`.
    pub fn acknowledged(id: MessageId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            created_at: Some(created_at),
            delivery_status: Some(DeliveryStatus::Sent),
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            delivery_status: Some(DeliveryStatus::Failed),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_record_activity_never_moves_backward() {
        let now = Utc::now();
        let mut chat = Chat::direct("c1".into(), "Maria", "user-2".into(), now);

        chat.record_activity("older", now - Duration::hours(1));
        assert_eq!(chat.last_message_preview, "older");
        assert_eq!(chat.last_activity_at, now);

        let later = now + Duration::minutes(5);
        chat.record_activity("newer", later);
        assert_eq!(chat.last_activity_at, later);
    }

    #[test]
    fn test_direct_chat_peer() {
        let chat = Chat::direct("c1".into(), "Maria", "user-2".into(), Utc::now());
        assert_eq!(chat.peer(), Some(&UserId::from("user-2")));

        let group = Chat::group("g1".into(), "Team", ["a".into(), "b".into()], Utc::now());
        assert_eq!(group.peer(), None);
        assert_eq!(group.participants.len(), 2);
    }

    #[test]
    fn test_acknowledgment_patch() {
        let mut msg = Message::pending("c1".into(), "me".into(), "hello");
        assert!(msg.id.is_provisional());

        let at = Utc::now();
        assert!(msg.apply(&MessagePatch::acknowledged("msg-42".into(), at)));
        assert_eq!(msg.id, MessageId::from("msg-42"));
        assert_eq!(msg.created_at, at);
        assert_eq!(msg.delivery_status, DeliveryStatus::Sent);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_failed_message_rejects_late_ack() {
        let mut msg = Message::pending("c1".into(), "me".into(), "hello");
        assert!(msg.apply(&MessagePatch::failed()));
        let before = msg.clone();

        assert!(!msg.apply(&MessagePatch::acknowledged("msg-1".into(), Utc::now())));
        assert_eq!(msg, before);
        assert!(msg.id.is_provisional());
    }

    #[test]
    fn test_chat_accepts_legacy_json() {
        let json = serde_json::json!({
            "id": "chat-2",
            "name": "Maria",
            "type": "direct",
            "lastMessage": "Hi! How are you?",
            "timestamp": "2024-05-01T10:00:00Z",
            "unread": 2
        });
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert_eq!(chat.display_name, "Maria");
        assert_eq!(chat.kind, ChatKind::Direct);
        assert_eq!(chat.unread_count, 2);
        assert!(chat.participants.is_empty());
    }

    #[test]
    fn test_message_accepts_legacy_json() {
        let json = serde_json::json!({
            "id": "temp-1",
            "chatId": "c1",
            "senderId": "user-1",
            "content": "hello",
            "timestamp": "2024-05-01T10:00:00Z",
            "status": "sending"
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.delivery_status, DeliveryStatus::Pending);
    }
}
