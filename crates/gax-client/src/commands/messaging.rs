use chrono::Utc;
use tracing::{debug, info, warn};

use gax_net::{api, demo_messages, PushNotification};
use gax_shared::{ChatId, Message, MessagePatch};
use gax_store::ReplaceOutcome;

use crate::error::{ClientError, Result};
use crate::events::Notice;
use crate::session::Session;

impl Session {
    /// Reload the messages of `chat_id` from the backend.
    ///
    /// Returns how the snapshot was applied, or `None` when the request
    /// failed and stored (or demo) messages are shown instead.
    pub async fn load_messages(&self, chat_id: &ChatId) -> Option<ReplaceOutcome> {
        let based_on = self.with_state(|s| s.messages.revision(chat_id));

        let outcome = match api::list_messages(self.gateway(), chat_id).await {
            Ok(snapshot) => {
                let outcome = self.with_state(|s| {
                    s.messages.replace_from_snapshot(chat_id, snapshot, based_on)
                });
                debug!(chat_id = %chat_id, ?outcome, "messages loaded");
                Some(outcome)
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "could not load messages");
                self.notify(Notice::warning("Could not load messages, showing saved history"));
                self.with_state(|s| {
                    if !s.messages.has_chat(chat_id) {
                        s.messages.replace_all(chat_id, demo_messages(chat_id, Utc::now()));
                    }
                });
                None
            }
        };

        self.render_messages(chat_id);
        outcome
    }

    /// Send `text` to the current chat.
    ///
    /// The message is shown at once as `Pending` under a provisional id. The
    /// backend's acknowledgment replaces id and timestamp and marks it
    /// `Sent`; any transport failure marks it `Failed` and raises a notice.
    /// Either way the message as it now stands is returned.
    pub async fn send_message(&self, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::InvalidInput("message is empty".into()));
        }
        let (chat_id, user_id) = self.with_state(|s| (s.current_chat.clone(), s.user_id().cloned()));
        let chat_id = chat_id.ok_or(ClientError::NoActiveChat)?;
        let user_id = user_id.ok_or(ClientError::NotSignedIn)?;

        let pending = Message::pending(chat_id.clone(), user_id.clone(), text);
        let provisional = pending.id.clone();
        self.with_state(|s| s.messages.append(&chat_id, pending.clone()));
        self.render_messages(&chat_id);

        let result = api::send_message(self.gateway(), &chat_id, &user_id, text).await;

        let settled = match result {
            Ok(ack) => {
                let patch = MessagePatch::acknowledged(ack.id.clone(), ack.created_at);
                let stored = self.with_state(|s| {
                    if s.messages.find(&chat_id, &ack.id).is_some() {
                        // The acknowledged copy already arrived by push or reload.
                        s.messages.remove(&chat_id, &provisional);
                    } else if !s.messages.update_status(&chat_id, &provisional, &patch) {
                        s.messages.append_if_absent(&chat_id, ack.clone());
                    }
                    s.directory.update_preview(&chat_id, text, ack.created_at);
                    s.messages.find(&chat_id, &ack.id).cloned()
                });
                info!(chat_id = %chat_id, message_id = %ack.id, "message sent");
                self.render_chats();
                stored.unwrap_or(ack)
            }
            Err(e) => {
                warn!(chat_id = %chat_id, message_id = %provisional, error = %e, "message not sent");
                let failed = self.with_state(|s| {
                    s.messages
                        .update_status(&chat_id, &provisional, &MessagePatch::failed());
                    s.messages.find(&chat_id, &provisional).cloned()
                });
                self.notify(Notice::error(format!("Message not sent: {e}")));
                failed.unwrap_or_else(|| {
                    let mut m = pending;
                    m.apply(&MessagePatch::failed());
                    m
                })
            }
        };

        self.render_messages(&chat_id);
        Ok(settled)
    }

    /// Fold a server push into local state.
    pub fn apply_push(&self, notification: PushNotification) {
        match notification {
            PushNotification::MessageReceived(message) => {
                let chat_id = message.chat_id.clone();
                let preview = message.content.clone();
                let at = message.created_at;
                let known_chat = self.with_state(|s| {
                    if !s.messages.append_if_absent(&chat_id, message) {
                        return None;
                    }
                    s.directory.update_preview(&chat_id, &preview, at);
                    if !s.is_current(&chat_id) {
                        s.directory.increment_unread(&chat_id);
                    }
                    Some(s.directory.contains(&chat_id))
                });

                match known_chat {
                    None => return,
                    Some(false) => debug!(chat_id = %chat_id, "push for a chat not in the list"),
                    Some(true) => {}
                }
                self.render_chats();
                self.render_messages(&chat_id);
            }
            PushNotification::PresenceChanged { user_id, status } => {
                debug!(user_id = %user_id, ?status, "presence changed");
                self.with_state(|s| s.presence.insert(user_id, status));
            }
            PushNotification::Disconnected { reason } => {
                warn!(%reason, "push channel disconnected");
                self.notify(Notice::warning("Live updates disconnected"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gax_shared::protocol::Endpoint;
    use gax_shared::{DeliveryStatus, MessageId, PresenceStatus, UserId};

    use super::*;
    use crate::testing::{signed_in, Harness};

    async fn with_chat() -> (Harness, ChatId) {
        let h = signed_in().await;
        let chat = h.session.create_direct_chat("Maria").await.unwrap();
        (h, chat)
    }

    #[tokio::test]
    async fn test_send_acknowledged() {
        let (h, chat) = with_chat().await;

        let sent = h.session.send_message("  hello  ").await.unwrap();
        assert_eq!(sent.content, "hello");
        assert_eq!(sent.delivery_status, DeliveryStatus::Sent);
        assert!(!sent.id.is_provisional());

        let messages = h.session.messages(&chat);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], sent);
        assert_eq!(h.session.chat(&chat).unwrap().last_message_preview, "hello");
    }

    #[tokio::test]
    async fn test_send_offline_marks_failed() {
        let (h, chat) = with_chat().await;
        h.mock.set_offline(true);

        let failed = h.session.send_message("hello").await.unwrap();
        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        assert!(failed.id.is_provisional());

        let stored = h.session.messages(&chat);
        let last = stored.last().unwrap();
        assert_eq!(last.id, failed.id);
        assert_eq!(last.content, "hello");
        assert_eq!(last.delivery_status, DeliveryStatus::Failed);
        assert!(h.sink.has_error_notice());
        assert_eq!(
            h.session.chat(&chat).unwrap().last_message_preview,
            "Chat with Maria created"
        );
    }

    #[tokio::test]
    async fn test_send_negative_ack_marks_failed() {
        let (h, chat) = with_chat().await;
        h.mock.reject(Endpoint::SendMessage, "muted");

        let failed = h.session.send_message("hello").await.unwrap();
        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        assert_eq!(h.session.messages(&chat).len(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_a_new_message() {
        let (h, chat) = with_chat().await;
        h.mock.set_offline(true);
        let failed = h.session.send_message("hello").await.unwrap();

        h.mock.set_offline(false);
        let retried = h.session.send_message("hello").await.unwrap();
        assert_ne!(failed.id, retried.id);

        let statuses: Vec<DeliveryStatus> = h
            .session
            .messages(&chat)
            .iter()
            .skip(1)
            .map(|m| m.delivery_status)
            .collect();
        assert_eq!(statuses, vec![DeliveryStatus::Failed, DeliveryStatus::Sent]);
    }

    #[tokio::test]
    async fn test_send_requires_chat_and_text() {
        let h = signed_in().await;
        assert!(matches!(
            h.session.send_message("hi").await,
            Err(ClientError::NoActiveChat)
        ));

        let (h, _) = with_chat().await;
        assert!(matches!(
            h.session.send_message("   ").await,
            Err(ClientError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_load_messages_failure_keeps_stored_history() {
        let (h, chat) = with_chat().await;
        h.session.send_message("kept").await.unwrap();
        h.mock.set_offline(true);

        assert_eq!(h.session.load_messages(&chat).await, None);
        let contents: Vec<String> = h
            .session
            .messages(&chat)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["Chat with Maria created", "kept"]);
    }

    #[tokio::test]
    async fn test_load_messages_failure_seeds_demo_history() {
        let h = signed_in().await;
        h.mock.set_offline(true);
        let chat: ChatId = "chat-2".into();

        assert_eq!(h.session.load_messages(&chat).await, None);
        let ids: Vec<MessageId> = h.session.messages(&chat).into_iter().map(|m| m.id).collect();
        assert_eq!(ids[0].as_str(), "msg-1-chat-2");
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_reload_racing_with_send_keeps_local_message() {
        let h = Harness::detached(Duration::from_millis(50));
        h.session.sign_up("alice", "alice@example.com").await.unwrap();
        let chat = h.session.create_direct_chat("Maria").await.unwrap();

        let (outcome, sent) = tokio::join!(h.session.load_messages(&chat), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.session.send_message("hello").await
        });

        assert_eq!(outcome, Some(ReplaceOutcome::Merged { kept_local: 1 }));
        let sent = sent.unwrap();
        assert_eq!(sent.delivery_status, DeliveryStatus::Sent);

        let messages = h.session.messages(&chat);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].id.as_str(), format!("msg-1-{chat}"));
        assert_eq!(messages[3].id, sent.id);
    }

    #[tokio::test]
    async fn test_failed_message_survives_reload() {
        let h = Harness::detached(Duration::ZERO);
        h.session.sign_up("alice", "alice@example.com").await.unwrap();
        let chat = h.session.create_direct_chat("Maria").await.unwrap();

        h.mock.set_offline(true);
        let failed = h.session.send_message("hello").await.unwrap();
        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        h.mock.set_offline(false);

        let outcome = h.session.load_messages(&chat).await;
        assert_eq!(outcome, Some(ReplaceOutcome::Merged { kept_local: 1 }));

        let messages = h.session.messages(&chat);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].id.as_str(), format!("msg-1-{chat}"));
        assert_eq!(messages[3], failed);

        // A second quiet reload still keeps it.
        h.session.load_messages(&chat).await;
        assert_eq!(h.session.messages(&chat).last(), Some(&failed));
    }

    #[tokio::test]
    async fn test_send_renders_pending_then_settled() {
        let (h, chat) = with_chat().await;
        let before = h.sink.message_renders_for(&chat).len();
        let chat_renders = h.sink.chat_render_count();

        h.session.send_message("hello").await.unwrap();

        let renders = h.sink.message_renders_for(&chat);
        assert!(renders.len() >= before + 2);
        // The pending copy is on screen before the acknowledgment arrives.
        assert_eq!(renders[before], 2);
        assert_eq!(renders.last(), Some(&2));
        assert!(h.sink.chat_render_count() > chat_renders);
    }

    #[tokio::test]
    async fn test_failed_send_renders_twice() {
        let (h, chat) = with_chat().await;
        h.mock.set_offline(true);
        let before = h.sink.message_renders_for(&chat).len();

        h.session.send_message("hello").await.unwrap();
        assert_eq!(h.sink.message_renders_for(&chat).len(), before + 2);
    }

    #[tokio::test]
    async fn test_push_renders_chats_and_messages() {
        let (h, chat) = with_chat().await;
        let chat_renders = h.sink.chat_render_count();
        let before = h.sink.message_renders_for(&chat).len();

        let mut incoming = Message::pending(chat.clone(), UserId::from("u2"), "hey");
        incoming.id = "srv-3".into();
        incoming.delivery_status = DeliveryStatus::Sent;
        h.session.apply_push(PushNotification::MessageReceived(incoming.clone()));

        assert_eq!(h.sink.chat_render_count(), chat_renders + 1);
        assert_eq!(h.sink.message_renders_for(&chat).len(), before + 1);

        // A duplicate changes nothing and renders nothing.
        h.session.apply_push(PushNotification::MessageReceived(incoming));
        assert_eq!(h.sink.chat_render_count(), chat_renders + 1);
        assert_eq!(h.sink.message_renders_for(&chat).len(), before + 1);
    }

    #[tokio::test]
    async fn test_push_to_background_chat_counts_unread() {
        let (h, first) = with_chat().await;
        let second = h.session.create_direct_chat("Ivan").await.unwrap();
        assert!(h.session.select_chat(&first).await);

        let mut incoming = Message::pending(second.clone(), UserId::from("u2"), "ping");
        incoming.id = "srv-1".into();
        incoming.delivery_status = DeliveryStatus::Sent;

        h.session.apply_push(PushNotification::MessageReceived(incoming.clone()));
        h.session.apply_push(PushNotification::MessageReceived(incoming));

        let chat = h.session.chat(&second).unwrap();
        assert_eq!(chat.unread_count, 1);
        assert_eq!(chat.last_message_preview, "ping");
        assert_eq!(h.session.messages(&second).len(), 2);
    }

    #[tokio::test]
    async fn test_push_to_current_chat_stays_read() {
        let (h, chat) = with_chat().await;
        let mut incoming = Message::pending(chat.clone(), UserId::from("u2"), "hey");
        incoming.id = "srv-2".into();

        h.session.apply_push(PushNotification::MessageReceived(incoming));
        assert_eq!(h.session.chat(&chat).unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_push_presence_and_disconnect() {
        let h = signed_in().await;
        h.session.apply_push(PushNotification::PresenceChanged {
            user_id: "u2".into(),
            status: PresenceStatus::Online,
        });
        assert!(h
            .session
            .with_state(|s| s.presence.get(&UserId::from("u2")).copied())
            .is_some_and(PresenceStatus::is_online));

        let before = h.sink.notice_count();
        h.session.apply_push(PushNotification::Disconnected {
            reason: "closed by server".into(),
        });
        assert_eq!(h.sink.notice_count(), before + 1);
    }

    #[tokio::test]
    async fn test_select_while_offline_shows_saved_messages() {
        let (h, chat) = with_chat().await;
        h.mock.set_offline(true);

        assert!(h.session.select_chat(&chat).await);
        assert_eq!(h.session.messages(&chat).len(), 1);
        assert!(h
            .sink
            .notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.level == crate::events::NoticeLevel::Warning));
    }
}
