use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gax_net::{api, demo_chats};
use gax_shared::{Chat, ChatId, Message, MessageId, UserId};

use crate::error::{ClientError, Result};
use crate::events::Notice;
use crate::session::Session;

impl Session {
    /// Refresh the chat list from the backend.
    ///
    /// On failure the current list stays; an empty list is seeded with the
    /// demo chats so the user has something to look at.
    pub async fn load_chats(&self) -> Result<()> {
        let user_id = self.require_user()?;

        match api::list_chats(self.gateway(), &user_id).await {
            Ok(chats) => {
                info!(count = chats.len(), "chats loaded");
                self.with_state(|s| s.directory.replace_all(chats));
            }
            Err(e) => {
                warn!(error = %e, "could not load chats");
                self.notify(Notice::warning("Could not load chats, showing saved data"));
                self.with_state(|s| {
                    if s.directory.is_empty() {
                        s.directory.replace_all(demo_chats(Utc::now()));
                    }
                });
            }
        }

        self.render_chats();
        Ok(())
    }

    /// Start a one-to-one chat with a new contact named `peer_name`.
    pub async fn create_direct_chat(&self, peer_name: &str) -> Result<ChatId> {
        let peer_name = peer_name.trim();
        if peer_name.is_empty() {
            return Err(ClientError::InvalidInput("contact name is required".into()));
        }
        let user_id = self.require_user()?;
        let peer_id = UserId::new(format!("user-{}", Uuid::new_v4()));

        let mut chat = match api::create_direct_chat(self.gateway(), &user_id, &peer_id).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(error = %e, "could not create direct chat");
                self.notify(Notice::error(format!("Could not create chat: {e}")));
                return Err(e.into());
            }
        };
        chat.display_name = peer_name.to_string();

        let welcome = format!("Chat with {peer_name} created");
        Ok(self.open_new_chat(chat, welcome))
    }

    /// Create a group with `members` plus the current user.
    pub async fn create_group_chat(&self, title: &str, members: &[UserId]) -> Result<ChatId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::InvalidInput("group title is required".into()));
        }
        if members.is_empty() {
            return Err(ClientError::InvalidInput("a group needs at least one member".into()));
        }
        let user_id = self.require_user()?;

        let member_ids: Vec<UserId> = members
            .iter()
            .cloned()
            .chain(std::iter::once(user_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let chat = match api::create_group_chat(self.gateway(), title, &member_ids).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(error = %e, "could not create group chat");
                self.notify(Notice::error(format!("Could not create group: {e}")));
                return Err(e.into());
            }
        };

        let welcome = format!("Group \"{title}\" created");
        Ok(self.open_new_chat(chat, welcome))
    }

    /// Make `chat_id` the current chat, clear its unread count and load its
    /// messages. Returns `false` for an unknown chat.
    pub async fn select_chat(&self, chat_id: &ChatId) -> bool {
        let known = self.with_state(|s| {
            if !s.directory.contains(chat_id) {
                return false;
            }
            s.current_chat = Some(chat_id.clone());
            s.directory.mark_read(chat_id);
            true
        });
        if !known {
            debug!(chat_id = %chat_id, "select ignored, unknown chat");
            return false;
        }

        self.render_chats();
        self.load_messages(chat_id).await;
        true
    }

    /// Put a freshly created chat at the top, open it and greet with a
    /// system line.
    fn open_new_chat(&self, chat: Chat, welcome: String) -> ChatId {
        let chat_id = chat.id.clone();
        let now = Utc::now();
        let greeting = Message::system(
            MessageId::new(format!("sys-{}", Uuid::new_v4())),
            chat_id.clone(),
            welcome.clone(),
            now,
        );

        self.with_state(|s| {
            s.directory.upsert_front(chat);
            s.directory.update_preview(&chat_id, &welcome, now);
            s.messages.append(&chat_id, greeting);
            s.current_chat = Some(chat_id.clone());
        });
        info!(chat_id = %chat_id, "chat created");

        self.render_chats();
        self.render_messages(&chat_id);
        self.notify(Notice::success(welcome));
        chat_id
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{signed_in, Harness};

    use super::*;

    #[tokio::test]
    async fn test_created_chats_are_newest_first() {
        let h = signed_in().await;
        let c1 = h.session.create_direct_chat("Maria").await.unwrap();
        let c2 = h.session.create_direct_chat("Ivan").await.unwrap();

        let ids: Vec<ChatId> = h.session.chats().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![c2.clone(), c1]);
        assert_eq!(h.session.current_chat(), Some(c2.clone()));

        let chat = h.session.chat(&c2).unwrap();
        assert_eq!(chat.display_name, "Ivan");
        assert_eq!(chat.last_message_preview, "Chat with Ivan created");

        let messages = h.session.messages(&c2);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_system());
    }

    #[tokio::test]
    async fn test_create_renders_list_and_greeting() {
        let h = signed_in().await;
        let before = h.sink.chat_render_count();

        let id = h.session.create_direct_chat("Maria").await.unwrap();
        assert!(h.sink.chat_render_count() > before);
        assert_eq!(h.sink.message_renders_for(&id), vec![1]);
    }

    #[tokio::test]
    async fn test_load_chats_renders_even_on_failure() {
        let h = signed_in().await;
        let before = h.sink.chat_render_count();
        h.session.load_chats().await.unwrap();
        assert_eq!(h.sink.chat_render_count(), before + 1);

        h.mock.set_offline(true);
        h.session.load_chats().await.unwrap();
        assert_eq!(h.sink.chat_render_count(), before + 2);
    }

    #[tokio::test]
    async fn test_group_includes_current_user() {
        let h = signed_in().await;
        let me = h.session.user().unwrap().id;
        let id = h
            .session
            .create_group_chat("Team", &["u7".into(), "u8".into()])
            .await
            .unwrap();

        let chat = h.session.chat(&id).unwrap();
        assert_eq!(chat.display_name, "Team");
        assert!(chat.participants.contains(&me));
        assert_eq!(chat.participants.len(), 3);
    }

    #[tokio::test]
    async fn test_group_validation() {
        let h = signed_in().await;
        assert!(matches!(
            h.session.create_group_chat("  ", &["u7".into()]).await,
            Err(ClientError::InvalidInput(_))
        ));
        assert!(matches!(
            h.session.create_group_chat("Team", &[]).await,
            Err(ClientError::InvalidInput(_))
        ));
        assert!(h.session.chats().is_empty());
    }

    #[tokio::test]
    async fn test_create_offline_surfaces_error() {
        let h = signed_in().await;
        h.mock.set_offline(true);

        let err = h.session.create_direct_chat("Maria").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(h.session.chats().is_empty());
        assert!(h.sink.has_error_notice());
    }

    #[tokio::test]
    async fn test_create_requires_sign_in() {
        let h = Harness::new();
        assert!(matches!(
            h.session.create_direct_chat("Maria").await,
            Err(ClientError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_load_chats_falls_back_to_demo_set() {
        let h = signed_in().await;
        h.mock.set_offline(true);

        h.session.load_chats().await.unwrap();
        let ids: Vec<String> = h.session.chats().iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["chat-1", "chat-2", "chat-3"]);
    }

    #[tokio::test]
    async fn test_load_chats_failure_keeps_current_list() {
        let h = signed_in().await;
        let mine = h.session.create_direct_chat("Maria").await.unwrap();
        h.mock.set_offline(true);

        h.session.load_chats().await.unwrap();
        let chats = h.session.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, mine);
    }

    #[tokio::test]
    async fn test_select_chat_clears_unread() {
        let h = signed_in().await;
        h.session.load_chats().await.unwrap();
        let team: ChatId = "chat-3".into();
        assert_eq!(h.session.chat(&team).unwrap().unread_count, 5);

        assert!(h.session.select_chat(&team).await);
        assert_eq!(h.session.chat(&team).unwrap().unread_count, 0);
        assert_eq!(h.session.current_chat(), Some(team.clone()));
        assert_eq!(h.session.messages(&team).len(), 3);
    }

    #[tokio::test]
    async fn test_select_unknown_chat_is_noop() {
        let h = signed_in().await;
        assert!(!h.session.select_chat(&"missing".into()).await);
        assert_eq!(h.session.current_chat(), None);
    }
}
