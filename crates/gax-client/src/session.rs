//! The signed-in session: owned state, the chosen gateway, and the
//! lifecycle flows (sign-up, restore, sign-out).
//!
//! Chat and message flows live in [`crate::commands`] as further `impl
//! Session` blocks.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gax_net::push::PushCommand;
use gax_net::{api, HttpGateway, LocalView, MockGateway, SyncGateway, TransportError};
use gax_shared::constants::{KEY_TOKEN, KEY_USER};
use gax_shared::{Chat, ChatId, Message, PresenceStatus, User, UserId};
use gax_store::{get_json, write_through, Persistence};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{Notice, RenderSink};
use crate::state::{lock, ChatState, SharedState, StateView};

pub struct Session {
    config: ClientConfig,
    state: SharedState,
    storage: Arc<dyn Persistence>,
    gateway: Arc<dyn SyncGateway>,
    sink: Arc<dyn RenderSink>,
    push: Mutex<Option<mpsc::Sender<PushCommand>>>,
}

/// Pick the gateway variant for the lifetime of a session.
pub fn build_gateway(
    config: &ClientConfig,
    view: Arc<dyn LocalView>,
) -> std::result::Result<Arc<dyn SyncGateway>, TransportError> {
    if config.mock {
        info!(latency_ms = config.mock_latency.as_millis() as u64, "using mock backend");
        Ok(Arc::new(
            MockGateway::new()
                .with_latency(config.mock_latency)
                .with_view(view),
        ))
    } else {
        info!(url = %config.api_url, "using http backend");
        Ok(Arc::new(HttpGateway::new(
            config.api_url.clone(),
            config.request_timeout,
        )?))
    }
}

impl Session {
    /// Create a session over `storage`, selecting the gateway from `config`.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn Persistence>,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self> {
        let state = ChatState::shared(storage.clone());
        let gateway = build_gateway(&config, Arc::new(StateView::new(state.clone())))?;
        Ok(Self::from_parts(config, state, storage, gateway, sink))
    }

    /// Assemble a session from already-built parts.
    pub fn from_parts(
        config: ClientConfig,
        state: SharedState,
        storage: Arc<dyn Persistence>,
        gateway: Arc<dyn SyncGateway>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            config,
            state,
            storage,
            gateway,
            sink,
            push: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_mock(&self) -> bool {
        self.gateway.is_mock()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn user(&self) -> Option<User> {
        self.with_state(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.with_state(|s| s.token.clone())
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.with_state(|s| s.directory.list().to_vec())
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<Chat> {
        self.with_state(|s| s.directory.get(chat_id).cloned())
    }

    pub fn messages(&self, chat_id: &ChatId) -> Vec<Message> {
        self.with_state(|s| s.messages.get(chat_id).to_vec())
    }

    pub fn current_chat(&self) -> Option<ChatId> {
        self.with_state(|s| s.current_chat.clone())
    }

    /// Last known presence of `user_id`, if any was ever reported.
    pub fn presence(&self, user_id: &UserId) -> Option<PresenceStatus> {
        self.with_state(|s| s.presence.get(user_id).copied())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register a new account.
    ///
    /// When the backend cannot be reached the session continues offline
    /// with a locally generated demo user.
    pub async fn sign_up(&self, username: &str, email: &str) -> Result<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(ClientError::InvalidInput(
                "username and email are required".into(),
            ));
        }

        let (user, token) = match api::create_user(self.gateway.as_ref(), username, email).await {
            Ok(created) => (created.user, Some(created.token)),
            Err(e) => {
                warn!(error = %e, "sign-up failed, continuing as demo user");
                self.notify(Notice::warning("Server unavailable, continuing in demo mode"));
                let now = Utc::now();
                let id = UserId::new(format!("demo-user-{}", now.timestamp_millis()));
                (User::new(id, username, email, now), None)
            }
        };

        self.establish(&user, token);
        info!(user_id = %user.id, "signed up");

        self.set_online(true).await?;
        self.notify(Notice::success(format!("Welcome, {}!", user.username)));
        Ok(user)
    }

    /// Reload a previous session from storage.
    ///
    /// Returns `false` when nothing was stored. An unreadable user record
    /// wipes the whole namespace.
    pub fn restore(&self) -> bool {
        let user = match get_json::<User>(self.storage.as_ref(), KEY_USER) {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "stored user is unreadable, clearing storage");
                if let Err(e) = self.storage.clear() {
                    warn!(error = %e, "could not clear storage");
                }
                return false;
            }
        };

        let token = get_json::<String>(self.storage.as_ref(), KEY_TOKEN).unwrap_or_else(|e| {
            warn!(error = %e, "stored token is unreadable");
            None
        });
        self.gateway.set_token(token.clone());

        let chats = self.with_state(|s| {
            s.user = Some(user.clone());
            s.token = token;
            s.directory.restore();
            s.messages.restore();
            s.directory.len()
        });
        info!(user_id = %user.id, chats, "session restored");

        self.render_chats();
        true
    }

    /// Fetch chats if none were restored and open the first one.
    pub async fn load_initial_data(&self) -> Result<()> {
        if self.with_state(|s| s.directory.is_empty()) {
            self.load_chats().await?;
        }

        let first = self.with_state(|s| match s.current_chat {
            Some(_) => None,
            None => s.directory.first().map(|c| c.id.clone()),
        });
        if let Some(chat_id) = first {
            self.select_chat(&chat_id).await;
        }
        Ok(())
    }

    /// Announce presence. A failure only produces a notice.
    pub async fn set_online(&self, online: bool) -> Result<bool> {
        let user_id = self.require_user()?;
        match api::set_online(self.gateway.as_ref(), &user_id, online).await {
            Ok(_) => {
                debug!(user_id = %user_id, online, "presence updated");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, online, "could not update presence");
                self.notify(Notice::warning("Could not update online status"));
                Ok(false)
            }
        }
    }

    /// Wipe every key this client owns and reset in-memory state.
    pub fn clear_data(&self) {
        self.stop_push();
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "could not clear storage");
        }
        self.gateway.set_token(None);
        self.with_state(ChatState::reset);
        info!("local data cleared");

        self.render_chats();
        self.notify(Notice::info("Data cleared"));
    }

    /// Go offline and clear local data.
    pub async fn sign_out(&self) {
        if self.user().is_some() {
            if let Err(e) = self.set_online(false).await {
                warn!(error = %e, "could not go offline before signing out");
            }
        }
        self.clear_data();
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    pub(crate) fn attach_push(&self, commands: mpsc::Sender<PushCommand>) {
        let previous = self
            .push
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(commands);
        if let Some(old) = previous {
            let _ = old.try_send(PushCommand::Shutdown);
        }
    }

    pub fn stop_push(&self) {
        let sender = self.push.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            debug!("stopping push channel");
            let _ = sender.try_send(PushCommand::Shutdown);
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    pub(crate) fn gateway(&self) -> &dyn SyncGateway {
        self.gateway.as_ref()
    }

    /// Run `f` under the state lock. Never call this across an `.await`.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    /// Make `user` the signed-in account and persist it with `token`.
    pub(crate) fn establish(&self, user: &User, token: Option<String>) {
        write_through(self.storage.as_ref(), KEY_USER, user);
        match &token {
            Some(token) => {
                write_through(self.storage.as_ref(), KEY_TOKEN, token);
            }
            None => {
                self.forget(KEY_TOKEN);
            }
        }
        self.gateway.set_token(token.clone());
        self.with_state(|s| {
            s.user = Some(user.clone());
            s.token = token;
        });
    }

    /// Replace the stored profile of the signed-in user.
    pub(crate) fn store_user(&self, user: &User) {
        write_through(self.storage.as_ref(), KEY_USER, user);
        self.with_state(|s| s.user = Some(user.clone()));
    }

    pub(crate) fn require_user(&self) -> Result<UserId> {
        self.with_state(|s| s.user_id().cloned())
            .ok_or(ClientError::NotSignedIn)
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.sink.notice(&notice);
    }

    pub(crate) fn render_chats(&self) {
        let chats = self.chats();
        self.sink.chats_changed(&chats);
    }

    pub(crate) fn render_messages(&self, chat_id: &ChatId) {
        let messages = self.messages(chat_id);
        self.sink.messages_changed(chat_id, &messages);
    }

    fn forget(&self, key: &str) -> bool {
        match self.storage.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "could not remove stored value");
                false
            }
        }
    }
}
