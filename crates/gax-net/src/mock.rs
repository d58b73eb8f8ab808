//! Deterministic in-process stand-in for the backend.
//!
//! Responses are synthesized from the request's endpoint and method. Ids come
//! from a monotonic counter, so two runs with the same calls produce the same
//! ids. List requests are answered from the attached [`LocalView`] when it has
//! data, and from the demo fixtures otherwise. Accounts, profiles and online
//! markers are remembered for the lifetime of the gateway.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as Age, Utc};
use serde_json::json;
use tracing::debug;

use gax_shared::constants::DEFAULT_MOCK_LATENCY_MS;
use gax_shared::protocol::{
    CreateDirectChatRequest, CreateGroupChatRequest, CreateUserRequest, Endpoint, LoginRequest,
    Method, RegisterRequest, Request, Response, SendMessageRequest, SetOnlineRequest,
    UpdateUserRequest, UserRef,
};
use gax_shared::{Chat, ChatId, DeliveryStatus, Message, MessageId, MessageKind, User, UserId};

use crate::error::{Result, TransportError};
use crate::gateway::{LocalView, SyncGateway};

/// Sender id the demo fixtures use for the local user.
pub const DEMO_SELF: &str = "current-user";

/// Sender id the demo fixtures use for the other party.
pub const DEMO_PEER: &str = "user-2";

struct Credential {
    uuid: UserId,
    username: String,
    password: String,
}

#[derive(Default)]
struct Accounts {
    /// Keyed by lowercased email.
    credentials: HashMap<String, Credential>,
    profiles: HashMap<UserId, User>,
    online: BTreeSet<UserId>,
}

pub struct MockGateway {
    view: Option<Arc<dyn LocalView>>,
    latency: Duration,
    offline: AtomicBool,
    counter: AtomicU64,
    rejections: Mutex<HashMap<Endpoint, String>>,
    token: Mutex<Option<String>>,
    accounts: Mutex<Accounts>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            view: None,
            latency: Duration::from_millis(DEFAULT_MOCK_LATENCY_MS),
            offline: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            rejections: Mutex::new(HashMap::new()),
            token: Mutex::new(None),
            accounts: Mutex::new(Accounts::default()),
        }
    }

    /// Answer list requests from `view` instead of the fixtures.
    pub fn with_view(mut self, view: Arc<dyn LocalView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// While offline every call fails with [`TransportError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Answer `endpoint` with `"success": false` and `reason` until cleared.
    pub fn reject(&self, endpoint: Endpoint, reason: impl Into<String>) {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint, reason.into());
    }

    pub fn clear_rejections(&self) {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    fn accounts(&self) -> MutexGuard<'_, Accounts> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejection(&self, endpoint: Endpoint) -> Option<String> {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint)
            .cloned()
    }

    /// Synthesize the response for `request` without any delay.
    pub fn respond(&self, request: &Request) -> Result<Response> {
        if self.is_offline() {
            return Err(TransportError::Offline);
        }
        if let Some(reason) = self.rejection(request.endpoint) {
            return Ok(refusal(&reason));
        }

        let now = Utc::now();
        let body = match (request.endpoint, request.method) {
            (Endpoint::Register, Method::Post) => {
                let input: RegisterRequest = request.decode_body()?;
                let email = input.email.to_lowercase();
                let mut accounts = self.accounts();
                if accounts.credentials.contains_key(&email) {
                    return Ok(refusal("email taken"));
                }
                if accounts
                    .credentials
                    .values()
                    .any(|c| c.username == input.username)
                {
                    return Ok(refusal("name taken"));
                }
                let uuid = UserId::new(self.next_id("user"));
                accounts.credentials.insert(
                    email,
                    Credential {
                        uuid: uuid.clone(),
                        username: input.username,
                        password: input.password,
                    },
                );
                json!({ "success": true, "uuid": uuid })
            }
            (Endpoint::Login, Method::Post) => {
                let input: LoginRequest = request.decode_body()?;
                let accounts = self.accounts();
                match accounts.credentials.get(&input.email.to_lowercase()) {
                    None => return Ok(refusal("user with this email not found")),
                    Some(c) if c.password != input.password => {
                        return Ok(refusal("invalid credentials"))
                    }
                    Some(c) => json!({
                        "success": true,
                        "uuid": c.uuid,
                        "token": self.next_id("mock-token"),
                    }),
                }
            }
            (Endpoint::CreateUser, Method::Put) => {
                let input: CreateUserRequest = request.decode_body().unwrap_or(CreateUserRequest {
                    uuid: None,
                    username: "User".into(),
                    email: "user@example.com".into(),
                });
                let id = input
                    .uuid
                    .unwrap_or_else(|| UserId::new(self.next_id("user")));
                let user = User::new(id, input.username, input.email, now);
                self.accounts()
                    .profiles
                    .insert(user.id.clone(), user.clone());
                json!({ "success": true, "user": user, "token": self.next_id("mock-token") })
            }
            (Endpoint::GetUser, Method::Get) => {
                let user_id = UserId::from(required_query(request, "uuid")?);
                let user = self
                    .accounts()
                    .profiles
                    .get(&user_id)
                    .cloned()
                    .ok_or_else(user_not_found)?;
                json!({ "success": true, "user": user })
            }
            (Endpoint::UpdateUser, Method::Patch) => {
                let input: UpdateUserRequest = request.decode_body()?;
                let mut accounts = self.accounts();
                let user = accounts
                    .profiles
                    .get_mut(&input.uuid)
                    .ok_or_else(user_not_found)?;
                input.changes.apply_to(user);
                json!({ "success": true, "user": user })
            }
            (Endpoint::DeleteUser, Method::Delete) => {
                let input: UserRef = request.decode_body()?;
                let mut accounts = self.accounts();
                if accounts.profiles.remove(&input.uuid).is_none() {
                    return Err(user_not_found());
                }
                accounts.credentials.retain(|_, c| c.uuid != input.uuid);
                accounts.online.remove(&input.uuid);
                json!({ "success": true, "message": "User deleted" })
            }
            (Endpoint::CreateDirectChat, Method::Post) => {
                let input: CreateDirectChatRequest = request.decode_body()?;
                let chat = Chat::direct(
                    ChatId::new(self.next_id("direct")),
                    "New chat",
                    input.user2_id,
                    now,
                );
                json!({ "success": true, "chat": chat })
            }
            (Endpoint::CreateGroupChat, Method::Post) => {
                let input: CreateGroupChatRequest = request.decode_body()?;
                let title = if input.title.trim().is_empty() {
                    "New group".to_string()
                } else {
                    input.title
                };
                let chat =
                    Chat::group(ChatId::new(self.next_id("group")), title, input.member_ids, now);
                json!({ "success": true, "chat": chat })
            }
            (Endpoint::ListChats, Method::Get) => {
                let chats = self
                    .view
                    .as_ref()
                    .map(|v| v.chats())
                    .filter(|chats| !chats.is_empty())
                    .unwrap_or_else(|| demo_chats(now));
                json!({ "success": true, "chats": chats })
            }
            (Endpoint::ListMessages, Method::Get) => {
                let chat_id = ChatId::from(required_query(request, "chat_id")?);
                let messages = self
                    .view
                    .as_ref()
                    .and_then(|v| v.messages(&chat_id))
                    .unwrap_or_else(|| demo_messages(&chat_id, now));
                json!({ "success": true, "messages": messages })
            }
            (Endpoint::SendMessage, Method::Post) => {
                let input: SendMessageRequest = request.decode_body()?;
                let message = Message {
                    id: MessageId::new(self.next_id("msg")),
                    chat_id: input.chat_id,
                    sender_id: input.author_id,
                    content: input.content,
                    kind: MessageKind::Text,
                    created_at: now,
                    delivery_status: DeliveryStatus::Sent,
                };
                json!({ "success": true, "message": message })
            }
            (Endpoint::SetOnlineStatus, Method::Post) => {
                let input: SetOnlineRequest = request.decode_body()?;
                let mut accounts = self.accounts();
                if input.is_online {
                    accounts.online.insert(input.user_id);
                } else {
                    accounts.online.remove(&input.user_id);
                }
                json!({ "success": true, "message": "Online status updated" })
            }
            (Endpoint::SetOfflineStatus, Method::Post) => {
                let input: UserRef = request.decode_body()?;
                self.accounts().online.remove(&input.uuid);
                json!({ "success": true, "message": "Offline status updated" })
            }
            (Endpoint::IsOnline, Method::Get) => {
                let user_id = UserId::from(required_query(request, "uuid")?);
                let online = self.accounts().online.contains(&user_id);
                json!({ "success": true, "online": online })
            }
            (Endpoint::OnlineUsers, Method::Get) => {
                let uuids: Vec<UserId> = self.accounts().online.iter().cloned().collect();
                json!({ "success": true, "uuids": uuids })
            }
            _ => json!({ "success": true, "message": "Mock response" }),
        };
        Ok(Response::ok(body))
    }
}

#[async_trait]
impl SyncGateway for MockGateway {
    async fn send(&self, request: Request) -> Result<Response> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let response = self.respond(&request);
        debug!(
            endpoint = %request.endpoint,
            ok = response.is_ok(),
            "mock response"
        );
        response
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn is_mock(&self) -> bool {
        true
    }
}

fn refusal(reason: &str) -> Response {
    Response::ok(json!({ "success": false, "message": reason }))
}

fn required_query<'a>(request: &'a Request, key: &str) -> Result<&'a str> {
    request.query_value(key).ok_or_else(|| TransportError::Status {
        status: 400,
        message: format!("{key} is required"),
    })
}

fn user_not_found() -> TransportError {
    TransportError::Status {
        status: 404,
        message: "user not found".into(),
    }
}

// ---------------------------------------------------------------------------
// Demo fixtures
// ---------------------------------------------------------------------------

/// The three chats shown to a fresh offline session.
pub fn demo_chats(now: DateTime<Utc>) -> Vec<Chat> {
    let mut general = Chat::group(
        "chat-1".into(),
        "General chat",
        [UserId::from(DEMO_SELF), UserId::from(DEMO_PEER)],
        now,
    );
    general.last_message_preview = "Welcome to GAX Messenger!".into();
    general.unread_count = 2;

    let mut maria = Chat::direct("chat-2".into(), "Maria", DEMO_PEER.into(), now);
    maria.last_message_preview = "Hi! How are you?".into();
    maria.last_activity_at = now - Age::hours(1);

    let mut team = Chat::group(
        "chat-3".into(),
        "Project team",
        ["user-3", "user-4", "user-5"].map(UserId::from),
        now,
    );
    team.last_message_preview = "Call tomorrow at 10:00".into();
    team.last_activity_at = now - Age::days(1);
    team.unread_count = 5;

    vec![general, maria, team]
}

/// A short conversation for any chat without stored messages.
pub fn demo_messages(chat_id: &ChatId, now: DateTime<Utc>) -> Vec<Message> {
    let line = |n: u32, sender: UserId, content: &str, kind: MessageKind, ago: Age| Message {
        id: MessageId::new(format!("msg-{n}-{chat_id}")),
        chat_id: chat_id.clone(),
        sender_id: sender,
        content: content.to_string(),
        kind,
        created_at: now - ago,
        delivery_status: DeliveryStatus::Sent,
    };

    vec![
        line(
            1,
            UserId::system(),
            "Welcome to the chat!",
            MessageKind::System,
            Age::hours(1),
        ),
        line(
            2,
            DEMO_PEER.into(),
            "Hi! Glad to see you!",
            MessageKind::Text,
            Age::minutes(30),
        ),
        line(
            3,
            DEMO_SELF.into(),
            "Hi! Glad too! How are you?",
            MessageKind::Text,
            Age::minutes(15),
        ),
    ]
}
