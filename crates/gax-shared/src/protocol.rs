use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::{Chat, Message, User};
use crate::types::{ChatId, UserId};

/// HTTP verb of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend operations consumed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Register,
    Login,
    CreateUser,
    GetUser,
    UpdateUser,
    DeleteUser,
    CreateDirectChat,
    CreateGroupChat,
    ListChats,
    ListMessages,
    SendMessage,
    SetOnlineStatus,
    SetOfflineStatus,
    IsOnline,
    OnlineUsers,
}

impl Endpoint {
    pub const ALL: [Endpoint; 15] = [
        Self::Register,
        Self::Login,
        Self::CreateUser,
        Self::GetUser,
        Self::UpdateUser,
        Self::DeleteUser,
        Self::CreateDirectChat,
        Self::CreateGroupChat,
        Self::ListChats,
        Self::ListMessages,
        Self::SendMessage,
        Self::SetOnlineStatus,
        Self::SetOfflineStatus,
        Self::IsOnline,
        Self::OnlineUsers,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Register => "/auth/register",
            Self::Login => "/auth/login",
            Self::CreateUser => "/user/create",
            Self::GetUser => "/user/get",
            Self::UpdateUser => "/user/update",
            Self::DeleteUser => "/user/delete",
            Self::CreateDirectChat => "/chat/create-direct",
            Self::CreateGroupChat => "/chat/create-group",
            Self::ListChats => "/chat/list",
            Self::ListMessages => "/chat/messages/list",
            Self::SendMessage => "/chat/message/send",
            Self::SetOnlineStatus => "/user/set_online",
            Self::SetOfflineStatus => "/user/set_offline",
            Self::IsOnline => "/user/is_online",
            Self::OnlineUsers => "/user/get_online_users",
        }
    }

    /// The verb the backend expects for this endpoint.
    pub fn method(self) -> Method {
        match self {
            Self::CreateUser => Method::Put,
            Self::UpdateUser => Method::Patch,
            Self::DeleteUser => Method::Delete,
            Self::GetUser
            | Self::ListChats
            | Self::ListMessages
            | Self::IsOnline
            | Self::OnlineUsers => Method::Get,
            Self::Register
            | Self::Login
            | Self::CreateDirectChat
            | Self::CreateGroupChat
            | Self::SendMessage
            | Self::SetOnlineStatus
            | Self::SetOfflineStatus => Method::Post,
        }
    }

    /// Resolve a request path (query string ignored) to an endpoint.
    pub fn from_path(path: &str) -> Result<Self, ProtocolError> {
        let path = path.split('?').next().unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|e| e.path() == path)
            .ok_or_else(|| ProtocolError::UnknownEndpoint(path.to_string()))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A transport-neutral backend request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method: endpoint.method(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ProtocolError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let body = self.body.clone().ok_or(ProtocolError::MissingBody)?;
        Ok(serde_json::from_value(body)?)
    }
}

/// A parsed backend response. Every body is a JSON object carrying a
/// `success` flag next to the payload fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `success` flag of the body. Bodies without one count as accepted.
    pub fn acknowledged(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Human-readable message carried by the body, if any.
    pub fn message(&self) -> Option<&str> {
        match self.body.get("message") {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Answer of the auth service to register and login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub uuid: UserId,
    /// Issued on login. Older backends send none and the uuid doubles as
    /// the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Profile creation. `uuid` ties the profile to an auth-service account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<UserId>,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUserResponse {
    pub user: User,
    pub token: String,
}

/// Response of profile lookup and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub user: User,
}

/// Profile fields to change. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.about.is_none()
    }

    /// Merge into `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(about) = &self.about {
            user.about = about.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateUserRequest {
    pub uuid: UserId,
    #[serde(flatten)]
    pub changes: ProfileUpdate,
}

/// Body of delete and set-offline, which only name the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    pub uuid: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsOnlineResponse {
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnlineUsersResponse {
    #[serde(default)]
    pub uuids: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateDirectChatRequest {
    pub user1_id: UserId,
    pub user2_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateGroupChatRequest {
    pub title: String,
    pub member_ids: Vec<UserId>,
}

/// Response of both chat creation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub chat: Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatListResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMessageRequest {
    pub chat_id: ChatId,
    pub author_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMessageResponse {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetOnlineRequest {
    pub user_id: UserId,
    pub is_online: bool,
    pub ttl_seconds: u64,
}

/// Plain acknowledgment without a payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths_resolve() {
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_path(endpoint.path()).unwrap(), endpoint);
        }
        assert_eq!(
            Endpoint::from_path("/chat/messages/list?chat_id=c1").unwrap(),
            Endpoint::ListMessages
        );
        assert!(Endpoint::from_path("/room/create").is_err());
        assert_eq!(
            Endpoint::from_path("/user/is_online?uuid=u1").unwrap(),
            Endpoint::IsOnline
        );
    }

    #[test]
    fn test_profile_update_body_is_sparse() {
        let body = UpdateUserRequest {
            uuid: "u1".into(),
            changes: ProfileUpdate {
                about: Some("hi".into()),
                ..ProfileUpdate::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "uuid": "u1", "about": "hi" })
        );
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn test_auth_response_without_token() {
        let auth: AuthResponse = serde_json::from_str(r#"{"uuid":"u-7"}"#).unwrap();
        assert_eq!(auth.uuid.as_str(), "u-7");
        assert_eq!(auth.token, None);
    }

    #[test]
    fn test_request_builder() {
        let req = Request::new(Endpoint::ListMessages).with_query("chat_id", "c1");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query_value("chat_id"), Some("c1"));
        assert_eq!(req.query_value("limit"), None);
        assert!(matches!(
            req.decode_body::<SendMessageRequest>(),
            Err(ProtocolError::MissingBody)
        ));
    }

    #[test]
    fn test_response_ack_flag() {
        let ok = Response::ok(serde_json::json!({ "success": true }));
        assert!(ok.acknowledged());

        let nack = Response::ok(serde_json::json!({ "success": false, "message": "name taken" }));
        assert!(!nack.acknowledged());
        assert_eq!(nack.message(), Some("name taken"));

        let bare = Response::ok(serde_json::json!({ "chats": [] }));
        assert!(bare.acknowledged());
    }
}
