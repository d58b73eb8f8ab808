//! Typed helpers over [`call`] for each backend endpoint.

use gax_shared::constants::ONLINE_TTL_SECS;
use gax_shared::protocol::{
    Ack, AuthResponse, ChatListResponse, ChatResponse, CreateDirectChatRequest,
    CreateGroupChatRequest, CreateUserRequest, CreateUserResponse, Endpoint, IsOnlineResponse,
    LoginRequest, MessageListResponse, OnlineUsersResponse, ProfileUpdate, RegisterRequest,
    Request, SendMessageRequest, SendMessageResponse, SetOnlineRequest, UpdateUserRequest,
    UserRef, UserResponse,
};
use gax_shared::{Chat, ChatId, Message, User, UserId};

use crate::error::Result;
use crate::gateway::{call, SyncGateway};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub async fn register(
    gateway: &dyn SyncGateway,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthResponse> {
    let request = Request::new(Endpoint::Register).with_json(&RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    })?;
    call(gateway, request).await
}

pub async fn login(gateway: &dyn SyncGateway, email: &str, password: &str) -> Result<AuthResponse> {
    let request = Request::new(Endpoint::Login).with_json(&LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    })?;
    call(gateway, request).await
}

/// Create a profile under a backend-assigned id.
pub async fn create_user(
    gateway: &dyn SyncGateway,
    username: &str,
    email: &str,
) -> Result<CreateUserResponse> {
    create_user_with(gateway, None, username, email).await
}

/// Create the profile for an account the auth service already issued
/// `uuid` for.
pub async fn create_profile(
    gateway: &dyn SyncGateway,
    uuid: &UserId,
    username: &str,
    email: &str,
) -> Result<CreateUserResponse> {
    create_user_with(gateway, Some(uuid.clone()), username, email).await
}

async fn create_user_with(
    gateway: &dyn SyncGateway,
    uuid: Option<UserId>,
    username: &str,
    email: &str,
) -> Result<CreateUserResponse> {
    let request = Request::new(Endpoint::CreateUser).with_json(&CreateUserRequest {
        uuid,
        username: username.to_string(),
        email: email.to_string(),
    })?;
    call(gateway, request).await
}

pub async fn get_user(gateway: &dyn SyncGateway, user_id: &UserId) -> Result<User> {
    let request = Request::new(Endpoint::GetUser).with_query("uuid", user_id.as_str());
    let response: UserResponse = call(gateway, request).await?;
    Ok(response.user)
}

pub async fn update_user(
    gateway: &dyn SyncGateway,
    user_id: &UserId,
    changes: &ProfileUpdate,
) -> Result<User> {
    let request = Request::new(Endpoint::UpdateUser).with_json(&UpdateUserRequest {
        uuid: user_id.clone(),
        changes: changes.clone(),
    })?;
    let response: UserResponse = call(gateway, request).await?;
    Ok(response.user)
}

pub async fn delete_user(gateway: &dyn SyncGateway, user_id: &UserId) -> Result<Ack> {
    let request = Request::new(Endpoint::DeleteUser).with_json(&UserRef {
        uuid: user_id.clone(),
    })?;
    call(gateway, request).await
}

// ---------------------------------------------------------------------------
// Chats and messages
// ---------------------------------------------------------------------------

pub async fn create_direct_chat(
    gateway: &dyn SyncGateway,
    user_id: &UserId,
    peer_id: &UserId,
) -> Result<Chat> {
    let request = Request::new(Endpoint::CreateDirectChat).with_json(&CreateDirectChatRequest {
        user1_id: user_id.clone(),
        user2_id: peer_id.clone(),
    })?;
    let response: ChatResponse = call(gateway, request).await?;
    Ok(response.chat)
}

pub async fn create_group_chat(
    gateway: &dyn SyncGateway,
    title: &str,
    member_ids: &[UserId],
) -> Result<Chat> {
    let request = Request::new(Endpoint::CreateGroupChat).with_json(&CreateGroupChatRequest {
        title: title.to_string(),
        member_ids: member_ids.to_vec(),
    })?;
    let response: ChatResponse = call(gateway, request).await?;
    Ok(response.chat)
}

pub async fn list_chats(gateway: &dyn SyncGateway, user_id: &UserId) -> Result<Vec<Chat>> {
    let request = Request::new(Endpoint::ListChats).with_query("user_id", user_id.as_str());
    let response: ChatListResponse = call(gateway, request).await?;
    Ok(response.chats)
}

pub async fn list_messages(gateway: &dyn SyncGateway, chat_id: &ChatId) -> Result<Vec<Message>> {
    let request = Request::new(Endpoint::ListMessages).with_query("chat_id", chat_id.as_str());
    let response: MessageListResponse = call(gateway, request).await?;
    Ok(response.messages)
}

pub async fn send_message(
    gateway: &dyn SyncGateway,
    chat_id: &ChatId,
    author_id: &UserId,
    content: &str,
) -> Result<Message> {
    let request = Request::new(Endpoint::SendMessage).with_json(&SendMessageRequest {
        chat_id: chat_id.clone(),
        author_id: author_id.clone(),
        content: content.to_string(),
    })?;
    let response: SendMessageResponse = call(gateway, request).await?;
    Ok(response.message)
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Mark `user_id` online for [`ONLINE_TTL_SECS`], or offline right away.
pub async fn set_online(gateway: &dyn SyncGateway, user_id: &UserId, online: bool) -> Result<Ack> {
    let request = if online {
        Request::new(Endpoint::SetOnlineStatus).with_json(&SetOnlineRequest {
            user_id: user_id.clone(),
            is_online: true,
            ttl_seconds: ONLINE_TTL_SECS,
        })?
    } else {
        Request::new(Endpoint::SetOfflineStatus).with_json(&UserRef {
            uuid: user_id.clone(),
        })?
    };
    call(gateway, request).await
}

pub async fn is_online(gateway: &dyn SyncGateway, user_id: &UserId) -> Result<bool> {
    let request = Request::new(Endpoint::IsOnline).with_query("uuid", user_id.as_str());
    let response: IsOnlineResponse = call(gateway, request).await?;
    Ok(response.online)
}

pub async fn online_users(gateway: &dyn SyncGateway) -> Result<Vec<UserId>> {
    let response: OnlineUsersResponse = call(gateway, Request::new(Endpoint::OnlineUsers)).await?;
    Ok(response.uuids)
}
