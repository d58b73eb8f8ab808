//! The request/response seam between local state and the backend.
//!
//! A [`SyncGateway`] is picked once when the session starts: either the
//! [`MockGateway`](crate::mock::MockGateway) for offline development or the
//! [`HttpGateway`](crate::http::HttpGateway) for a live backend. Callers never
//! branch on which one they hold.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use gax_shared::protocol::{Request, Response};
use gax_shared::{Chat, ChatId, Message};

use crate::error::{Result, TransportError};

#[async_trait]
pub trait SyncGateway: Send + Sync {
    /// Perform one round-trip. Non-success statuses and unreadable bodies
    /// come back as [`TransportError`].
    async fn send(&self, request: Request) -> Result<Response>;

    /// Bearer token attached to subsequent requests. Passed through as-is.
    fn set_token(&self, token: Option<String>);

    /// Whether responses are fabricated locally.
    fn is_mock(&self) -> bool;
}

/// Read access to the client's local chat state.
///
/// The mock gateway answers list requests from this view so that offline
/// sessions see their own data.
pub trait LocalView: Send + Sync {
    fn chats(&self) -> Vec<Chat>;

    /// `None` when no sequence exists for the chat yet.
    fn messages(&self, chat_id: &ChatId) -> Option<Vec<Message>>;
}

/// Send `request` and decode the acknowledged payload.
///
/// A body with `"success": false` is a [`TransportError::Rejected`]; a body
/// that does not match `T` is [`TransportError::Malformed`].
pub async fn call<T: DeserializeOwned>(gateway: &dyn SyncGateway, request: Request) -> Result<T> {
    let endpoint = request.endpoint;
    let method = request.method;
    debug!(%endpoint, %method, "backend request");

    let response = gateway.send(request).await?;
    if !response.acknowledged() {
        let reason = response.message().unwrap_or("no reason given").to_string();
        return Err(TransportError::Rejected(reason));
    }
    response.decode().map_err(TransportError::from)
}
