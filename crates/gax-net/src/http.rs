//! [`SyncGateway`] over HTTP against the api gateway.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use gax_shared::protocol::{Endpoint, Method, Request, Response};

use crate::error::{Result, TransportError};
use crate::gateway::SyncGateway;

/// Prefix the backend puts in front of errors relayed from its services.
const RPC_ERROR_PREFIX: &str = "rpc error: code = Unknown desc = ";

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
}

impl HttpGateway {
    /// Build a gateway rooted at `base_url`. Every request is abandoned after
    /// `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout.as_millis() as u64)
        } else if e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = self.url(request.endpoint);
        let mut builder = self
            .client
            .request(http_method(request.method), &url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "backend responded");

        if !status.is_success() {
            let message = error_message(&text);
            warn!(%url, status = status.as_u16(), %message, "backend error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Response {
            status: status.as_u16(),
            body: parse_body(&text)?,
        })
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn is_mock(&self) -> bool {
        false
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Parse a success body. Empty and non-JSON bodies are malformed.
pub fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(TransportError::Malformed("empty response body".into()));
    }
    serde_json::from_str(text).map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Best human-readable reason from an error body.
///
/// Uses the JSON `message` (or `error`) field when present, otherwise the raw
/// text. The backend's relayed-rpc prefix is dropped either way.
pub fn error_message(text: &str) -> String {
    let raw = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| text.trim().to_string());

    let cleaned = raw.strip_prefix(RPC_ERROR_PREFIX).unwrap_or(&raw).trim();
    if cleaned.is_empty() {
        "empty response body".to_string()
    } else {
        cleaned.to_string()
    }
}
