//! Server push over a WebSocket, using the mpsc command/notification pattern.
//!
//! The socket runs in its own tokio task. The application sends
//! [`PushCommand`]s in and receives [`PushNotification`]s out, and never
//! touches the socket directly.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use gax_shared::{Message, PresenceStatus, UserId};

use crate::error::{Result, TransportError};

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the push task.
#[derive(Debug)]
pub enum PushCommand {
    /// Send a JSON frame to the server.
    Send(Value),
    /// Close the socket and end the task.
    Shutdown,
}

/// Notifications sent *from* the push task to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum PushNotification {
    /// A message created elsewhere arrived.
    MessageReceived(Message),
    /// A user went online or offline.
    PresenceChanged {
        user_id: UserId,
        status: PresenceStatus,
    },
    /// The socket closed. No further notifications follow.
    Disconnected { reason: String },
}

/// Wire frame: `{"type": "...", "payload": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
enum PushFrame {
    Message(Message),
    Presence(PresencePayload),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresencePayload {
    user_id: UserId,
    status: PresenceStatus,
}

/// Configuration for opening the push channel.
pub struct PushConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Appended as the `token` query parameter when set.
    pub token: Option<String>,
    /// Capacity of both channels.
    pub buffer: usize,
}

impl PushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            buffer: 256,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| TransportError::Push(format!("invalid url {}: {e}", self.url)))?;
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// Decode one text frame. Unknown or malformed frames yield `None`.
pub fn parse_frame(text: &str) -> Option<PushNotification> {
    match serde_json::from_str::<PushFrame>(text) {
        Ok(PushFrame::Message(message)) => Some(PushNotification::MessageReceived(message)),
        Ok(PushFrame::Presence(p)) => Some(PushNotification::PresenceChanged {
            user_id: p.user_id,
            status: p.status,
        }),
        Err(e) => {
            debug!(error = %e, "ignoring push frame");
            None
        }
    }
}

/// Connect and spawn the push task.
///
/// Returns `(command_tx, notification_rx)`. Dropping the command sender also
/// shuts the task down.
pub async fn spawn_push_channel(
    config: PushConfig,
) -> Result<(mpsc::Sender<PushCommand>, mpsc::Receiver<PushNotification>)> {
    let url = config.endpoint()?;
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Push(e.to_string()))?;
    info!(host = url.host_str().unwrap_or_default(), "push channel connected");

    let (mut sink, mut stream) = socket.split();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<PushCommand>(config.buffer);
    let (notif_tx, notif_rx) = mpsc::channel::<PushNotification>(config.buffer);

    tokio::spawn(async move {
        let reason = loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(PushCommand::Send(value)) => {
                        if let Err(e) = sink.send(WsMessage::text(value.to_string())).await {
                            warn!(error = %e, "push send failed");
                            break e.to_string();
                        }
                    }
                    Some(PushCommand::Shutdown) | None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break "shutdown".to_string();
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(msg)) if msg.is_text() => {
                        let Some(notification) = msg.to_text().ok().and_then(parse_frame) else {
                            continue;
                        };
                        if notif_tx.send(notification).await.is_err() {
                            break "receiver dropped".to_string();
                        }
                    }
                    Some(Ok(msg)) if msg.is_close() => break "closed by server".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "push channel error");
                        break e.to_string();
                    }
                    None => break "stream ended".to_string(),
                },
            }
        };

        info!(%reason, "push channel closed");
        let _ = notif_tx.send(PushNotification::Disconnected { reason }).await;
    });

    Ok((cmd_tx, notif_rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;
    use gax_shared::DeliveryStatus;

    const MESSAGE_FRAME: &str = r#"{
        "type": "message",
        "payload": {
            "id": "m-9",
            "chatId": "c1",
            "senderId": "u2",
            "content": "ping",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "sent"
        }
    }"#;

    #[test]
    fn test_parse_message_frame() {
        match parse_frame(MESSAGE_FRAME) {
            Some(PushNotification::MessageReceived(m)) => {
                assert_eq!(m.id.as_str(), "m-9");
                assert_eq!(m.delivery_status, DeliveryStatus::Sent);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_presence_frame() {
        let frame = r#"{"type":"presence","payload":{"userId":"u2","status":"online"}}"#;
        assert_eq!(
            parse_frame(frame),
            Some(PushNotification::PresenceChanged {
                user_id: "u2".into(),
                status: PresenceStatus::Online,
            })
        );
    }

    #[test]
    fn test_unknown_frames_are_ignored() {
        assert_eq!(parse_frame(r#"{"type":"typing","payload":{}}"#), None);
        assert_eq!(parse_frame("not json"), None);
    }

    #[test]
    fn test_token_goes_in_query() {
        let config = PushConfig::new("ws://localhost:8080/ws").with_token(Some("a b".into()));
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "ws://localhost:8080/ws?token=a+b"
        );
        assert!(PushConfig::new("not a url").endpoint().is_err());
    }

    #[tokio::test]
    async fn test_channel_delivers_frames_and_reports_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(WsMessage::text("garbage".to_string())).await.unwrap();
            ws.send(WsMessage::text(MESSAGE_FRAME.to_string())).await.unwrap();
            // Wait for the client's frame before closing.
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        });

        let (cmd_tx, mut notif_rx) =
            spawn_push_channel(PushConfig::new(format!("ws://{addr}"))).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), notif_rx.recv())
            .await
            .unwrap();
        assert!(matches!(first, Some(PushNotification::MessageReceived(_))));

        cmd_tx
            .send(PushCommand::Send(serde_json::json!({ "type": "hello" })))
            .await
            .unwrap();

        let last = tokio::time::timeout(Duration::from_secs(2), notif_rx.recv())
            .await
            .unwrap();
        assert!(matches!(last, Some(PushNotification::Disconnected { .. })));
    }

    #[tokio::test]
    async fn test_wss_urls_go_through_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hang up before any TLS handshake completes.
            let (tcp, _) = listener.accept().await.unwrap();
            drop(tcp);
        });

        let err = spawn_push_channel(PushConfig::new(format!("wss://{addr}/ws")))
            .await
            .unwrap_err();
        match err {
            TransportError::Push(reason) => {
                assert!(!reason.contains("not compiled in"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_push_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = spawn_push_channel(PushConfig::new(format!("ws://{addr}")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Push(_)));
    }
}
