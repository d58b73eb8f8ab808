use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use gax_net::{spawn_push_channel, PushConfig, PushNotification};

use crate::error::Result;
use crate::session::Session;

/// Open the push channel configured for `session`, hand its command sender
/// to the session, and spawn the loop that applies notifications.
///
/// Returns `None` when no push URL is configured.
pub async fn start_push_bridge(session: Arc<Session>) -> Result<Option<JoinHandle<()>>> {
    let Some(url) = session.config().push_url.clone() else {
        debug!("no push url configured");
        return Ok(None);
    };

    let config = PushConfig::new(url).with_token(session.token());
    let (cmd_tx, notif_rx) = spawn_push_channel(config).await?;
    session.attach_push(cmd_tx);
    info!("push bridge started");

    Ok(Some(tokio::spawn(notification_loop(session, notif_rx))))
}

/// Apply notifications until the channel disconnects.
async fn notification_loop(session: Arc<Session>, mut notif_rx: mpsc::Receiver<PushNotification>) {
    while let Some(notification) = notif_rx.recv().await {
        let last = matches!(notification, PushNotification::Disconnected { .. });
        session.apply_push(notification);
        if last {
            break;
        }
    }
    debug!("push notification loop ended");
}
