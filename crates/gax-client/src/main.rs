use std::sync::Arc;

use anyhow::Context;

use gax_client::{open_storage, start_push_bridge, ClientConfig, Session, TracingSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gax_client::init_tracing();

    let config = ClientConfig::from_env();
    tracing::info!(mock = config.mock, api = %config.api_url, "Starting GAX client");

    let storage = open_storage(&config);
    let session = Arc::new(
        Session::new(config, storage, Arc::new(TracingSink)).context("failed to start session")?,
    );

    if !session.restore() {
        session
            .sign_up("demo", "demo@example.com")
            .await
            .context("sign-up failed")?;
    }
    session.load_initial_data().await?;

    if let Err(e) = start_push_bridge(session.clone()).await {
        tracing::warn!(error = %e, "push channel unavailable");
    }

    for chat in session.chats() {
        println!(
            "{:<12} {:<20} {:>3} unread  {}",
            chat.id.as_str(),
            chat.display_name,
            chat.unread_count,
            chat.last_message_preview
        );
    }

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !text.trim().is_empty() {
        let message = session.send_message(&text).await?;
        println!("{} -> {:?}", message.id, message.delivery_status);
    }

    session.stop_push();
    Ok(())
}
