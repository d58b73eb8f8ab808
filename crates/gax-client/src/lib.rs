//! # gax-client
//!
//! Client core of GAX Messenger: a [`Session`] owns the chat directory and
//! message store of the signed-in user, talks to the backend through the
//! gateway picked at construction, and reports changes to a [`RenderSink`].

pub mod bridge;
pub mod commands;
pub mod config;
pub mod events;
pub mod session;
pub mod state;

mod error;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use gax_store::{MemoryStorage, Persistence, SqliteStorage};

pub use bridge::start_push_bridge;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{Notice, NoticeLevel, NullSink, RenderSink, TracingSink};
pub use gax_shared::protocol::ProfileUpdate;
pub use session::{build_gateway, Session};
pub use state::{ChatState, SharedState, StateView};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gax_client=debug,gax_net=debug,gax_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Open the storage described by `config`.
///
/// Falls back to in-memory storage when the database cannot be opened, so
/// the session still runs, just without durability.
pub fn open_storage(config: &ClientConfig) -> Arc<dyn Persistence> {
    let opened = match &config.data_dir {
        Some(dir) => SqliteStorage::open_in(dir),
        None => SqliteStorage::open_default(),
    };

    match opened {
        Ok(storage) => Arc::new(storage.with_quota(config.storage_quota)),
        Err(e) => {
            tracing::warn!(error = %e, "could not open database, keeping data in memory");
            let memory = MemoryStorage::new();
            match config.storage_quota {
                Some(quota) => Arc::new(memory.with_quota(quota)),
                None => Arc::new(memory),
            }
        }
    }
}
