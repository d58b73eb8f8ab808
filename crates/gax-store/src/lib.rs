//! # gax-store
//!
//! Local state of the GAX client: the chat directory, per-chat message
//! sequences, and the persistence adapters they write through to.
//!
//! Persistence is best effort. Every in-memory mutation succeeds on its own;
//! a failed write is logged and the next mutation simply tries again with
//! the full state.

pub mod database;
pub mod directory;
pub mod memory;
pub mod messages;
pub mod migrations;
pub mod storage;

mod error;

pub use database::SqliteStorage;
pub use directory::ChatDirectory;
pub use error::{NotFound, Result, StorageError};
pub use memory::MemoryStorage;
pub use messages::{MessageStore, ReplaceOutcome};
pub use storage::{get_json, put_json, write_through, Persistence};
