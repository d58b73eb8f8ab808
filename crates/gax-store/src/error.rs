use thiserror::Error;

/// Errors produced by a persistence adapter.
///
/// Callers in this crate never propagate these: a failed write-through is
/// logged and the in-memory state stays authoritative.
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The serialized value is larger than the adapter accepts.
    #[error("Storage quota exceeded for key {key}: {size} bytes (limit {quota})")]
    QuotaExceeded {
        key: String,
        size: usize,
        quota: usize,
    },

    /// The backing storage cannot be used at all.
    #[error("Storage unavailable")]
    Unavailable,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Value could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// An operation referenced an id absent from the in-memory model.
///
/// Directory and message-store operations absorb this and turn into no-ops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} not found: {id}")]
pub struct NotFound {
    pub kind: &'static str,
    pub id: String,
}

impl NotFound {
    pub fn chat(id: impl std::fmt::Display) -> Self {
        Self {
            kind: "chat",
            id: id.to_string(),
        }
    }

    pub fn message(id: impl std::fmt::Display) -> Self {
        Self {
            kind: "message",
            id: id.to_string(),
        }
    }
}
