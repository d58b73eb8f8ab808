//! SQLite-backed persistence adapter.
//!
//! The [`SqliteStorage`] struct owns a [`rusqlite::Connection`] and guarantees
//! that migrations are run before any other operation. Documents live in a
//! single `kv` table keyed by `(namespace, key)`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use gax_shared::constants::STORAGE_NAMESPACE;

use crate::error::{Result, StorageError};
use crate::migrations;
use crate::storage::{decode, encode, Persistence};

const DB_FILE_NAME: &str = "gax.db";

/// Durable [`Persistence`] adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    namespace: String,
    quota: Option<usize>,
}

impl SqliteStorage {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/gax-messenger/gax.db`
    /// - macOS:   `~/Library/Application Support/com.gax.gax-messenger/gax.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\gax\gax-messenger\data\gax.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "gax", "gax-messenger").ok_or(StorageError::NoDataDir)?;
        Self::open_in(project_dirs.data_dir())
    }

    /// Open (or create) `gax.db` inside `dir`, creating the directory if needed.
    pub fn open_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(DB_FILE_NAME);
        tracing::info!(path = %db_path.display(), "opening storage");
        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A throwaway database that lives as long as this value.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            namespace: STORAGE_NAMESPACE.to_string(),
            quota: None,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Reject values whose JSON text exceeds `bytes`. `None` disables the cap.
    pub fn with_quota(mut self, bytes: Option<usize>) -> Self {
        self.quota = bytes;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn().path().filter(|p| !p.is_empty()).map(PathBuf::from)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Persistence for SqliteStorage {
    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let text = encode(key, value, self.quota)?;
        self.conn().execute(
            "INSERT INTO kv (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.namespace, key, text, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        text.as_deref().map(decode).transpose()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self
            .conn()
            .execute("DELETE FROM kv WHERE namespace = ?1", params![self.namespace])?;
        tracing::debug!(namespace = %self.namespace, removed, "cleared storage namespace");
        Ok(())
    }
}
