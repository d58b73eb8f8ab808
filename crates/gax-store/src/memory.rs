//! In-process storage, used for tests and for sessions that should leave
//! nothing on disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use gax_shared::constants::STORAGE_NAMESPACE;

use crate::error::{Result, StorageError};
use crate::storage::{decode, encode, Persistence};

type Entries = HashMap<(String, String), String>;

/// Namespaced key-value map held in memory.
///
/// Several adapters can share one backing map (see [`MemoryStorage::sharing`]),
/// which models a browser storage area used by unrelated subsystems.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    namespace: String,
    entries: Arc<Mutex<Entries>>,
    quota: Option<usize>,
    available: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_namespace(STORAGE_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Arc::new(Mutex::new(HashMap::new())),
            quota: None,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Another adapter over the same backing map, owning `namespace`.
    pub fn sharing(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Arc::clone(&self.entries),
            quota: self.quota,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reject values whose JSON text exceeds `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Simulate storage being switched off (private browsing, disk gone).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of keys owned by this adapter.
    pub fn len(&self) -> usize {
        self.entries()
            .keys()
            .filter(|(ns, _)| *ns == self.namespace)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn slot(&self, key: &str) -> (String, String) {
        (self.namespace.clone(), key.to_string())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for MemoryStorage {
    fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.check_available()?;
        let text = encode(key, value, self.quota)?;
        self.entries().insert(self.slot(key), text);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_available()?;
        let text = self.entries().get(&self.slot(key)).cloned();
        text.as_deref().map(decode).transpose()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries().remove(&self.slot(key));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_available()?;
        let namespace = &self.namespace;
        self.entries().retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}
