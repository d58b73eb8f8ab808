//! The persistence adapter contract.
//!
//! A [`Persistence`] implementation stores JSON documents under string keys
//! inside a namespace it owns. `put` followed by `get` on the same key yields
//! a value deeply equal to the input; `clear` only ever drops keys of the
//! adapter's own namespace.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, StorageError};

/// Key-value storage of JSON documents.
pub trait Persistence: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Drop a single key. Absent keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Drop every key owned by this adapter.
    fn clear(&self) -> Result<()>;
}

/// Serialize `value` and store it under `key`.
pub fn put_json<T: Serialize + ?Sized>(
    storage: &dyn Persistence,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)?;
    storage.put(key, &value)
}

/// Load and deserialize the value under `key`.
pub fn get_json<T: DeserializeOwned>(storage: &dyn Persistence, key: &str) -> Result<Option<T>> {
    match storage.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Best-effort write of in-memory state.
///
/// Returns whether the write landed. A failure is logged and swallowed.
pub fn write_through<T: Serialize + ?Sized>(storage: &dyn Persistence, key: &str, value: &T) -> bool {
    match put_json(storage, key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, error = %e, "write-through failed, keeping in-memory state");
            false
        }
    }
}

/// Encode a document as the text actually kept by the adapters.
pub(crate) fn encode(key: &str, value: &Value, quota: Option<usize>) -> Result<String> {
    let text = serde_json::to_string(value)?;
    if let Some(quota) = quota {
        if text.len() > quota {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                size: text.len(),
                quota,
            });
        }
    }
    Ok(text)
}

pub(crate) fn decode(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}
