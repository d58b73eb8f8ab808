use thiserror::Error;

use gax_shared::ProtocolError;

/// Every way a backend round-trip can fail.
///
/// Both gateway variants map failures onto this one type, so callers handle
/// mock and real backends identically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The backend answered but refused (`"success": false`).
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Mock gateway configured to behave as unreachable.
    #[error("Backend unreachable")]
    Offline,

    #[error("Push channel error: {0}")]
    Push(String),
}

impl From<ProtocolError> for TransportError {
    fn from(e: ProtocolError) -> Self {
        Self::Malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
