use thiserror::Error;

use gax_net::TransportError;
use gax_store::StorageError;

/// Errors surfaced to whoever drives a [`Session`](crate::Session).
///
/// Flows that have a local fallback absorb transport failures and raise a
/// notice instead; these variants reach the caller only where no fallback
/// exists.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No chat selected")]
    NoActiveChat,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
