use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Missing request body")]
    MissingBody,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
