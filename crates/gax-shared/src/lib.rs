// Entities, identifiers and wire payloads shared by every GAX client crate.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use models::{Chat, Message, MessagePatch, User};
pub use types::{ChatId, ChatKind, DeliveryStatus, MessageId, MessageKind, PresenceStatus, UserId};
