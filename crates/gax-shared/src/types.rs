use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{PROVISIONAL_ID_PREFIX, SYSTEM_SENDER};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Opaque user identifier issued by the backend (or fabricated in demo mode).
    UserId
);

string_id!(
    /// Opaque, stable chat identifier. Unique within the chat directory.
    ChatId
);

string_id!(
    /// Message identifier. Either provisional (client-generated) or server-issued.
    MessageId
);

impl UserId {
    /// The reserved sender of system-generated messages.
    pub fn system() -> Self {
        Self(SYSTEM_SENDER.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER
    }
}

impl MessageId {
    /// Generate a fresh client-side id for a message not yet acknowledged.
    pub fn provisional() -> Self {
        Self(format!("{PROVISIONAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_ID_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
}

/// Delivery state of a message.
///
/// `Pending -> Sent` on acknowledgment, `Pending -> Failed` on transport
/// failure or negative acknowledgment. `Failed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[serde(alias = "sending")]
    Pending,
    #[serde(alias = "read")]
    Sent,
    #[serde(alias = "error")]
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (Self::Pending, _) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}
