// Backend synchronization layer: request/response gateways and server push.

pub mod api;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mock;
pub mod push;

pub use error::{Result, TransportError};
pub use gateway::{call, LocalView, SyncGateway};
pub use http::HttpGateway;
pub use mock::{demo_chats, demo_messages, MockGateway};
pub use push::{spawn_push_channel, PushCommand, PushConfig, PushNotification};
