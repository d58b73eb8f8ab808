/// Application name
pub const APP_NAME: &str = "GAX Messenger";

/// Default backend base URL (api gateway)
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Namespace owned by this client inside a shared key-value storage
pub const STORAGE_NAMESPACE: &str = "gax";

/// Persisted chat directory (ordered list of chats)
pub const KEY_CHATS: &str = "gax_chats";

/// Persisted per-chat message mapping
pub const KEY_MESSAGES: &str = "gax_messages";

/// Persisted signed-in user
pub const KEY_USER: &str = "gax_user";

/// Persisted bearer token
pub const KEY_TOKEN: &str = "gax_token";

/// Reserved sender id for system-generated messages
pub const SYSTEM_SENDER: &str = "system";

/// Prefix of client-generated message ids awaiting acknowledgment
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

/// Request timeout before a call is treated as a transport failure
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Artificial latency applied by the mock gateway
pub const DEFAULT_MOCK_LATENCY_MS: u64 = 100;

/// Lifetime of an online presence marker on the backend, in seconds
pub const ONLINE_TTL_SECS: u64 = 3600;

/// Shortest accepted username at registration
pub const MIN_USERNAME_LEN: usize = 3;

/// Shortest accepted password at registration
pub const MIN_PASSWORD_LEN: usize = 6;
