/// Errors surfaced by the client's fallible setup paths.
///
/// Connection-time failures never reach callers of the client API; they
/// are logged and handled by the reconnect supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The page origin could not be turned into a WebSocket URL.
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// An environment variable held an unusable value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
