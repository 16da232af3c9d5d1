//! Client error types

/// Errors surfaced by the client.
///
/// None of these are fatal to the session: a failed `invoke` leaves the
/// connection and the replica untouched, and transport failures are handled
/// internally by the reconnect loop.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// `connect` was called on a client that is already running.
    #[error("client is already connected or connecting")]
    AlreadyConnected,

    /// A command was issued while the session is not in the Connected state.
    ///
    /// Commands are never queued; callers are expected to retry once the
    /// state observer reports Connected.
    #[error("not connected to the server")]
    NotConnected,

    /// The connection dropped while a command was in flight. The command may
    /// or may not have been executed by the server.
    #[error("connection lost")]
    ConnectionLost,

    /// The server reported a command failure.
    #[error("command failed: {}", details.as_deref().unwrap_or(error_code))]
    Command {
        error_code: String,
        details: Option<String>,
    },

    /// The configured base URL could not be turned into a WebSocket endpoint.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// The outbound message could not be handed to the transport.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A payload could not be serialized or a result could not be decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
