//! WebSocket message types for the server connection
//!
//! The server does not wrap its messages in a tagged envelope; the three
//! inbound message kinds are told apart by which fields are present:
//!
//! - an `event` field marks a server-pushed [`EventMessage`]
//! - a `server_version` field marks the [`ServerInfoMessage`] hello
//! - a bare `message_id` marks a [`ResultMessage`] for an earlier command
//!
//! `ServerMessage` encodes that classification order through its
//! `#[serde(untagged)]` variant ordering: event first, then hello, then
//! result. Payloads that match none of the shapes fail deserialization and
//! are dropped by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::EventMessage;

// =============================================================================
// Outbound (client -> server)
// =============================================================================

/// A command sent to the server.
///
/// `message_id` correlates the eventual result; ids are unique and strictly
/// increasing for one client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command: String,
    pub message_id: u64,
    /// Keyword arguments for the command; omitted entirely when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Map<String, Value>>,
}

// =============================================================================
// Inbound (server -> client)
// =============================================================================

/// Any message the server can push down the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Server-pushed event, not correlated to any request.
    Event(EventMessage),
    /// Hello sent once, immediately after the transport opens.
    ServerInfo(ServerInfoMessage),
    /// Result for a previously sent command.
    Result(ResultMessage),
}

/// First message sent by the server after the transport opens.
///
/// Its arrival is the signal that the server is ready to serve commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfoMessage {
    pub server_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

/// Result of a command, correlated by `message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultMessage {
    // Error first: distinguished from Success by the required `error_code`.
    Error {
        message_id: u64,
        error_code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Success {
        message_id: u64,
        #[serde(default)]
        result: Value,
    },
}

impl ResultMessage {
    /// The id of the command this result belongs to.
    pub fn message_id(&self) -> u64 {
        match self {
            ResultMessage::Error { message_id, .. } => *message_id,
            ResultMessage::Success { message_id, .. } => *message_id,
        }
    }
}
