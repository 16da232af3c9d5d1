//! Server-pushed event types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tag carried by every [`EventMessage`].
///
/// Unknown tags from newer servers deserialize as [`EventType::Unknown`] so a
/// new event cannot break message classification for older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PlayerAdded,
    PlayerUpdated,
    QueueAdded,
    QueueUpdated,
    QueueTimeUpdated,
    ProvidersUpdated,
    SyncTasksUpdated,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::PlayerAdded => "player_added",
            EventType::PlayerUpdated => "player_updated",
            EventType::QueueAdded => "queue_added",
            EventType::QueueUpdated => "queue_updated",
            EventType::QueueTimeUpdated => "queue_time_updated",
            EventType::ProvidersUpdated => "providers_updated",
            EventType::SyncTasksUpdated => "sync_tasks_updated",
            EventType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An unsolicited server-pushed notification of a state change.
///
/// Not correlated to any request; broadcast to all matching subscribers and,
/// for the event types the replica understands, folded into the local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: EventType,
    /// Identifier of the entity this event concerns, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}
