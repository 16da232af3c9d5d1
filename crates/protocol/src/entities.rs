//! Replicated entity types
//!
//! These are the server-owned entities the client keeps a local replica of.
//! Every entity is keyed by a stable server-assigned identifier. The server
//! may send partial objects in update events; fields are defaulted here so a
//! partial payload still deserializes, and the replica's JSON-level merge
//! ensures fields absent from an update retain their previous values.

use serde::{Deserialize, Serialize};

/// Playback state of a player or queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    Idle,
    Paused,
    Playing,
    Off,
}

/// Repeat setting of a player queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// How media should be enqueued by a `play_media` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOption {
    Play,
    Replace,
    Next,
    Add,
}

/// Media item categories known to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Artist,
    Album,
    Track,
    Playlist,
    Radio,
    #[serde(other)]
    Unknown,
}

/// A playback endpoint registered with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub powered: bool,
    #[serde(default)]
    pub state: PlayerState,
    #[serde(default)]
    pub volume_level: u32,
    #[serde(default)]
    pub volume_muted: bool,
    /// Average volume across group members, for group players.
    #[serde(default)]
    pub group_volume: u32,
    /// Queue currently feeding this player, if any.
    #[serde(default)]
    pub active_queue: Option<String>,
}

/// The play queue attached to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerQueue {
    pub queue_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub state: PlayerState,
    #[serde(default)]
    pub shuffle_enabled: bool,
    #[serde(default)]
    pub crossfade_enabled: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    /// Seconds into the currently playing item. Updated by a high-frequency
    /// delta event rather than full queue updates.
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default)]
    pub current_index: Option<u32>,
}

/// A configured instance of a media provider on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInstance {
    pub instance_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available: bool,
}

/// A running library sync job on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    #[serde(default)]
    pub provider_instance: String,
    #[serde(default)]
    pub media_types: Vec<MediaType>,
}
