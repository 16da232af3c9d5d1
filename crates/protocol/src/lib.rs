//! Cadenza Protocol - wire types shared with the media server
//!
//! This crate contains every type that crosses the WebSocket boundary:
//! - Wire message envelopes (CommandEnvelope, ServerMessage, ResultMessage)
//! - Server-pushed event types (EventMessage, EventType)
//! - Replicated entity types (Player, PlayerQueue, ProviderInstance, SyncTask)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **Field-presence classification** - The server does not tag its messages;
//!    inbound payloads are classified by which fields they carry. The
//!    `ServerMessage` enum encodes that classification order via
//!    `#[serde(untagged)]` variant ordering.

pub mod entities;
pub mod events;
pub mod messages;

// =============================================================================
// Wire Message Types
// =============================================================================
pub use messages::{CommandEnvelope, ResultMessage, ServerInfoMessage, ServerMessage};

// =============================================================================
// Events
// =============================================================================
pub use events::{EventMessage, EventType};

// =============================================================================
// Replicated Entities
// =============================================================================
pub use entities::{
    MediaType, Player, PlayerQueue, PlayerState, ProviderInstance, QueueOption, RepeatMode,
    SyncTask,
};
