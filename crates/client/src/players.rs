//! Player control commands

use std::sync::Arc;

use serde_json::{json, Value};

use cadenza_protocol::Player;

use crate::client::{command_args, CadenzaClient};
use crate::error::ClientError;
use crate::throttle::ThrottleKey;

const PLAYER_COMMAND_FAMILY: &str = "players/cmd";

/// Step size for the relative volume helpers.
const VOLUME_STEP: u32 = 5;

impl CadenzaClient {
    /// Fetch the complete current player list from the server.
    pub async fn get_players(&self) -> Result<Vec<Player>, ClientError> {
        self.invoke_as("players/all", None).await
    }

    /// Issue a player command, debounced per player.
    ///
    /// Rapid repeated calls for the same player coalesce: only the most
    /// recent command within the debounce window is transmitted. Commands
    /// for different players never cancel each other.
    pub fn player_command(
        &self,
        player_id: &str,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) {
        let mut full_args = args.unwrap_or_default();
        full_args.insert("player_id".into(), json!(player_id));
        self.inner.throttler.submit(
            Arc::clone(&self.inner),
            ThrottleKey {
                family: PLAYER_COMMAND_FAMILY,
                target: player_id.to_string(),
            },
            format!("{PLAYER_COMMAND_FAMILY}/{command}"),
            Some(full_args),
        );
    }

    pub fn player_command_power(&self, player_id: &str, powered: bool) {
        self.player_command(player_id, "power", command_args(json!({"powered": powered})));
    }

    /// Set the absolute volume, clamped to 0..=100.
    ///
    /// The replica is updated immediately so a bound volume slider tracks
    /// the user instead of the (debounced) server echo.
    pub fn player_command_volume_set(&self, player_id: &str, volume_level: u32) {
        let volume_level = volume_level.min(100);
        self.player_command(
            player_id,
            "volume_set",
            command_args(json!({"volume_level": volume_level})),
        );
        self.inner
            .write_replica(|r| r.set_player_volume(player_id, volume_level));
    }

    pub fn player_command_volume_up(&self, player_id: &str) {
        if let Some(player) = self.player(player_id) {
            self.player_command_volume_set(player_id, player.volume_level.saturating_add(VOLUME_STEP));
        }
    }

    pub fn player_command_volume_down(&self, player_id: &str) {
        if let Some(player) = self.player(player_id) {
            self.player_command_volume_set(player_id, player.volume_level.saturating_sub(VOLUME_STEP));
        }
    }

    pub fn player_command_volume_mute(&self, player_id: &str, muted: bool) {
        self.player_command(player_id, "volume_mute", command_args(json!({"muted": muted})));
        self.inner
            .write_replica(|r| r.set_player_muted(player_id, muted));
    }

    /// Set the volume of a player group as a whole.
    pub fn player_command_group_volume(&self, player_id: &str, volume_level: u32) {
        let volume_level = volume_level.min(100);
        self.player_command(
            player_id,
            "group_volume",
            command_args(json!({"volume_level": volume_level})),
        );
    }

    /// Join `player_id` to the group led by `target_player`.
    pub fn player_command_sync(&self, player_id: &str, target_player: &str) {
        self.player_command(
            player_id,
            "sync",
            command_args(json!({"target_player": target_player})),
        );
    }

    /// Remove `player_id` from whatever group it is part of.
    pub fn player_command_unsync(&self, player_id: &str) {
        self.player_command(player_id, "unsync", None);
    }
}
