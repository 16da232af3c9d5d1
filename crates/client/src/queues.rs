//! Queue control and playback commands

use std::sync::Arc;

use serde_json::{json, Value};

use cadenza_protocol::{PlayerQueue, QueueOption, RepeatMode};

use crate::client::{command_args, CadenzaClient};
use crate::error::ClientError;
use crate::throttle::ThrottleKey;

const QUEUE_COMMAND_FAMILY: &str = "players/queue";

/// Seconds skipped by the skip-ahead/skip-back helpers.
const SKIP_SECONDS: i64 = 10;

impl CadenzaClient {
    /// Fetch the complete current queue list from the server.
    pub async fn get_player_queues(&self) -> Result<Vec<PlayerQueue>, ClientError> {
        self.invoke_as("players/queue/all", None).await
    }

    /// Fetch the items of one queue. Item payloads are passed through
    /// undecoded; the replica does not track queue contents.
    pub async fn get_player_queue_items(&self, queue_id: &str) -> Result<Value, ClientError> {
        self.invoke(
            "players/queue/items",
            command_args(json!({"queue_id": queue_id})),
        )
        .await
    }

    /// Issue a queue command, debounced per queue. Same coalescing rules as
    /// [`player_command`](Self::player_command).
    pub fn queue_command(
        &self,
        queue_id: &str,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) {
        let mut full_args = args.unwrap_or_default();
        full_args.insert("queue_id".into(), json!(queue_id));
        self.inner.throttler.submit(
            Arc::clone(&self.inner),
            ThrottleKey {
                family: QUEUE_COMMAND_FAMILY,
                target: queue_id.to_string(),
            },
            format!("{QUEUE_COMMAND_FAMILY}/{command}"),
            Some(full_args),
        );
    }

    pub fn queue_command_play(&self, queue_id: &str) {
        self.queue_command(queue_id, "play", None);
    }

    pub fn queue_command_pause(&self, queue_id: &str) {
        self.queue_command(queue_id, "pause", None);
    }

    pub fn queue_command_play_pause(&self, queue_id: &str) {
        self.queue_command(queue_id, "play_pause", None);
    }

    pub fn queue_command_stop(&self, queue_id: &str) {
        self.queue_command(queue_id, "stop", None);
    }

    pub fn queue_command_next(&self, queue_id: &str) {
        self.queue_command(queue_id, "next", None);
    }

    pub fn queue_command_previous(&self, queue_id: &str) {
        self.queue_command(queue_id, "previous", None);
    }

    pub fn queue_command_clear(&self, queue_id: &str) {
        self.queue_command(queue_id, "clear", None);
    }

    /// Start playback at a specific queue index.
    pub fn queue_command_play_index(&self, queue_id: &str, index: u32) {
        self.queue_command(queue_id, "play_index", command_args(json!({"index": index})));
    }

    /// Seek to an absolute position (seconds) in the current item.
    pub fn queue_command_seek(&self, queue_id: &str, position: u64) {
        self.queue_command(queue_id, "seek", command_args(json!({"position": position})));
    }

    /// Skip relative to the current position; negative values skip back.
    pub fn queue_command_skip(&self, queue_id: &str, seconds: i64) {
        self.queue_command(queue_id, "skip", command_args(json!({"seconds": seconds})));
    }

    pub fn queue_command_skip_ahead(&self, queue_id: &str) {
        self.queue_command_skip(queue_id, SKIP_SECONDS);
    }

    pub fn queue_command_skip_back(&self, queue_id: &str) {
        self.queue_command_skip(queue_id, -SKIP_SECONDS);
    }

    pub fn queue_command_shuffle(&self, queue_id: &str, shuffle_enabled: bool) {
        self.queue_command(
            queue_id,
            "shuffle",
            command_args(json!({"shuffle_enabled": shuffle_enabled})),
        );
    }

    /// Flip shuffle based on the replica's view of the queue.
    pub fn queue_command_shuffle_toggle(&self, queue_id: &str) {
        if let Some(queue) = self.queue(queue_id) {
            self.queue_command_shuffle(queue_id, !queue.shuffle_enabled);
        }
    }

    pub fn queue_command_repeat(&self, queue_id: &str, repeat_mode: RepeatMode) {
        self.queue_command(
            queue_id,
            "repeat",
            command_args(json!({"repeat_mode": repeat_mode})),
        );
    }

    /// Cycle the repeat mode: off, then one, then all, then off again.
    pub fn queue_command_repeat_toggle(&self, queue_id: &str) {
        if let Some(queue) = self.queue(queue_id) {
            let next = match queue.repeat_mode {
                RepeatMode::Off => RepeatMode::One,
                RepeatMode::One => RepeatMode::All,
                RepeatMode::All => RepeatMode::Off,
            };
            self.queue_command_repeat(queue_id, next);
        }
    }

    pub fn queue_command_crossfade(&self, queue_id: &str, crossfade_enabled: bool) {
        self.queue_command(
            queue_id,
            "crossfade",
            command_args(json!({"crossfade_enabled": crossfade_enabled})),
        );
    }

    pub fn queue_command_crossfade_toggle(&self, queue_id: &str) {
        if let Some(queue) = self.queue(queue_id) {
            self.queue_command_crossfade(queue_id, !queue.crossfade_enabled);
        }
    }

    /// Move a queue item up or down by `pos_shift` slots; `0` moves it to
    /// the position right after the currently playing item.
    pub fn queue_command_move_item(&self, queue_id: &str, queue_item_id: &str, pos_shift: i64) {
        self.queue_command(
            queue_id,
            "move_item",
            command_args(json!({"queue_item_id": queue_item_id, "pos_shift": pos_shift})),
        );
    }

    pub fn queue_command_move_up(&self, queue_id: &str, queue_item_id: &str) {
        self.queue_command_move_item(queue_id, queue_item_id, -1);
    }

    pub fn queue_command_move_down(&self, queue_id: &str, queue_item_id: &str) {
        self.queue_command_move_item(queue_id, queue_item_id, 1);
    }

    pub fn queue_command_move_next(&self, queue_id: &str, queue_item_id: &str) {
        self.queue_command_move_item(queue_id, queue_item_id, 0);
    }

    pub fn queue_command_delete(&self, queue_id: &str, queue_item_id: &str) {
        self.queue_command(
            queue_id,
            "delete_item",
            command_args(json!({"queue_item_id": queue_item_id})),
        );
    }

    /// Enqueue media for playback. Not debounced: every play request must
    /// reach the server.
    ///
    /// `media` is one or more library item URIs or full item payloads, as
    /// the server accepts them.
    pub fn play_media(
        &self,
        queue_id: &str,
        media: Value,
        option: Option<QueueOption>,
        radio_mode: Option<bool>,
    ) -> Result<(), ClientError> {
        self.send(
            "players/queue/play_media",
            command_args(json!({
                "queue_id": queue_id,
                "media": media,
                "option": option,
                "radio_mode": radio_mode,
            })),
        )
    }
}
