//! Throttled command coalescing
//!
//! Continuous controls (volume and seek sliders especially) fire the same
//! command class many times per second. Each throttle key gets at most one
//! scheduled send: a new submission cancels the pending one and reschedules,
//! so only the most recent arguments within the debounce window are ever
//! transmitted. Earlier calls are dropped entirely, not queued or merged.
//!
//! Keys pair the command family with the target entity id, so throttling a
//! volume change on one player never cancels a pending change on another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::ClientInner;

/// Trailing-edge debounce window.
pub(crate) const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// One throttled call site: a command family applied to one target entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ThrottleKey {
    pub(crate) family: &'static str,
    pub(crate) target: String,
}

pub(crate) struct CommandThrottler {
    window: Duration,
    scheduled: Mutex<HashMap<ThrottleKey, JoinHandle<()>>>,
}

impl Default for CommandThrottler {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl CommandThrottler {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            scheduled: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `command` to be sent after the debounce window, cancelling
    /// any send already scheduled for the same key.
    ///
    /// If the session is not Connected when the timer fires, the command is
    /// dropped with a log line; throttled commands are lossy by design.
    pub(crate) fn submit(
        &self,
        inner: Arc<ClientInner>,
        key: ThrottleKey,
        command: String,
        args: Option<serde_json::Map<String, Value>>,
    ) {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(err) = inner.send(&command, args) {
                tracing::debug!(command, error = %err, "throttled command dropped");
            }
        });

        let mut scheduled = self
            .scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A fired task leaves its finished handle behind; aborting a
        // finished handle is a no-op.
        if let Some(previous) = scheduled.insert(key, handle) {
            previous.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{command_args, test_client_connected};
    use serde_json::json;

    fn volume_key(player_id: &str) -> ThrottleKey {
        ThrottleKey {
            family: "players/cmd",
            target: player_id.to_string(),
        }
    }

    #[tokio::test]
    async fn rapid_calls_coalesce_to_the_last_one() {
        let (client, mut outbound) = test_client_connected();
        let throttler = CommandThrottler::new(Duration::from_millis(40));

        for volume in [10, 20, 30] {
            throttler.submit(
                Arc::clone(&client.inner),
                volume_key("p1"),
                "players/cmd/volume_set".into(),
                command_args(json!({"player_id": "p1", "volume_level": volume})),
            );
        }

        tokio::time::sleep(Duration::from_millis(120)).await;

        let envelope = outbound.try_recv().expect("one send expected");
        assert_eq!(envelope.command, "players/cmd/volume_set");
        let args = envelope.args.expect("args expected");
        assert_eq!(args["volume_level"], json!(30));
        // Exactly one message: the two earlier calls were dropped.
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn distinct_targets_do_not_cancel_each_other() {
        let (client, mut outbound) = test_client_connected();
        let throttler = CommandThrottler::new(Duration::from_millis(40));

        for player_id in ["p1", "p2"] {
            throttler.submit(
                Arc::clone(&client.inner),
                volume_key(player_id),
                "players/cmd/volume_set".into(),
                command_args(json!({"player_id": player_id, "volume_level": 50})),
            );
        }

        tokio::time::sleep(Duration::from_millis(120)).await;

        let first = outbound.try_recv().expect("first send expected");
        let second = outbound.try_recv().expect("second send expected");
        let mut targets: Vec<String> = [first, second]
            .iter()
            .map(|e| {
                e.args.as_ref().expect("args")["player_id"]
                    .as_str()
                    .expect("player_id")
                    .to_string()
            })
            .collect();
        targets.sort();
        assert_eq!(targets, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn resubmission_restarts_the_window() {
        let (client, mut outbound) = test_client_connected();
        let throttler = CommandThrottler::new(Duration::from_millis(60));

        throttler.submit(
            Arc::clone(&client.inner),
            volume_key("p1"),
            "players/cmd/volume_set".into(),
            command_args(json!({"player_id": "p1", "volume_level": 10})),
        );
        // Resubmit just before the window elapses.
        tokio::time::sleep(Duration::from_millis(40)).await;
        throttler.submit(
            Arc::clone(&client.inner),
            volume_key("p1"),
            "players/cmd/volume_set".into(),
            command_args(json!({"player_id": "p1", "volume_level": 20})),
        );

        // Original deadline passes without a send.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(outbound.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let envelope = outbound.try_recv().expect("rescheduled send expected");
        assert_eq!(
            envelope.args.expect("args")["volume_level"],
            json!(20)
        );
    }
}
