//! Locally replicated server state
//!
//! The replica holds keyed collections of server-owned entities and keeps
//! them current by folding in server-pushed events. Merge rules, each
//! idempotent given repeated identical input:
//!
//! - *added* events insert, overwriting any entry with the same key
//! - *updated* events shallow-merge into the existing entry (or insert when
//!   the key is unknown)
//! - *delta* events update a single scalar and never create an entry, so a
//!   delta alone cannot produce a partial entity
//! - *bulk* events (providers, sync tasks) replace the whole collection
//!
//! Shallow merges happen on JSON object maps, so fields the server left out
//! of a partial update keep their previous values.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use cadenza_protocol::{
    EventMessage, EventType, Player, PlayerQueue, ProviderInstance, SyncTask,
};

/// Client-held copy of the server-owned entity collections.
#[derive(Debug, Default)]
pub(crate) struct StateReplica {
    players: HashMap<String, Player>,
    queues: HashMap<String, PlayerQueue>,
    providers: HashMap<String, ProviderInstance>,
    sync_tasks: Vec<SyncTask>,
}

impl StateReplica {
    /// Fold one server event into the replica.
    pub(crate) fn apply(&mut self, event: &EventMessage) {
        match event.event {
            EventType::PlayerAdded => {
                if let Some(player) = decode::<Player>(&event.data, "player_added") {
                    self.players.insert(player.player_id.clone(), player);
                }
            }
            EventType::PlayerUpdated => {
                upsert_merged(&mut self.players, &event.data, "player_updated", |p| {
                    p.player_id.clone()
                });
            }
            EventType::QueueAdded => {
                if let Some(queue) = decode::<PlayerQueue>(&event.data, "queue_added") {
                    self.queues.insert(queue.queue_id.clone(), queue);
                }
            }
            EventType::QueueUpdated => {
                upsert_merged(&mut self.queues, &event.data, "queue_updated", |q| {
                    q.queue_id.clone()
                });
            }
            EventType::QueueTimeUpdated => {
                // Scalar delta keyed by object_id; ignored for unknown queues.
                let Some(queue_id) = event.object_id.as_deref() else {
                    return;
                };
                let Some(elapsed) = event.data.as_f64() else {
                    return;
                };
                if let Some(queue) = self.queues.get_mut(queue_id) {
                    queue.elapsed_time = elapsed;
                }
            }
            EventType::ProvidersUpdated => {
                if let Some(providers) = decode::<Vec<ProviderInstance>>(
                    &event.data,
                    "providers_updated",
                ) {
                    self.providers = providers
                        .into_iter()
                        .map(|p| (p.instance_id.clone(), p))
                        .collect();
                }
            }
            EventType::SyncTasksUpdated => {
                if let Some(tasks) = decode::<Vec<SyncTask>>(&event.data, "sync_tasks_updated") {
                    self.sync_tasks = tasks;
                }
            }
            EventType::Unknown => {}
        }
    }

    // Resync merges use added semantics: overwrite per key, leave other
    // entries alone. This keeps resync commutative with live events.

    pub(crate) fn resync_players(&mut self, players: Vec<Player>) {
        for player in players {
            self.players.insert(player.player_id.clone(), player);
        }
    }

    pub(crate) fn resync_queues(&mut self, queues: Vec<PlayerQueue>) {
        for queue in queues {
            self.queues.insert(queue.queue_id.clone(), queue);
        }
    }

    pub(crate) fn resync_providers(&mut self, providers: Vec<ProviderInstance>) {
        for provider in providers {
            self.providers.insert(provider.instance_id.clone(), provider);
        }
    }

    pub(crate) fn resync_sync_tasks(&mut self, tasks: Vec<SyncTask>) {
        self.sync_tasks = tasks;
    }

    pub(crate) fn players(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    pub(crate) fn player(&self, player_id: &str) -> Option<Player> {
        self.players.get(player_id).cloned()
    }

    pub(crate) fn set_player_volume(&mut self, player_id: &str, volume_level: u32) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.volume_level = volume_level;
        }
    }

    pub(crate) fn set_player_muted(&mut self, player_id: &str, muted: bool) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.volume_muted = muted;
        }
    }

    pub(crate) fn queues(&self) -> Vec<PlayerQueue> {
        self.queues.values().cloned().collect()
    }

    pub(crate) fn queue(&self, queue_id: &str) -> Option<PlayerQueue> {
        self.queues.get(queue_id).cloned()
    }

    pub(crate) fn providers(&self) -> Vec<ProviderInstance> {
        self.providers.values().cloned().collect()
    }

    pub(crate) fn sync_tasks(&self) -> Vec<SyncTask> {
        self.sync_tasks.clone()
    }
}

fn decode<T: DeserializeOwned>(data: &Value, context: &str) -> Option<T> {
    match serde_json::from_value(data.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(event = context, error = %err, "dropping undecodable event payload");
            None
        }
    }
}

/// Shallow-merge `patch` into the existing entry for its key, inserting as
/// added when the key is unknown.
fn upsert_merged<T>(
    map: &mut HashMap<String, T>,
    patch: &Value,
    context: &str,
    key_of: impl Fn(&T) -> String,
) where
    T: Serialize + DeserializeOwned,
{
    let Some(incoming) = decode::<T>(patch, context) else {
        return;
    };
    let key = key_of(&incoming);
    match map.get_mut(&key) {
        Some(existing) => {
            if let Err(err) = shallow_merge(existing, patch) {
                tracing::warn!(event = context, error = %err, "merge failed, keeping prior state");
            }
        }
        None => {
            map.insert(key, incoming);
        }
    }
}

/// Field-level shallow merge: incoming fields overwrite, absent fields are
/// left untouched.
fn shallow_merge<T>(existing: &mut T, patch: &Value) -> Result<(), serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(patch_map) = patch else {
        return Ok(());
    };
    let mut base = serde_json::to_value(&*existing)?;
    if let Value::Object(base_map) = &mut base {
        for (key, value) in patch_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
    *existing = serde_json::from_value(base)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_protocol::{PlayerState, RepeatMode};
    use serde_json::json;

    fn event(event: EventType, object_id: Option<&str>, data: Value) -> EventMessage {
        EventMessage {
            event,
            object_id: object_id.map(String::from),
            data,
        }
    }

    fn full_player(id: &str) -> Value {
        json!({
            "player_id": id,
            "name": "Kitchen",
            "available": true,
            "powered": true,
            "state": "playing",
            "volume_level": 35,
            "volume_muted": false,
            "group_volume": 35,
            "active_queue": id,
        })
    }

    #[test]
    fn added_event_inserts_and_overwrites() {
        let mut replica = StateReplica::default();
        replica.apply(&event(EventType::PlayerAdded, None, full_player("p1")));
        assert_eq!(replica.player("p1").unwrap().name, "Kitchen");

        let mut changed = full_player("p1");
        changed["name"] = json!("Kitchen speaker");
        replica.apply(&event(EventType::PlayerAdded, None, changed));
        assert_eq!(replica.players().len(), 1);
        assert_eq!(replica.player("p1").unwrap().name, "Kitchen speaker");
    }

    #[test]
    fn updated_event_merges_shallowly_keeping_absent_fields() {
        let mut replica = StateReplica::default();
        replica.apply(&event(EventType::PlayerAdded, None, full_player("p1")));

        // Partial update: only the key and the changed fields.
        replica.apply(&event(
            EventType::PlayerUpdated,
            None,
            json!({"player_id": "p1", "volume_level": 80, "state": "paused"}),
        ));

        let player = replica.player("p1").unwrap();
        assert_eq!(player.volume_level, 80);
        assert_eq!(player.state, PlayerState::Paused);
        // Fields absent from the update retain their prior values.
        assert_eq!(player.name, "Kitchen");
        assert!(player.powered);
        assert_eq!(player.active_queue.as_deref(), Some("p1"));
    }

    #[test]
    fn updated_event_for_unknown_key_inserts_as_added() {
        let mut replica = StateReplica::default();
        replica.apply(&event(
            EventType::QueueUpdated,
            None,
            json!({"queue_id": "q1", "shuffle_enabled": true}),
        ));
        let queue = replica.queue("q1").unwrap();
        assert!(queue.shuffle_enabled);
        assert_eq!(queue.repeat_mode, RepeatMode::Off);
    }

    #[test]
    fn time_delta_updates_only_elapsed_time() {
        let mut replica = StateReplica::default();
        replica.apply(&event(
            EventType::QueueAdded,
            None,
            json!({"queue_id": "q1", "display_name": "Kitchen", "elapsed_time": 1.0}),
        ));

        replica.apply(&event(EventType::QueueTimeUpdated, Some("q1"), json!(42.5)));

        let queue = replica.queue("q1").unwrap();
        assert_eq!(queue.elapsed_time, 42.5);
        assert_eq!(queue.display_name, "Kitchen");
    }

    #[test]
    fn time_delta_for_unknown_key_never_creates_an_entry() {
        let mut replica = StateReplica::default();
        replica.apply(&event(
            EventType::QueueTimeUpdated,
            Some("ghost"),
            json!(12.0),
        ));
        assert!(replica.queue("ghost").is_none());
        assert!(replica.queues().is_empty());
    }

    #[test]
    fn providers_event_replaces_the_whole_collection() {
        let mut replica = StateReplica::default();
        replica.apply(&event(
            EventType::ProvidersUpdated,
            None,
            json!([{"instance_id": "spotify", "domain": "spotify"}]),
        ));
        assert_eq!(replica.providers().len(), 1);

        replica.apply(&event(
            EventType::ProvidersUpdated,
            None,
            json!([{"instance_id": "tunein", "domain": "tunein"}]),
        ));
        let providers = replica.providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].instance_id, "tunein");
    }

    #[test]
    fn sync_tasks_event_replaces_the_list() {
        let mut replica = StateReplica::default();
        replica.apply(&event(
            EventType::SyncTasksUpdated,
            None,
            json!([{"provider_instance": "spotify", "media_types": ["track", "album"]}]),
        ));
        assert_eq!(replica.sync_tasks().len(), 1);

        replica.apply(&event(EventType::SyncTasksUpdated, None, json!([])));
        assert!(replica.sync_tasks().is_empty());
    }

    #[test]
    fn merge_rules_are_idempotent() {
        let mut replica = StateReplica::default();
        let added = event(EventType::PlayerAdded, None, full_player("p1"));
        let updated = event(
            EventType::PlayerUpdated,
            None,
            json!({"player_id": "p1", "volume_level": 50}),
        );

        replica.apply(&added);
        replica.apply(&updated);
        let first = replica.player("p1").unwrap();
        replica.apply(&updated);
        assert_eq!(replica.player("p1").unwrap(), first);
    }

    #[test]
    fn undecodable_payload_leaves_state_untouched() {
        let mut replica = StateReplica::default();
        replica.apply(&event(EventType::PlayerAdded, None, json!("not an object")));
        assert!(replica.players().is_empty());
    }

    #[test]
    fn resync_merges_overwrite_without_clearing_other_keys() {
        let mut replica = StateReplica::default();
        replica.apply(&event(EventType::PlayerAdded, None, full_player("p1")));
        replica.apply(&event(EventType::PlayerAdded, None, full_player("p2")));

        let mut fetched: Player =
            serde_json::from_value(full_player("p1")).unwrap();
        fetched.name = "Renamed".into();
        replica.resync_players(vec![fetched]);

        assert_eq!(replica.players().len(), 2);
        assert_eq!(replica.player("p1").unwrap().name, "Renamed");
    }
}
