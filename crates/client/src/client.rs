//! Client facade and shared session internals
//!
//! [`CadenzaClient`] is an explicit session object with a caller-controlled
//! lifecycle: construct, `connect`, use, `disconnect`. There is no ambient
//! global; cloning the client is cheap and every clone shares the same
//! session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};
use url::Url;

use cadenza_protocol::{CommandEnvelope, ServerInfoMessage};

use crate::commands::{CommandIds, PendingCommands};
use crate::connection::{ConnectionState, ConnectionStateObserver};
use crate::error::ClientError;
use crate::events::{EventFilter, EventRouter, SubscriptionHandle};
use crate::replica::StateReplica;
use crate::session;
use crate::throttle::CommandThrottler;

use cadenza_protocol::{EventMessage, Player, PlayerQueue, ProviderInstance, SyncTask};

/// Fixed path suffix appended to the derived WebSocket endpoint.
const WS_PATH_SUFFIX: &str = "/ws";

/// Session manager for one media server.
///
/// Owns a persistent, auto-reconnecting WebSocket connection, correlates
/// command results with the requests that produced them, broadcasts
/// server-pushed events to subscribers, and keeps a local replica of the
/// server-owned players, queues, providers and sync tasks.
#[derive(Clone)]
pub struct CadenzaClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl CadenzaClient {
    /// Create a client for the server at `base_url` (e.g.
    /// `http://music.local:8095`). No connection is made until
    /// [`connect`](Self::connect) is called.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: ClientInner::new(base_url),
        }
    }

    /// Start the session: open the transport and keep it open, reconnecting
    /// with linear backoff whenever it drops.
    ///
    /// Returns immediately after spawning the session task; observe
    /// [`state_observer`](Self::state_observer) to learn when the session
    /// reaches [`ConnectionState::Connected`]. Fails with
    /// [`ClientError::AlreadyConnected`] if called twice.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) -> Result<(), ClientError> {
        let ws_url = websocket_url(&self.inner.base_url)?;
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyConnected);
        }
        self.inner.set_state(ConnectionState::Connecting);
        tracing::info!(url = %ws_url, "connecting to media server");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            session::run(inner, ws_url).await;
        });
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Pending `invoke` calls settle with [`ClientError::ConnectionLost`].
    /// A disconnected client cannot be reused; create a new one to
    /// reconnect.
    pub fn disconnect(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.shutdown_notify.notify_one();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Cloneable observer of the connection state, usable to await the
    /// Connected transition.
    pub fn state_observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(self.inner.state_tx.subscribe())
    }

    /// The hello payload received from the server, once connected.
    pub fn server_info(&self) -> Option<ServerInfoMessage> {
        self.inner
            .server_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send a command and await its correlated result.
    ///
    /// Fails fast with [`ClientError::NotConnected`] while the session is
    /// not Connected; nothing is queued or transmitted in that case.
    pub async fn invoke(
        &self,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) -> Result<Value, ClientError> {
        self.inner.invoke(command, args).await
    }

    /// [`invoke`](Self::invoke), decoding the result into `T`.
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) -> Result<T, ClientError> {
        let value = self.inner.invoke(command, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a fire-and-forget command. No result is ever expected; the
    /// allocated message id exists only for log correlation.
    pub fn send(
        &self,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) -> Result<(), ClientError> {
        self.inner.send(command, args)
    }

    /// Subscribe a callback for events matching `filter`.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        callback: impl Fn(&EventMessage) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner.events.subscribe(filter, callback)
    }

    /// Subscribe one callback for several filters at once; the returned
    /// disposer removes all of them.
    pub fn subscribe_multi(
        &self,
        filters: &[EventFilter],
        callback: impl Fn(&EventMessage) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner.events.subscribe_multi(filters, callback)
    }

    // Replica reads. These are snapshots; subscribe to the corresponding
    // events to react to changes.

    pub fn players(&self) -> Vec<Player> {
        self.inner.read_replica(|r| r.players())
    }

    pub fn player(&self, player_id: &str) -> Option<Player> {
        self.inner.read_replica(|r| r.player(player_id))
    }

    pub fn queues(&self) -> Vec<PlayerQueue> {
        self.inner.read_replica(|r| r.queues())
    }

    pub fn queue(&self, queue_id: &str) -> Option<PlayerQueue> {
        self.inner.read_replica(|r| r.queue(queue_id))
    }

    pub fn providers(&self) -> Vec<ProviderInstance> {
        self.inner.read_replica(|r| r.providers())
    }

    pub fn sync_tasks(&self) -> Vec<SyncTask> {
        self.inner.read_replica(|r| r.sync_tasks())
    }
}

/// State shared between the facade, the session task and the throttler.
pub(crate) struct ClientInner {
    pub(crate) base_url: String,
    state_tx: watch::Sender<ConnectionState>,
    ids: CommandIds,
    pub(crate) pending: tokio::sync::Mutex<PendingCommands>,
    cmd_tx: Mutex<Option<mpsc::Sender<CommandEnvelope>>>,
    pub(crate) events: EventRouter,
    replica: RwLock<StateReplica>,
    pub(crate) server_info: RwLock<Option<ServerInfoMessage>>,
    started: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) shutdown_notify: Notify,
    pub(crate) throttler: CommandThrottler,
}

impl ClientInner {
    fn new(base_url: String) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            base_url,
            state_tx,
            ids: CommandIds::default(),
            pending: tokio::sync::Mutex::new(PendingCommands::default()),
            cmd_tx: Mutex::new(None),
            events: EventRouter::new(),
            replica: RwLock::new(StateReplica::default()),
            server_info: RwLock::new(None),
            started: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            throttler: CommandThrottler::default(),
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn set_state(&self, new_state: ConnectionState) {
        let previous = *self.state_tx.borrow();
        if previous != new_state {
            tracing::info!(from = %previous, to = %new_state, "connection state changed");
            self.state_tx.send_replace(new_state);
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Install the outbound sender for a freshly opened connection.
    pub(crate) fn install_sender(&self, tx: mpsc::Sender<CommandEnvelope>) {
        *self.cmd_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    pub(crate) fn clear_sender(&self) {
        *self.cmd_tx.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn sender(&self) -> Option<mpsc::Sender<CommandEnvelope>> {
        self.cmd_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn invoke(
        &self,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) -> Result<Value, ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let message_id = self.ids.next();
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();

        // Register before transmitting so a fast result cannot miss the table.
        self.pending.lock().await.insert(message_id, result_tx);

        let envelope = CommandEnvelope {
            command: command.to_string(),
            message_id,
            args,
        };
        tracing::debug!(command, message_id, "invoke");
        if let Err(err) = self.transmit(envelope).await {
            self.pending.lock().await.remove(message_id);
            return Err(err);
        }

        match result_rx.await {
            Ok(outcome) => outcome,
            // Sender dropped: pending table was cleared on disconnect.
            Err(_) => Err(ClientError::ConnectionLost),
        }
    }

    pub(crate) fn send(
        &self,
        command: &str,
        args: Option<serde_json::Map<String, Value>>,
    ) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let message_id = self.ids.next();
        let envelope = CommandEnvelope {
            command: command.to_string(),
            message_id,
            args,
        };
        tracing::debug!(command, message_id, "send");
        let Some(tx) = self.sender() else {
            return Err(ClientError::NotConnected);
        };
        tx.try_send(envelope)
            .map_err(|err| ClientError::SendFailed(err.to_string()))
    }

    async fn transmit(&self, envelope: CommandEnvelope) -> Result<(), ClientError> {
        let Some(tx) = self.sender() else {
            return Err(ClientError::NotConnected);
        };
        tx.send(envelope)
            .await
            .map_err(|_| ClientError::ConnectionLost)
    }

    pub(crate) fn read_replica<R>(&self, read: impl FnOnce(&StateReplica) -> R) -> R {
        let guard = self.replica.read().unwrap_or_else(PoisonError::into_inner);
        read(&guard)
    }

    pub(crate) fn write_replica<R>(&self, write: impl FnOnce(&mut StateReplica) -> R) -> R {
        let mut guard = self.replica.write().unwrap_or_else(PoisonError::into_inner);
        write(&mut guard)
    }
}

/// Derive the WebSocket endpoint from the configured base URL: substitute the
/// transport scheme and append the fixed path suffix.
fn websocket_url(base_url: &str) -> Result<String, ClientError> {
    let mut url =
        Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ClientError::InvalidUrl("scheme substitution failed".into()))?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), WS_PATH_SUFFIX);
    url.set_path(&path);
    Ok(url.to_string())
}

/// Build optional command args from a `json!` object literal, dropping null
/// values so optional arguments are omitted from the wire entirely.
pub(crate) fn command_args(value: Value) -> Option<serde_json::Map<String, Value>> {
    let Value::Object(map) = value else {
        return None;
    };
    let filtered: serde_json::Map<String, Value> =
        map.into_iter().filter(|(_, v)| !v.is_null()).collect();
    if filtered.is_empty() {
        None
    } else {
        Some(filtered)
    }
}

#[cfg(test)]
pub(crate) fn test_client_connected() -> (CadenzaClient, mpsc::Receiver<CommandEnvelope>) {
    let client = CadenzaClient::new("http://localhost:8095");
    let (tx, rx) = mpsc::channel(32);
    client.inner.install_sender(tx);
    client.inner.set_state(ConnectionState::Connected);
    (client, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn websocket_url_substitutes_scheme_and_appends_suffix() {
        assert_eq!(
            websocket_url("http://music.local:8095").unwrap(),
            "ws://music.local:8095/ws"
        );
        assert_eq!(
            websocket_url("https://music.example.org").unwrap(),
            "wss://music.example.org/ws"
        );
        assert_eq!(
            websocket_url("http://music.local:8095/base").unwrap(),
            "ws://music.local:8095/base/ws"
        );
    }

    #[test]
    fn websocket_url_rejects_garbage() {
        assert!(websocket_url("not a url").is_err());
        assert!(websocket_url("ftp://music.local").is_err());
    }

    #[test]
    fn command_args_drops_nulls_and_collapses_to_none() {
        let args = command_args(json!({"a": 1, "b": null})).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args["a"], json!(1));

        assert!(command_args(json!({"a": null})).is_none());
        assert!(command_args(json!(null)).is_none());
    }

    #[tokio::test]
    async fn invoke_fails_fast_when_not_connected() {
        let client = CadenzaClient::new("http://localhost:8095");
        let err = client.invoke("music/search", None).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn send_fails_fast_when_not_connected() {
        let client = CadenzaClient::new("http://localhost:8095");
        let err = client.send("music/sync", None).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let client = CadenzaClient::new("http://127.0.0.1:1");
        client.connect().unwrap();
        assert!(matches!(
            client.connect(),
            Err(ClientError::AlreadyConnected)
        ));
        client.disconnect();
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_trimmed() {
        let client = CadenzaClient::new("http://music.local:8095/");
        assert_eq!(client.inner.base_url, "http://music.local:8095");
    }
}
