//! Session task: transport ownership, reconnect loop and inbound routing
//!
//! One task per client owns the WebSocket. Inbound messages are handled
//! inline in the read loop, so event application and result resolution run
//! to completion in arrival order; the only suspension points callers see
//! are their own `invoke` futures.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use cadenza_protocol::{
    CommandEnvelope, EventType, Player, PlayerQueue, ProviderInstance, ServerMessage, SyncTask,
};

use crate::client::ClientInner;
use crate::connection::{ConnectionState, LinearBackoff};
use crate::replica::StateReplica;

/// Outbound channel depth per connection.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Drive the session until disconnect is requested: connect, serve the
/// connection, then reconnect with linear backoff, indefinitely.
pub(crate) async fn run(inner: Arc<ClientInner>, ws_url: String) {
    let mut backoff = LinearBackoff::default();

    loop {
        if inner.is_shutdown() {
            break;
        }
        inner.set_state(ConnectionState::Connecting);

        match connect_async(&ws_url).await {
            Ok((stream, _)) => {
                tracing::info!(url = %ws_url, "transport open, waiting for server hello");
                serve_connection(&inner, stream, &mut backoff).await;
            }
            Err(err) => {
                tracing::warn!(url = %ws_url, error = %err, "connection attempt failed");
            }
        }

        // Connection is gone, one way or another.
        inner.set_state(ConnectionState::Disconnected);
        inner.clear_sender();
        let rejected = inner.pending.lock().await.clear();
        if rejected > 0 {
            tracing::debug!(rejected, "settled in-flight commands with connection lost");
        }

        if inner.is_shutdown() {
            break;
        }
        let delay = backoff.next_delay_and_advance();
        tracing::debug!(
            attempt = backoff.attempts(),
            delay_ms = delay,
            "scheduling reconnect"
        );
        if delay > 0 {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_millis(delay)) => {}
                () = inner.shutdown_notify.notified() => break,
            }
        }
    }

    tracing::info!("session task finished");
}

/// Serve one established transport until it closes or disconnect is
/// requested.
async fn serve_connection(
    inner: &Arc<ClientInner>,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    backoff: &mut LinearBackoff,
) {
    let (mut write, mut read) = stream.split();

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<CommandEnvelope>(COMMAND_CHANNEL_CAPACITY);
    inner.install_sender(cmd_tx);

    let write_handle = tokio::spawn(async move {
        while let Some(envelope) = cmd_rx.recv().await {
            let json = match serde_json::to_string(&envelope) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(error = %err, "failed to serialize command envelope");
                    continue;
                }
            };
            if let Err(err) = write.send(Message::Text(json)).await {
                tracing::error!(error = %err, "failed to write to transport");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => route_message(inner, &text, backoff).await,
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("server closed the connection");
                    break;
                }
                // tungstenite answers pings internally
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::error!(error = %err, "websocket error");
                    break;
                }
                None => {
                    tracing::info!("transport stream ended");
                    break;
                }
            },
            () = inner.shutdown_notify.notified() => {
                tracing::info!("disconnect requested");
                break;
            }
        }
    }

    write_handle.abort();
}

/// Classify one inbound payload and dispatch it.
///
/// Classification is encoded in `ServerMessage`'s untagged variant order:
/// event, then hello, then result. Payloads matching none of the shapes are
/// logged and dropped without touching any state.
async fn route_message(inner: &Arc<ClientInner>, text: &str, backoff: &mut LinearBackoff) {
    let msg = match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::warn!(error = %err, "dropping unroutable message");
            return;
        }
    };

    match msg {
        ServerMessage::Event(event) => {
            // The elapsed-time delta fires every second; keep it out of logs.
            if event.event != EventType::QueueTimeUpdated {
                tracing::debug!(event = %event.event, object_id = ?event.object_id, "event");
            }
            inner.write_replica(|replica| replica.apply(&event));
            inner.events.dispatch(&event);
        }
        ServerMessage::ServerInfo(info) => {
            tracing::info!(server_version = %info.server_version, "server hello received");
            *inner
                .server_info
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(info);
            backoff.reset();
            // Connected only now, not on transport open: the hello is the
            // signal that the server is ready to serve commands.
            inner.set_state(ConnectionState::Connected);

            // Resync needs invoke results, so it runs beside the read loop.
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                resync(&inner).await;
            });
        }
        ServerMessage::Result(result) => {
            let message_id = result.message_id();
            if !inner.pending.lock().await.resolve(result) {
                tracing::debug!(message_id, "result for unknown message id, ignoring");
            }
        }
    }
}

/// Full state resync, triggered once per Connected transition.
///
/// Fetches the complete current collections and merges them with
/// entity-added (overwrite) semantics, recovering whatever events were
/// missed while disconnected. Fetches run sequentially; a failed fetch for
/// one kind does not stop the others.
pub(crate) async fn resync(inner: &Arc<ClientInner>) {
    tracing::debug!("starting full state resync");
    fetch_and_merge::<Player>(inner, "players/all", StateReplica::resync_players).await;
    fetch_and_merge::<PlayerQueue>(inner, "players/queue/all", StateReplica::resync_queues).await;
    fetch_and_merge::<ProviderInstance>(inner, "providers", StateReplica::resync_providers).await;
    fetch_and_merge::<SyncTask>(inner, "music/synctasks", StateReplica::resync_sync_tasks).await;
    tracing::debug!("full state resync done");
}

async fn fetch_and_merge<T: DeserializeOwned>(
    inner: &Arc<ClientInner>,
    command: &str,
    merge: impl FnOnce(&mut StateReplica, Vec<T>),
) {
    match inner.invoke(command, None).await {
        Ok(value) => match serde_json::from_value::<Vec<T>>(value) {
            Ok(items) => inner.write_replica(|replica| merge(replica, items)),
            Err(err) => {
                tracing::warn!(command, error = %err, "undecodable resync payload");
            }
        },
        Err(err) => {
            tracing::warn!(command, error = %err, "resync fetch failed");
        }
    }
}
