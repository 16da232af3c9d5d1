//! Cadenza session runner - small composition root binary
//!
//! Connects to the server named by `CADENZA_SERVER_URL`, waits for the
//! session to come up, prints the replicated state and then follows the
//! server's event stream until interrupted.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadenza_client::{CadenzaClient, ConnectionState, EventFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadenza_client=debug,cadenza_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_url =
        std::env::var("CADENZA_SERVER_URL").unwrap_or_else(|_| "http://localhost:8095".to_string());

    tracing::info!(server_url, "starting cadenza runner");

    let client = CadenzaClient::new(server_url);
    client.connect()?;
    client
        .state_observer()
        .wait_for(ConnectionState::Connected)
        .await;

    if let Some(info) = client.server_info() {
        tracing::info!(server_version = %info.server_version, "connected");
    }

    // The resync that follows the Connected transition populates the
    // replica; give it a moment before printing the snapshot.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    for player in client.players() {
        tracing::info!(
            player_id = %player.player_id,
            name = %player.name,
            available = player.available,
            volume = player.volume_level,
            "player"
        );
    }
    for queue in client.queues() {
        tracing::info!(queue_id = %queue.queue_id, name = %queue.display_name, "queue");
    }
    for provider in client.providers() {
        tracing::info!(instance_id = %provider.instance_id, domain = %provider.domain, "provider");
    }

    let subscription = client.subscribe(EventFilter::All, |event| {
        tracing::info!(event = %event.event, object_id = ?event.object_id, "event");
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    subscription.unsubscribe();
    client.disconnect();
    Ok(())
}
