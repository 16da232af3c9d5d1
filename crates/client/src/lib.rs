//! Async session client for a Cadenza media server.
//!
//! [`CadenzaClient`] maintains a persistent WebSocket session with
//! automatic reconnection, correlates command results with the requests
//! that produced them, fans server-pushed events out to subscribers and
//! keeps a locally replicated copy of the server's players, queues,
//! providers and sync tasks.
//!
//! ```no_run
//! use cadenza_client::{CadenzaClient, ConnectionState};
//!
//! # async fn demo() -> Result<(), cadenza_client::ClientError> {
//! let client = CadenzaClient::new("http://music.local:8095");
//! client.connect()?;
//! client
//!     .state_observer()
//!     .wait_for(ConnectionState::Connected)
//!     .await;
//!
//! for player in client.players() {
//!     println!("{} ({:?})", player.name, player.state);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod commands;
mod connection;
mod error;
mod events;
mod music;
mod players;
mod queues;
mod replica;
mod session;
mod throttle;

pub use client::CadenzaClient;
pub use connection::{ConnectionState, ConnectionStateObserver};
pub use error::ClientError;
pub use events::{EventFilter, SubscriptionHandle};
pub use music::LibraryQuery;

pub use cadenza_protocol as protocol;
