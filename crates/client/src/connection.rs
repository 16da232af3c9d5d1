//! Connection lifecycle types
//!
//! The session moves through a small state machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --hello--> Connected
//!      ^                        ^                     |
//!      |                        |              transport closed
//!      +--backoff elapsed-------+---------------------+
//! ```
//!
//! Note that the transition to Connected happens on receipt of the server
//! hello, not on transport-level open: the socket being accepted does not
//! mean the server is ready to serve commands yet.

use tokio::sync::watch;

// Reconnect schedule: linear, starting immediately, +1s per retry, capped.
// There is no give-up state; retries continue until the client is dropped
// or disconnected.
pub(crate) const BACKOFF_INITIAL_MS: u64 = 0;
pub(crate) const BACKOFF_INCREMENT_MS: u64 = 1_000;
pub(crate) const BACKOFF_MAX_MS: u64 = 12_000;

/// Connection state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server
    Disconnected,
    /// Transport opening, or open but no server hello received yet
    Connecting,
    /// Server hello received; commands can be issued
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Read-only, cloneable view of the connection state.
///
/// Backed by a watch channel so callers can either poll `state()` or await a
/// particular transition with `wait_for()`.
#[derive(Debug, Clone)]
pub struct ConnectionStateObserver {
    rx: watch::Receiver<ConnectionState>,
}

impl ConnectionStateObserver {
    pub(crate) fn new(rx: watch::Receiver<ConnectionState>) -> Self {
        Self { rx }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until the session reaches `target`.
    ///
    /// Returns immediately if the state already matches. Returns `false` if
    /// the client was dropped before the state was reached.
    pub async fn wait_for(&mut self, target: ConnectionState) -> bool {
        loop {
            if *self.rx.borrow_and_update() == target {
                return true;
            }
            if self.rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

/// Linear reconnect backoff: 0, 1s, 2s, ... capped at 12s, indefinitely.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinearBackoff {
    attempts: u32,
    delay_ms: u64,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            attempts: 0,
            delay_ms: BACKOFF_INITIAL_MS,
        }
    }
}

impl LinearBackoff {
    /// Reset after a successful connection.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt.
    pub(crate) fn next_delay_and_advance(&mut self) -> u64 {
        let current_delay = self.delay_ms;
        self.attempts += 1;
        self.delay_ms = (self.delay_ms + BACKOFF_INCREMENT_MS).min(BACKOFF_MAX_MS);
        current_delay
    }
}
