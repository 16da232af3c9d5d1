//! Command/response correlation
//!
//! Every command sent to the server carries a `message_id`; results come back
//! carrying the same id. `PendingCommands` is the in-flight table mapping ids
//! to the oneshot sender that settles the caller's `invoke` future. Entries
//! are created on send and destroyed on the first matching result; a result
//! whose id has no entry (stale, duplicate, or never sent by this session)
//! is a table miss and is ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;

use cadenza_protocol::ResultMessage;

use crate::error::ClientError;

/// Allocator for outbound message ids.
///
/// Ids are strictly increasing for the lifetime of the client and never
/// reused, which makes per-session uniqueness trivial across reconnects.
#[derive(Debug, Default)]
pub(crate) struct CommandIds {
    next: AtomicU64,
}

impl CommandIds {
    pub(crate) fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// In-flight request table, keyed by message id.
#[derive(Default)]
pub(crate) struct PendingCommands {
    inner: HashMap<u64, oneshot::Sender<Result<Value, ClientError>>>,
}

impl PendingCommands {
    pub(crate) fn insert(
        &mut self,
        message_id: u64,
        tx: oneshot::Sender<Result<Value, ClientError>>,
    ) {
        self.inner.insert(message_id, tx);
    }

    pub(crate) fn remove(&mut self, message_id: u64) -> bool {
        self.inner.remove(&message_id).is_some()
    }

    /// Settle the pending entry matching `result`, if any.
    ///
    /// Returns false on a table miss, which callers treat as "silently
    /// ignore" rather than an error.
    pub(crate) fn resolve(&mut self, result: ResultMessage) -> bool {
        let Some(tx) = self.inner.remove(&result.message_id()) else {
            return false;
        };
        let outcome = match result {
            ResultMessage::Success { result, .. } => Ok(result),
            ResultMessage::Error {
                error_code,
                details,
                ..
            } => Err(ClientError::Command {
                error_code,
                details,
            }),
        };
        // The receiver may already be gone; nothing to do then.
        let _ = tx.send(outcome);
        true
    }

    /// Drop every pending entry.
    ///
    /// Dropping the senders settles all waiters with `ConnectionLost`. Called
    /// on transport close so no `invoke` is left pending forever.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.inner.len();
        self.inner.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = CommandIds::default();
        let mut previous = 0;
        for _ in 0..100 {
            let id = ids.next();
            assert!(id > previous);
            previous = id;
        }
    }

    #[tokio::test]
    async fn success_result_resolves_pending_entry() {
        let mut pending = PendingCommands::default();
        let (tx, rx) = oneshot::channel();
        pending.insert(1, tx);

        let resolved = pending.resolve(ResultMessage::Success {
            message_id: 1,
            result: json!({"hits": 3}),
        });
        assert!(resolved);
        assert_eq!(pending.len(), 0);
        assert_eq!(rx.await.unwrap().unwrap(), json!({"hits": 3}));
    }

    #[tokio::test]
    async fn error_result_rejects_with_details() {
        let mut pending = PendingCommands::default();
        let (tx, rx) = oneshot::channel();
        pending.insert(2, tx);

        pending.resolve(ResultMessage::Error {
            message_id: 2,
            error_code: "invalid_command".into(),
            details: Some("nope".into()),
        });
        match rx.await.unwrap() {
            Err(ClientError::Command {
                error_code,
                details,
            }) => {
                assert_eq!(error_code, "invalid_command");
                assert_eq!(details.as_deref(), Some("nope"));
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_or_unknown_result_is_a_miss() {
        let mut pending = PendingCommands::default();
        let (tx, _rx) = oneshot::channel();
        pending.insert(3, tx);

        assert!(pending.resolve(ResultMessage::Success {
            message_id: 3,
            result: Value::Null,
        }));
        // Second arrival of the same id: entry already gone.
        assert!(!pending.resolve(ResultMessage::Success {
            message_id: 3,
            result: Value::Null,
        }));
        // Never-sent id.
        assert!(!pending.resolve(ResultMessage::Success {
            message_id: 999,
            result: Value::Null,
        }));
    }

    #[tokio::test]
    async fn clear_settles_waiters_with_connection_lost() {
        let mut pending = PendingCommands::default();
        let (tx, rx) = oneshot::channel();
        pending.insert(4, tx);

        assert_eq!(pending.clear(), 1);
        // Sender dropped: the invoke path maps this to ConnectionLost.
        assert!(rx.await.is_err());
    }
}
