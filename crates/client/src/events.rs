//! Event subscription and broadcast
//!
//! Subscribers register a (filter, callback) pair and get back a
//! [`SubscriptionHandle`] that removes exactly that subscription. Removal is
//! identity-based (each subscription carries a unique token), so two
//! subscriptions with the same filter and an identical callback are still
//! independent.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use cadenza_protocol::{EventMessage, EventType};

/// What events a subscription wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Match every event type.
    All,
    /// Match one specific event type.
    Event(EventType),
}

impl EventFilter {
    pub fn matches(&self, event: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Event(wanted) => *wanted == event,
        }
    }
}

impl From<EventType> for EventFilter {
    fn from(event: EventType) -> Self {
        EventFilter::Event(event)
    }
}

type EventCallback = Arc<dyn Fn(&EventMessage) + Send + Sync>;

struct Subscription {
    token: u64,
    filter: EventFilter,
    callback: EventCallback,
}

#[derive(Default)]
struct RouterInner {
    next_token: u64,
    subscriptions: Vec<Subscription>,
}

/// Fan-out of inbound events to registered subscribers.
///
/// Dispatch order across subscriptions is insertion order. A panicking
/// callback is contained and logged so it cannot break delivery to the
/// callbacks behind it.
#[derive(Clone, Default)]
pub(crate) struct EventRouter {
    inner: Arc<Mutex<RouterInner>>,
}

impl EventRouter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(
        &self,
        filter: EventFilter,
        callback: impl Fn(&EventMessage) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let callback: EventCallback = Arc::new(callback);
        let token = self.register(filter, callback);
        SubscriptionHandle {
            inner: Arc::clone(&self.inner),
            tokens: vec![token],
        }
    }

    /// Register one subscription per filter, all sharing the same callback.
    /// The returned handle removes all of them at once.
    pub(crate) fn subscribe_multi(
        &self,
        filters: &[EventFilter],
        callback: impl Fn(&EventMessage) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let callback: EventCallback = Arc::new(callback);
        let tokens = filters
            .iter()
            .map(|filter| self.register(*filter, Arc::clone(&callback)))
            .collect();
        SubscriptionHandle {
            inner: Arc::clone(&self.inner),
            tokens,
        }
    }

    fn register(&self, filter: EventFilter, callback: EventCallback) -> u64 {
        let mut inner = self.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.subscriptions.push(Subscription {
            token,
            filter,
            callback,
        });
        token
    }

    /// Deliver `event` to every subscription whose filter matches.
    pub(crate) fn dispatch(&self, event: &EventMessage) {
        // Snapshot the matching callbacks so none are invoked while the
        // subscription list is locked; a callback may subscribe/unsubscribe.
        let callbacks: Vec<EventCallback> = {
            let inner = self.lock();
            inner
                .subscriptions
                .iter()
                .filter(|sub| sub.filter.matches(event.event))
                .map(|sub| Arc::clone(&sub.callback))
                .collect()
        };

        for callback in callbacks {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
            if outcome.is_err() {
                tracing::error!(event = %event.event, "event subscriber panicked");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Disposer for one `subscribe` / `subscribe_multi` call.
///
/// Call [`unsubscribe`](Self::unsubscribe) to stop delivery; dropping the
/// handle without calling it leaves the subscription active for the lifetime
/// of the client.
#[must_use = "dropping the handle does not remove the subscription; call unsubscribe()"]
pub struct SubscriptionHandle {
    inner: Arc<Mutex<RouterInner>>,
    tokens: Vec<u64>,
}

impl SubscriptionHandle {
    /// Remove every subscription created by the call that produced this
    /// handle. Guarantees no further delivery to the removed callbacks.
    pub fn unsubscribe(self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscriptions
            .retain(|sub| !self.tokens.contains(&sub.token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event(event: EventType) -> EventMessage {
        EventMessage {
            event,
            object_id: None,
            data: Value::Null,
        }
    }

    #[test]
    fn filter_and_wildcard_matching() {
        let router = EventRouter::new();
        let player_hits = Arc::new(AtomicU32::new(0));
        let all_hits = Arc::new(AtomicU32::new(0));

        let hits = Arc::clone(&player_hits);
        let _player_sub = router.subscribe(EventType::PlayerAdded.into(), move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let hits = Arc::clone(&all_hits);
        let _all_sub = router.subscribe(EventFilter::All, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&event(EventType::PlayerAdded));
        router.dispatch(&event(EventType::QueueUpdated));

        assert_eq!(player_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disposer_removes_exactly_one_of_two_identical_subscriptions() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU32::new(0));

        let hits_a = Arc::clone(&hits);
        let sub_a = router.subscribe(EventFilter::All, move |_| {
            hits_a.fetch_add(1, Ordering::SeqCst);
        });
        let hits_b = Arc::clone(&hits);
        let _sub_b = router.subscribe(EventFilter::All, move |_| {
            hits_b.fetch_add(1, Ordering::SeqCst);
        });

        sub_a.unsubscribe();
        assert_eq!(router.subscription_count(), 1);

        router.dispatch(&event(EventType::PlayerUpdated));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_multi_disposer_removes_all() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = Arc::clone(&hits);
        let sub = router.subscribe_multi(
            &[
                EventType::PlayerAdded.into(),
                EventType::PlayerUpdated.into(),
            ],
            move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(router.subscription_count(), 2);

        router.dispatch(&event(EventType::PlayerAdded));
        router.dispatch(&event(EventType::PlayerUpdated));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        sub.unsubscribe();
        assert_eq!(router.subscription_count(), 0);

        router.dispatch(&event(EventType::PlayerAdded));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_subscriber_does_not_block_later_ones() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicU32::new(0));

        let _bad = router.subscribe(EventFilter::All, |_| {
            panic!("subscriber bug");
        });
        let hits_clone = Arc::clone(&hits);
        let _good = router.subscribe(EventFilter::All, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&event(EventType::QueueAdded));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_order_is_insertion_order() {
        let router = EventRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let _sub = router.subscribe(EventFilter::All, move |_| {
                order
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(tag);
            });
        }

        router.dispatch(&event(EventType::ProvidersUpdated));
        let seen = order.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(*seen, vec!["first", "second", "third"]);
    }
}
