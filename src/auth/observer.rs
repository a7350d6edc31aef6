//! Subscription registry for authorization failures.
//!
//! The transport calls [`AuthNotifier::notify`] once per 401 response.
//! Subscribers are invoked synchronously on the calling thread, outside the
//! registry lock, so an observer may subscribe or unsubscribe from within its
//! own callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Event emitted when the backend rejects a request with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequired {
    /// The normalized failure message of the rejected call.
    pub message: String,
}

/// Receiver of [`AuthRequired`] events.
pub trait AuthObserver: Send + Sync {
    fn on_auth_required(&self, event: &AuthRequired);
}

impl<F> AuthObserver for F
where
    F: Fn(&AuthRequired) + Send + Sync,
{
    fn on_auth_required(&self, event: &AuthRequired) {
        self(event)
    }
}

/// Handle returned by [`AuthNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = Vec<(SubscriptionId, Arc<dyn AuthObserver>)>;

/// Fan-out of 401 notifications to every current subscriber.
#[derive(Default)]
pub struct AuthNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<Subscribers>,
}

impl AuthNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: impl AuthObserver + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(observer)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every subscriber registered at call time.
    pub fn notify(&self, event: &AuthRequired) {
        let snapshot: Vec<Arc<dyn AuthObserver>> =
            self.lock().iter().map(|(_, obs)| Arc::clone(obs)).collect();
        for observer in snapshot {
            observer.on_auth_required(event);
        }
    }

    // A panicking observer must not disable notifications for everyone else.
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for AuthNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event(msg: &str) -> AuthRequired {
        AuthRequired {
            message: msg.to_string(),
        }
    }

    #[test]
    fn notifies_every_subscriber_once() {
        let notifier = AuthNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            notifier.subscribe(move |_: &AuthRequired| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        notifier.notify(&event("unauthorized"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unsubscribed_observer_is_silent() {
        let notifier = AuthNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = notifier.subscribe(move |e: &AuthRequired| {
            sink.lock().unwrap().push(e.message.clone());
        });

        notifier.notify(&event("first"));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&event("second"));

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn observer_can_unsubscribe_itself() {
        let notifier = Arc::new(AuthNotifier::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&notifier);
        let own_id = Arc::clone(&slot);
        let id = notifier.subscribe(move |_: &AuthRequired| {
            if let Some(id) = *own_id.lock().unwrap() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        notifier.notify(&event("once"));
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
