//! Change notification for run state.
//!
//! [`ChangeNotifier`] is built on a monotonically increasing generation
//! counter. A waiter records the generation when it starts waiting and is
//! released once the counter has moved past it, so a notification can never be
//! cleared out from under a slower waiter, and an old notification never
//! releases a new waiter.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;

type Callback = Arc<dyn Fn() + Send + Sync>;
type SubscriberMap = Mutex<BTreeMap<u64, Callback>>;

/// Wakes waiters and calls subscribers whenever run state changes.
///
/// Created once per run and shared behind an `Arc`. `notify` never blocks.
pub struct ChangeNotifier {
    /// Async side of the generation counter.
    generation_tx: watch::Sender<u64>,
    /// Blocking side of the generation counter, for plain threads.
    generation: Mutex<u64>,
    generation_cv: Condvar,
    subscribers: Arc<SubscriberMap>,
    next_subscriber_id: AtomicU64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("generation", &self.generation())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Create a notifier at generation 0 with no subscribers.
    pub fn new() -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            generation_tx,
            generation: Mutex::new(0),
            generation_cv: Condvar::new(),
            subscribers: Arc::new(Mutex::new(BTreeMap::new())),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    /// Number of notifications so far.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Advance the generation, wake every waiter and call every subscriber.
    pub fn notify(&self) {
        let next = {
            let mut generation = self.generation.lock();
            *generation = generation.wrapping_add(1);
            *generation
        };
        self.generation_cv.notify_all();
        self.generation_tx.send_replace(next);

        // Call outside the lock so a callback may drop its own subscription.
        let callbacks: Vec<Callback> = self.subscribers.lock().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Future that resolves at the first `notify` after this call.
    ///
    /// The starting generation is captured here, not on first poll, so a
    /// caller may read state, call `wait`, and be sure no change in between is
    /// missed. If the notifier is dropped the future resolves immediately.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.generation_tx.subscribe();
        async move {
            let _ = rx.changed().await;
        }
    }

    /// Block the current thread until the next `notify` or the timeout.
    ///
    /// Returns `true` if a notification arrived. Must not be called from an
    /// async task.
    pub fn wait_blocking_timeout(&self, timeout: Duration) -> bool {
        let mut generation = self.generation.lock();
        let start = *generation;
        let result = self
            .generation_cv
            .wait_while_for(&mut generation, |g| *g == start, timeout);
        !result.timed_out()
    }

    /// Register a callback run synchronously on every `notify`.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed, so every exit path unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, Arc::new(callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Handle to a registered subscriber; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberMap>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().remove(&self.id);
        }
    }
}
