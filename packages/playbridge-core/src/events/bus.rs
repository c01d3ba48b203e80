//! Listener registry and fan-out.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::PlayerEvent;

/// Error a listener may return from its callback.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

pub type ListenerResult = Result<(), ListenerError>;

/// Subscriber callback.
pub type Listener = Arc<dyn Fn(&PlayerEvent) -> ListenerResult + Send + Sync>;

/// Handle returned by [`ListenerBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub u64);

/// Ordered set of subscribers.
///
/// The registry lock is never held while a callback runs, so callbacks may
/// subscribe or unsubscribe (themselves or others) freely.
#[derive(Default)]
pub struct ListenerBus {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.subscribe_listener(Arc::new(callback))
    }

    pub fn subscribe_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().push((id, listener));
        log::debug!("[ListenerBus] Registered listener {}", id.0);
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        let removed = listeners.len() != before;
        if removed {
            log::debug!("[ListenerBus] Unregistered listener {}", id.0);
        }
        removed
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.lock().iter().any(|(other, _)| *other == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every listener. Returns how many were registered.
    pub fn clear(&self) -> usize {
        let mut listeners = self.listeners.lock();
        let count = listeners.len();
        listeners.clear();
        count
    }

    /// Delivers `event` to every registered listener in registration order.
    ///
    /// Membership is re-checked right before each delivery. A listener that
    /// returns an error or panics is logged and skipped. Returns the number
    /// of listeners that accepted the event.
    pub fn publish(&self, event: &PlayerEvent) -> usize {
        tracing::debug!(?event, "player_event");
        let snapshot: Vec<(ListenerId, Listener)> = self.listeners.lock().clone();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    log::warn!("[ListenerBus] Listener {} failed: {}", id.0, e);
                }
                Err(_) => {
                    log::warn!("[ListenerBus] Listener {} panicked", id.0);
                }
            }
        }
        delivered
    }
}
