//! Dispatch queue between the engine's callback thread and the tick.
//!
//! The engine invokes [`EngineCallbacks`] on its own execution context. The
//! callbacks only enqueue; every cache mutation and listener delivery happens
//! later when the host calls `on_tick`, which drains the queue on the single
//! logical dispatch context.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::engine::{ChangeFlags, NativeHandle, PlayerNotification, StorageEvent};
use crate::events::PlayerEvent;

/// Work item waiting for the dispatch context.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchItem {
    /// Raw playlist storage notification from the engine.
    Storage(StorageEvent),
    /// Raw player notification from the engine.
    Player(PlayerNotification),
    /// Event produced off the dispatch context, published on the next tick.
    Publish(PlayerEvent),
}

/// Sink the host wires into the engine's notification hooks.
///
/// Cheap to clone and safe to call from any thread. Calls after the manager
/// is finalized are dropped.
#[derive(Clone)]
pub struct EngineCallbacks {
    tx: mpsc::UnboundedSender<DispatchItem>,
}

impl EngineCallbacks {
    fn send(&self, item: DispatchItem) {
        if self.tx.send(item).is_err() {
            log::trace!("[EngineCallbacks] Dispatch queue closed, notification dropped");
        }
    }

    pub fn storage_activated(&self, handle: NativeHandle) {
        self.send(DispatchItem::Storage(StorageEvent::Activated(handle)));
    }

    pub fn storage_added(&self, handle: NativeHandle) {
        self.send(DispatchItem::Storage(StorageEvent::Added(handle)));
    }

    /// `flags` is the engine's raw change bitmask; unknown bits are dropped.
    pub fn storage_changed(&self, handle: NativeHandle, flags: u32) {
        self.send(DispatchItem::Storage(StorageEvent::Changed(
            handle,
            ChangeFlags::from_bits_truncate(flags),
        )));
    }

    pub fn storage_removed(&self, handle: NativeHandle) {
        self.send(DispatchItem::Storage(StorageEvent::Removed(handle)));
    }

    pub fn storage_event(&self, event: StorageEvent) {
        self.send(DispatchItem::Storage(event));
    }

    pub fn player_notification(&self, notification: PlayerNotification) {
        self.send(DispatchItem::Player(notification));
    }
}

/// Receiving end of the dispatch queue.
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<DispatchItem>,
    rx: Mutex<mpsc::UnboundedReceiver<DispatchItem>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn callbacks(&self) -> EngineCallbacks {
        EngineCallbacks {
            tx: self.tx.clone(),
        }
    }

    /// Queues an event for publication on the next tick.
    pub fn post(&self, event: PlayerEvent) {
        // Fails only after `close`, when nothing is delivered anymore.
        let _ = self.tx.send(DispatchItem::Publish(event));
    }

    /// Takes everything queued so far without blocking.
    ///
    /// Items queued while the returned batch is being handled wait for the
    /// next tick.
    pub fn drain(&self) -> Vec<DispatchItem> {
        let mut rx = self.rx.lock();
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Stops accepting items and returns what was still queued.
    pub fn close(&self) -> Vec<DispatchItem> {
        let mut rx = self.rx.lock();
        rx.close();
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PlaylistId;

    #[test]
    fn callbacks_enqueue_in_order() {
        let queue = DispatchQueue::new();
        let callbacks = queue.callbacks();
        let h = NativeHandle(9);

        callbacks.storage_added(h);
        callbacks.storage_changed(h, 0x0001 | 0x8000_0000);
        queue.post(PlayerEvent::PlaylistAdded {
            playlist_id: PlaylistId(1),
        });

        assert_eq!(
            queue.drain(),
            vec![
                DispatchItem::Storage(StorageEvent::Added(h)),
                DispatchItem::Storage(StorageEvent::Changed(h, ChangeFlags::CONTENT)),
                DispatchItem::Publish(PlayerEvent::PlaylistAdded {
                    playlist_id: PlaylistId(1)
                }),
            ]
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn callbacks_from_other_threads() {
        let queue = DispatchQueue::new();
        let callbacks = queue.callbacks();
        let worker = std::thread::spawn(move || {
            for i in 0..10 {
                callbacks.storage_removed(NativeHandle(i));
            }
        });
        worker.join().unwrap();
        assert_eq!(queue.drain().len(), 10);
    }

    #[test]
    fn closed_queue_drops_notifications() {
        let queue = DispatchQueue::new();
        let callbacks = queue.callbacks();
        callbacks.storage_added(NativeHandle(1));
        assert_eq!(queue.close().len(), 1);

        callbacks.storage_added(NativeHandle(2));
        assert!(queue.drain().is_empty());
    }
}
