//! Notifications delivered by the engine on its own execution context.
//!
//! The engine serializes its callbacks but gives no ordering guarantee
//! across notification kinds. Everything here is queued by
//! [`EngineCallbacks`](crate::dispatch::EngineCallbacks) and handled later on
//! the dispatch context.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::types::NativeHandle;

bitflags! {
    /// Which aspects of a playlist storage changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChangeFlags: u32 {
        /// Entries were added or removed.
        const CONTENT   = 0x0001;
        /// Entries were reordered.
        const ORDER     = 0x0002;
        /// Entry metadata (tags, rating, duration) changed.
        const METADATA  = 0x0004;
        /// Selection changed in the engine UI.
        const SELECTION = 0x0008;
        /// Playlist was renamed.
        const NAME      = 0x0010;
        /// Edit lock state changed.
        const LOCK      = 0x0020;
        /// Focused entry changed in the engine UI.
        const FOCUS     = 0x0040;
    }
}

impl ChangeFlags {
    /// Flags that invalidate cached playlist content.
    pub const RELOAD: ChangeFlags = ChangeFlags::CONTENT
        .union(ChangeFlags::ORDER)
        .union(ChangeFlags::METADATA)
        .union(ChangeFlags::NAME);

    /// Whether these flags require the cached playlist to be reloaded.
    #[must_use]
    pub fn needs_reload(self) -> bool {
        self.intersects(Self::RELOAD)
    }
}

/// Playlist storage lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEvent {
    /// A storage became the active (visible) playlist.
    Activated(NativeHandle),
    /// A new storage was created.
    Added(NativeHandle),
    /// A storage changed; flags say which aspects.
    Changed(NativeHandle, ChangeFlags),
    /// A storage was destroyed.
    Removed(NativeHandle),
}

impl StorageEvent {
    /// Handle of the storage the event refers to.
    #[must_use]
    pub fn handle(&self) -> NativeHandle {
        match *self {
            Self::Activated(h) | Self::Added(h) | Self::Changed(h, _) | Self::Removed(h) => h,
        }
    }
}

/// Player-level notification the engine announces explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerNotification {
    /// Playback started, stopped or paused.
    PlaybackStateChanged,
    /// A different entry started playing.
    TrackChanged,
    /// A status property changed inside the engine.
    StatusChanged,
}
