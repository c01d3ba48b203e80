//! Playbridge Core - version-independent access to a media engine.
//!
//! The engine ships several incompatible SDK generations. This crate hides
//! them behind one synchronous API, keeps a persisted cache of every playlist
//! and its entries, collapses bursts of engine change notifications into
//! single reloads and fans player events out to subscribers.
//!
//! # Architecture
//!
//! - [`engine`]: SDK generations and the [`EngineAdapter`](engine::EngineAdapter)
//! - [`ids`]: Stable playlist and entry ids over native handles
//! - [`cache`]: Playlist cache backed by SQLite, with CRC checksums
//! - [`coalescer`]: Per-playlist debounce of change notifications
//! - [`events`]: Player events and the listener bus
//! - [`dispatch`]: Queue between the engine's callback thread and the tick
//! - [`capabilities`]: Traits consumed by RPC frontends
//! - [`manager`]: The owned context wiring everything together
//!
//! Nothing here spawns threads. The host calls
//! [`PlayerManager::on_tick`] periodically (see
//! [`BridgeConfig::tick_interval`]) and every cache mutation and listener
//! delivery happens inside that call.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod capabilities;
pub mod clock;
pub mod coalescer;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod manager;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types at the crate root
pub use cache::{FieldValue, PlaylistInfo, PlaylistState, ReloadOutcome};
pub use capabilities::{
    CoverArtProvider, EventSubscription, PlayQueue, PlaybackControl, PlayerControl, PlayerStatus,
    PlaylistEditor, PlaylistQuery, PlaylistUpdate, SupportedFormats, TrackRating,
};
pub use clock::{Clock, SystemClock};
pub use config::BridgeConfig;
pub use dispatch::EngineCallbacks;
pub use engine::{
    ChangeFlags, EngineAdapter, NativeEngine, NativeHandle, PlaybackState, PlayerNotification,
    SourceType, Status, StatusValue, StorageEvent,
};
pub use error::{BridgeError, BridgeResult, EngineError, ErrorCode};
pub use events::{Listener, ListenerId, ListenerResult, PlayerEvent};
pub use ids::{EntryId, PlaylistId, ResolvedTrack, TrackDescription, CURRENT};
pub use manager::PlayerManager;
