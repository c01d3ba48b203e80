//! Capability traits consumed by RPC frontends.
//!
//! [`PlayerManager`](crate::PlayerManager) implements every trait here.
//! Frontends depend on the narrowest capability they need, which also lets
//! them be tested against small fakes.
//!
//! Track arguments are raw [`TrackDescription`]s and playlist arguments raw
//! ids; both accept [`CURRENT`](crate::ids::CURRENT).

use std::path::Path;

use crate::cache::{FieldValue, PlaylistInfo};
use crate::engine::{PlaybackState, SourceType, Status, StatusValue};
use crate::error::BridgeResult;
use crate::events::{Listener, ListenerId};
use crate::ids::{EntryId, PlaylistId, ResolvedTrack, TrackDescription};

/// Transport control.
pub trait PlaybackControl: Send + Sync {
    fn start_playback(&self) -> BridgeResult<()>;

    /// Starts playing a specific track.
    fn start_track(&self, track: TrackDescription) -> BridgeResult<()>;

    fn stop_playback(&self) -> BridgeResult<()>;

    fn pause_playback(&self) -> BridgeResult<()>;

    fn play_next_track(&self) -> BridgeResult<()>;

    fn play_previous_track(&self) -> BridgeResult<()>;

    fn playback_state(&self) -> BridgeResult<PlaybackState>;
}

/// Player status values (volume, mute, shuffle, ...).
pub trait PlayerStatus: Send + Sync {
    fn status(&self, status: Status) -> BridgeResult<StatusValue>;

    /// Sets a status; subscribers are notified with `StatusChanged`.
    fn set_status(&self, status: Status, value: StatusValue) -> BridgeResult<()>;
}

/// The engine's play queue.
pub trait PlayQueue: Send + Sync {
    fn enqueue_entry(&self, track: TrackDescription, at_front: bool) -> BridgeResult<()>;

    fn remove_entry_from_queue(&self, track: TrackDescription) -> BridgeResult<()>;
}

/// Read access to playlists, entries and the playing context.
pub trait PlaylistQuery: Send + Sync {
    fn playing_playlist(&self) -> BridgeResult<PlaylistId>;

    fn playing_entry(&self) -> BridgeResult<EntryId>;

    fn playing_track(&self) -> BridgeResult<ResolvedTrack>;

    /// Resolves a raw playlist id (possibly [`CURRENT`](crate::ids::CURRENT)).
    fn absolute_playlist_id(&self, raw: i64) -> BridgeResult<PlaylistId>;

    fn absolute_entry_id(&self, track: TrackDescription) -> BridgeResult<EntryId>;

    fn absolute_track(&self, track: TrackDescription) -> BridgeResult<ResolvedTrack>;

    fn playlist_checksum(&self, playlist: i64) -> BridgeResult<u32>;

    fn playlists(&self) -> Vec<PlaylistInfo>;

    fn playlist_entries(&self, playlist: i64) -> BridgeResult<Vec<EntryId>>;

    fn entry_field(&self, entry: EntryId, field: &str) -> BridgeResult<FieldValue>;

    fn track_source_type(&self, track: TrackDescription) -> BridgeResult<SourceType>;

    fn entry_filename(&self, track: TrackDescription) -> BridgeResult<String>;

    fn formatted_entry_title(&self, track: TrackDescription, format: &str) -> BridgeResult<String>;
}

/// Star ratings (`0.0..=5.0`).
pub trait TrackRating: Send + Sync {
    fn track_rating(&self, track: TrackDescription) -> BridgeResult<f64>;

    fn set_track_rating(&self, track: TrackDescription, rating: f64) -> BridgeResult<()>;
}

/// The engine's playlist edit lock.
pub trait PlaylistUpdate: Send + Sync {
    fn lock_playlist(&self, playlist: i64) -> BridgeResult<()>;

    fn unlock_playlist(&self, playlist: i64) -> BridgeResult<()>;
}

/// Playlist creation and editing.
pub trait PlaylistEditor: Send + Sync {
    fn create_playlist(&self, title: &str) -> BridgeResult<PlaylistId>;

    fn add_file_to_playlist(&self, playlist: i64, path: &Path) -> BridgeResult<()>;

    fn add_url_to_playlist(&self, playlist: i64, url: &str) -> BridgeResult<()>;

    /// Removes a track; with `physically` the file is deleted from disk too.
    fn remove_track(&self, track: TrackDescription, physically: bool) -> BridgeResult<()>;
}

/// File types the engine can play.
pub trait SupportedFormats: Send + Sync {
    /// Lowercase extensions without dot, e.g. `["mp3", "flac"]`.
    fn supported_track_extensions(&self) -> BridgeResult<Vec<String>>;
}

/// Album cover access.
pub trait CoverArtProvider: Send + Sync {
    fn is_cover_image_file_exist(&self, track: TrackDescription) -> BridgeResult<bool>;

    /// Writes the cover of `track` to `target` as stored (no re-encoding).
    fn save_cover_to_file(&self, track: TrackDescription, target: &Path) -> BridgeResult<()>;
}

/// Listener registration.
pub trait EventSubscription: Send + Sync {
    fn register_listener(&self, listener: Listener) -> ListenerId;

    fn unregister_listener(&self, id: ListenerId) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Traits (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Everything an RPC frontend may call.
pub trait PlayerControl:
    PlaybackControl
    + PlayerStatus
    + PlayQueue
    + PlaylistQuery
    + TrackRating
    + PlaylistUpdate
    + PlaylistEditor
    + SupportedFormats
    + CoverArtProvider
    + EventSubscription
{
}

/// Blanket implementation for any type implementing every capability.
impl<T> PlayerControl for T where
    T: PlaybackControl
        + PlayerStatus
        + PlayQueue
        + PlaylistQuery
        + TrackRating
        + PlaylistUpdate
        + PlaylistEditor
        + SupportedFormats
        + CoverArtProvider
        + EventSubscription
{
}
