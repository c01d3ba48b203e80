//! Normalized events delivered to subscribers.
//!
//! This module provides:
//! - [`PlayerEvent`], the version-independent event type listeners receive
//! - [`ListenerBus`], the subscriber registry and fan-out
//!
//! Raw engine notifications live in [`crate::engine::notifications`]; the
//! manager translates them into [`PlayerEvent`]s on the dispatch context.

mod bus;

pub use bus::{Listener, ListenerBus, ListenerError, ListenerId, ListenerResult};

use serde::Serialize;

use crate::engine::{PlaybackState, Status, StatusValue};
use crate::ids::{PlaylistId, ResolvedTrack};

/// Events published to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Playback started, stopped or paused.
    PlaybackStateChanged {
        state: PlaybackState,
    },
    /// A different track is playing (`None` when nothing is).
    TrackChanged {
        track: Option<ResolvedTrack>,
    },
    /// A player status value changed.
    StatusChanged {
        status: Status,
        value: StatusValue,
    },
    /// The engine created a playlist.
    PlaylistAdded {
        #[serde(rename = "playlistId")]
        playlist_id: PlaylistId,
    },
    /// The engine destroyed a playlist.
    PlaylistRemoved {
        #[serde(rename = "playlistId")]
        playlist_id: PlaylistId,
    },
    /// A reload replaced the cached content of a playlist.
    PlaylistContentChanged {
        #[serde(rename = "playlistId")]
        playlist_id: PlaylistId,
        checksum: u32,
    },
    /// Another playlist became the active one in the engine UI.
    ActivePlaylistChanged {
        #[serde(rename = "playlistId")]
        playlist_id: PlaylistId,
    },
    /// A debounced reload failed; the playlist is stale until the next change.
    PlaylistReloadFailed {
        #[serde(rename = "playlistId")]
        playlist_id: PlaylistId,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EntryId;

    #[test]
    fn events_serialize_with_camel_case_tags() {
        let json = serde_json::to_value(PlayerEvent::PlaylistContentChanged {
            playlist_id: PlaylistId(7),
            checksum: 42,
        })
        .unwrap();
        assert_eq!(json["type"], "playlistContentChanged");
        assert_eq!(json["playlistId"], 7);
        assert_eq!(json["checksum"], 42);

        let json = serde_json::to_value(PlayerEvent::StatusChanged {
            status: Status::RadioCapture,
            value: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "statusChanged");
        assert_eq!(json["status"], "radioCapture");
    }

    #[test]
    fn track_changed_carries_resolved_ids() {
        let json = serde_json::to_value(PlayerEvent::TrackChanged {
            track: Some(ResolvedTrack {
                playlist_id: PlaylistId(3),
                entry_id: EntryId(12),
            }),
        })
        .unwrap();
        assert_eq!(json["track"]["playlistId"], 3);
        assert_eq!(json["track"]["entryId"], 12);
    }
}
