//! Stable identifiers and native handle translation.
//!
//! Callers address playlists and entries by process-scoped integers; the
//! engine addresses them by opaque handles. [`IdTranslator`] owns the
//! playlist side of that mapping as an append-only arena: a playlist id is
//! its slot index plus one, and released slots are tombstoned rather than
//! reused. Entry ids come from a process-wide counter and are mapped back to
//! native handles by the playlist cache.
//!
//! The raw value [`CURRENT`] (`-1`) is accepted wherever a caller passes a
//! raw id and means "whatever is playing right now".

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::engine::{NativeHandle, PlayingContext};
use crate::error::{BridgeError, BridgeResult};

/// Raw id sentinel meaning "the currently playing playlist or entry".
pub const CURRENT: i64 = -1;

/// Stable identifier of a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub i64);

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable identifier of a playlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

static NEXT_ENTRY_ID: AtomicI64 = AtomicI64::new(1);

impl EntryId {
    /// Allocates a fresh entry id, unique for the life of the process.
    pub(crate) fn allocate() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Raw `(playlist, entry)` pair as supplied by a caller.
///
/// Either half may be [`CURRENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescription {
    pub playlist_id: i64,
    pub entry_id: i64,
}

impl TrackDescription {
    #[must_use]
    pub fn new(playlist_id: i64, entry_id: i64) -> Self {
        Self {
            playlist_id,
            entry_id,
        }
    }

    /// The currently playing track.
    #[must_use]
    pub fn current() -> Self {
        Self::new(CURRENT, CURRENT)
    }
}

/// A [`TrackDescription`] with both halves resolved to stable ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTrack {
    pub playlist_id: PlaylistId,
    pub entry_id: EntryId,
}

fn slot_index(id: PlaylistId) -> Option<usize> {
    usize::try_from(id.0.checked_sub(1)?).ok()
}

#[derive(Default)]
struct Arena {
    /// `None` marks a released (tombstoned) slot.
    slots: Vec<Option<NativeHandle>>,
    by_handle: HashMap<NativeHandle, PlaylistId>,
}

/// Bidirectional playlist handle ↔ id table.
#[derive(Default)]
pub struct IdTranslator {
    arena: RwLock<Arena>,
}

impl IdTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stable id for `handle`, creating one on first sight.
    ///
    /// `probe` is asked whether a not-yet-mapped handle refers to a live
    /// playlist.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] if the handle is unknown and the
    /// probe reports it dead.
    pub fn to_stable_id(
        &self,
        handle: NativeHandle,
        probe: impl FnOnce(NativeHandle) -> bool,
    ) -> BridgeResult<PlaylistId> {
        if let Some(id) = self.arena.read().by_handle.get(&handle) {
            return Ok(*id);
        }
        if !probe(handle) {
            return Err(BridgeError::not_found(format!(
                "playlist handle {} is not live",
                handle
            )));
        }

        let mut arena = self.arena.write();
        if let Some(id) = arena.by_handle.get(&handle) {
            return Ok(*id);
        }
        arena.slots.push(Some(handle));
        let id = PlaylistId(arena.slots.len() as i64);
        arena.by_handle.insert(handle, id);
        log::debug!("[IdTranslator] Mapped handle {} to playlist {}", handle, id);
        Ok(id)
    }

    /// Returns the existing id for `handle` without creating one.
    pub fn lookup(&self, handle: NativeHandle) -> Option<PlaylistId> {
        self.arena.read().by_handle.get(&handle).copied()
    }

    /// Returns the native handle behind a stable id.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] for ids never issued or
    /// already released.
    pub fn to_native_handle(&self, id: PlaylistId) -> BridgeResult<NativeHandle> {
        let arena = self.arena.read();
        slot_index(id)
            .and_then(|index| arena.slots.get(index).copied().flatten())
            .ok_or_else(|| BridgeError::invalid(format!("unknown playlist id {}", id)))
    }

    /// Tombstones the slot behind `id`. Returns the handle it held.
    pub fn release(&self, id: PlaylistId) -> Option<NativeHandle> {
        let mut arena = self.arena.write();
        let index = slot_index(id)?;
        let handle = arena.slots.get_mut(index)?.take()?;
        arena.by_handle.remove(&handle);
        log::debug!("[IdTranslator] Released playlist {} (handle {})", id, handle);
        Some(handle)
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.arena.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a raw caller playlist id, honouring the [`CURRENT`] sentinel.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidArgument`] for `0`, values below `-1` and
    ///   unknown ids.
    /// - [`BridgeError::NotFound`] for [`CURRENT`] when nothing is playing.
    pub fn resolve_playlist(&self, raw: i64, ctx: &PlayingContext) -> BridgeResult<PlaylistId> {
        match raw {
            CURRENT => {
                let handle = ctx
                    .playlist
                    .ok_or_else(|| BridgeError::not_found("no playlist is playing"))?;
                self.lookup(handle).ok_or_else(|| {
                    BridgeError::not_found(format!("playing playlist {} is not tracked", handle))
                })
            }
            raw if raw > 0 => {
                let id = PlaylistId(raw);
                self.to_native_handle(id)?;
                Ok(id)
            }
            raw => Err(BridgeError::invalid(format!("invalid playlist id {}", raw))),
        }
    }

    /// Resolves a raw track description.
    ///
    /// `lookup_entry` maps the playing entry's native handle to its entry id
    /// within the resolved playlist. Positive entry ids are returned as is;
    /// the cache validates their membership.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidArgument`] for malformed ids, or for a
    ///   [`CURRENT`] entry paired with a playlist that is not playing.
    /// - [`BridgeError::NotFound`] for [`CURRENT`] when nothing is playing.
    pub fn resolve_track(
        &self,
        desc: TrackDescription,
        ctx: &PlayingContext,
        lookup_entry: impl FnOnce(PlaylistId, NativeHandle) -> Option<EntryId>,
    ) -> BridgeResult<ResolvedTrack> {
        let playlist_id = self.resolve_playlist(desc.playlist_id, ctx)?;

        let entry_id = match desc.entry_id {
            CURRENT => {
                let playing = ctx
                    .playlist
                    .and_then(|handle| self.lookup(handle))
                    .ok_or_else(|| BridgeError::not_found("no track is playing"))?;
                if playing != playlist_id {
                    return Err(BridgeError::invalid(format!(
                        "playlist {} is not the playing playlist",
                        playlist_id
                    )));
                }
                let handle = ctx
                    .entry
                    .ok_or_else(|| BridgeError::not_found("no track is playing"))?;
                lookup_entry(playlist_id, handle).ok_or_else(|| {
                    BridgeError::not_found(format!("playing entry {} is not cached", handle))
                })?
            }
            raw if raw > 0 => EntryId(raw),
            raw => return Err(BridgeError::invalid(format!("invalid entry id {}", raw))),
        };

        Ok(ResolvedTrack {
            playlist_id,
            entry_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(_: NativeHandle) -> bool {
        true
    }

    #[test]
    fn round_trip_and_stability() {
        let ids = IdTranslator::new();
        for raw in [0x10, 0xdead_beef, 7] {
            let handle = NativeHandle(raw);
            let id = ids.to_stable_id(handle, live).unwrap();
            assert_eq!(ids.to_native_handle(id).unwrap(), handle);
            assert_eq!(ids.to_stable_id(handle, |_| false).unwrap(), id);
        }
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn dead_handle_is_not_found() {
        let ids = IdTranslator::new();
        let err = ids.to_stable_id(NativeHandle(1), |_| false).unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(ids.is_empty());
    }

    #[test]
    fn released_ids_are_never_reused() {
        let ids = IdTranslator::new();
        let handle = NativeHandle(0x42);
        let first = ids.to_stable_id(handle, live).unwrap();
        assert_eq!(ids.release(first), Some(handle));
        assert_eq!(ids.release(first), None);

        assert_eq!(ids.to_native_handle(first).unwrap_err().code(), "invalid_argument");
        let second = ids.to_stable_id(handle, live).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_id_is_invalid_argument() {
        let ids = IdTranslator::new();
        for raw in [0, -5, 999] {
            let err = ids.to_native_handle(PlaylistId(raw)).unwrap_err();
            assert_eq!(err.code(), "invalid_argument");
        }
    }

    #[test]
    fn current_sentinel_resolves_against_playing_context() {
        let ids = IdTranslator::new();
        let playing = ids.to_stable_id(NativeHandle(1), live).unwrap();
        let other = ids.to_stable_id(NativeHandle(2), live).unwrap();
        let ctx = PlayingContext {
            playlist: Some(NativeHandle(1)),
            entry: Some(NativeHandle(100)),
        };

        assert_eq!(ids.resolve_playlist(CURRENT, &ctx).unwrap(), playing);
        assert_eq!(ids.resolve_playlist(other.0, &ctx).unwrap(), other);
        assert_eq!(ids.resolve_playlist(0, &ctx).unwrap_err().code(), "invalid_argument");
        assert_eq!(ids.resolve_playlist(-2, &ctx).unwrap_err().code(), "invalid_argument");

        let track = ids
            .resolve_track(TrackDescription::current(), &ctx, |_, h| {
                (h == NativeHandle(100)).then_some(EntryId(55))
            })
            .unwrap();
        assert_eq!(track.playlist_id, playing);
        assert_eq!(track.entry_id, EntryId(55));

        let err = ids
            .resolve_track(TrackDescription::new(other.0, CURRENT), &ctx, |_, _| None)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn current_sentinel_with_nothing_playing_is_not_found() {
        let ids = IdTranslator::new();
        let ctx = PlayingContext::default();
        assert_eq!(ids.resolve_playlist(CURRENT, &ctx).unwrap_err().code(), "not_found");
        let err = ids
            .resolve_track(TrackDescription::current(), &ctx, |_, _| None)
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn entry_ids_are_monotonic() {
        let a = EntryId::allocate();
        let b = EntryId::allocate();
        assert!(b > a);
    }
}
