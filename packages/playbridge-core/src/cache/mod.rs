//! Playlist and entry metadata cache.
//!
//! The cache keeps one [`PlaylistRecord`] per tracked playlist in memory and
//! the full entry rows in SQLite. A reload fetches from the engine without
//! holding any lock, writes the new rows in one transaction, swaps the
//! in-memory record and only then drops the previous rows. Concurrent readers
//! see either the old or the new playlist, never a mix.
//!
//! # Lifecycle
//!
//! ```text
//! Discovered ──► Loading ──► Ready ──► Stale ──► Reloading ──► Ready
//!                   │                    ▲           │
//!                   └────── failure ─────┴───────────┘
//! any state ──► Removed
//! ```

mod checksum;
mod field;
mod store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::engine::{EngineAdapter, NativeHandle, PlaylistData};
use crate::error::{BridgeError, BridgeResult};
use crate::ids::{EntryId, PlaylistId};

pub use checksum::playlist_checksum;
pub use field::{EntryField, FieldValue};
pub use store::{EntryRecord, PlaylistStore, StoredPlaylist};

/// Lifecycle state of a cached playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaylistState {
    Discovered,
    Loading,
    Ready,
    Stale,
    Reloading,
    Removed,
}

/// Caller-facing snapshot of a cached playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub id: PlaylistId,
    #[serde(skip)]
    pub native_handle: NativeHandle,
    pub title: String,
    pub entry_count: usize,
    pub checksum: u32,
    pub locked: bool,
    pub state: PlaylistState,
}

/// Result of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Content was replaced; entry ids were renumbered.
    Changed { checksum: u32 },
    /// Engine content matched the cached checksum; rows and ids were kept.
    Unchanged { checksum: u32 },
    /// Another reload of the playlist is in flight; it will run once more.
    Deferred,
}

#[derive(Debug, Clone)]
struct PlaylistRecord {
    info: PlaylistInfo,
    /// `(entry id, native handle)` in playlist order.
    entries: Arc<Vec<(EntryId, NativeHandle)>>,
    /// Whether `info.checksum` reflects a completed load.
    loaded: bool,
}

#[derive(Debug, Default)]
struct ReloadSlot {
    in_flight: bool,
    rerun: bool,
}

pub struct PlaylistCache {
    engine: Arc<EngineAdapter>,
    store: PlaylistStore,
    playlists: DashMap<PlaylistId, Arc<PlaylistRecord>>,
    /// Discovery order.
    order: RwLock<Vec<PlaylistId>>,
    reloads: Mutex<HashMap<PlaylistId, ReloadSlot>>,
}

impl PlaylistCache {
    /// Creates a cache backed by a store at `database_path` (in memory if `None`).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Persistence`] if the store cannot be opened.
    pub fn open(engine: Arc<EngineAdapter>, database_path: Option<&Path>) -> BridgeResult<Self> {
        Ok(Self {
            engine,
            store: PlaylistStore::open(database_path)?,
            playlists: DashMap::new(),
            order: RwLock::new(Vec::new()),
            reloads: Mutex::new(HashMap::new()),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts tracking a playlist in the `Discovered` state.
    ///
    /// Returns `false` if it was already tracked.
    pub fn register(&self, id: PlaylistId, handle: NativeHandle) -> bool {
        if self.playlists.contains_key(&id) {
            return false;
        }
        let record = PlaylistRecord {
            info: PlaylistInfo {
                id,
                native_handle: handle,
                title: String::new(),
                entry_count: 0,
                checksum: 0,
                locked: false,
                state: PlaylistState::Discovered,
            },
            entries: Arc::new(Vec::new()),
            loaded: false,
        };
        self.playlists.insert(id, Arc::new(record));
        self.order.write().push(id);
        log::debug!("[PlaylistCache] Discovered playlist {} ({})", id, handle);
        true
    }

    /// Marks a `Ready` playlist as out of date.
    pub fn mark_stale(&self, id: PlaylistId) {
        self.update(id, |record| {
            if record.info.state == PlaylistState::Ready {
                record.info.state = PlaylistState::Stale;
            }
        });
    }

    /// Reloads a playlist from the engine.
    ///
    /// A request arriving while a reload of the same playlist is in flight
    /// returns [`ReloadOutcome::Deferred`] and makes the in-flight reload run
    /// exactly one more pass. On failure the playlist becomes `Stale`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidArgument`] if the playlist is not tracked.
    /// - [`BridgeError::EngineCallFailed`] if fetching from the engine fails.
    /// - [`BridgeError::Persistence`] if writing the store fails.
    pub fn reload(&self, id: PlaylistId) -> BridgeResult<ReloadOutcome> {
        self.record(id)?;
        {
            let mut reloads = self.reloads.lock();
            let slot = reloads.entry(id).or_default();
            if slot.in_flight {
                slot.rerun = true;
                log::debug!("[PlaylistCache] Reload of playlist {} deferred", id);
                return Ok(ReloadOutcome::Deferred);
            }
            slot.in_flight = true;
        }

        loop {
            self.update(id, |record| {
                record.info.state = if record.loaded {
                    PlaylistState::Reloading
                } else {
                    PlaylistState::Loading
                };
            });

            let result = self.reload_once(id);
            if let Err(e) = &result {
                log::warn!("[PlaylistCache] Reload of playlist {} failed: {}", id, e);
                self.update(id, |record| record.info.state = PlaylistState::Stale);
            }

            let rerun = {
                let mut reloads = self.reloads.lock();
                match reloads.get_mut(&id) {
                    Some(slot) if slot.rerun => {
                        slot.rerun = false;
                        true
                    }
                    Some(slot) => {
                        slot.in_flight = false;
                        false
                    }
                    None => false,
                }
            };
            if !rerun {
                return result;
            }
            log::debug!("[PlaylistCache] Running follow-up reload of playlist {}", id);
        }
    }

    fn reload_once(&self, id: PlaylistId) -> BridgeResult<ReloadOutcome> {
        let handle = self.record(id)?.info.native_handle;
        let data = self.engine.fetch_playlist(handle)?;
        let checksum = playlist_checksum(&data);

        let current = self.record(id)?;
        if current.loaded
            && current.info.checksum == checksum
            && current.entries.len() == data.entries.len()
        {
            return self.keep_entries(id, &current, &data, checksum);
        }

        let rows: Vec<EntryRecord> = data
            .entries
            .into_iter()
            .enumerate()
            .map(|(position, data)| EntryRecord {
                id: EntryId::allocate(),
                playlist_id: id,
                position,
                data,
            })
            .collect();
        self.store.insert_generation(id, checksum, &data.title, &rows)?;

        let entries: Vec<_> = rows.iter().map(|row| (row.id, row.data.handle)).collect();
        let count = entries.len();
        let entries = Arc::new(entries);
        let mut retired = Arc::new(Vec::new());
        let swapped = self.update(id, |record| {
            record.info.title = data.title.clone();
            record.info.entry_count = count;
            record.info.checksum = checksum;
            record.info.state = PlaylistState::Ready;
            retired = std::mem::replace(&mut record.entries, Arc::clone(&entries));
            record.loaded = true;
        });
        if !swapped {
            // Removed while fetching.
            self.store.remove_playlist(id)?;
            return Err(BridgeError::invalid(format!("playlist {} was removed", id)));
        }

        let retired: Vec<EntryId> = retired.iter().map(|(entry, _)| *entry).collect();
        if let Err(e) = self.store.retire_entries(&retired) {
            log::warn!(
                "[PlaylistCache] Could not drop {} superseded rows of playlist {}: {}",
                retired.len(),
                id,
                e
            );
        }

        log::debug!(
            "[PlaylistCache] Reloaded playlist {} '{}': {} entries, checksum {:08x}",
            id,
            data.title,
            count,
            checksum
        );
        Ok(ReloadOutcome::Changed { checksum })
    }

    /// Same content as cached: ids are kept, but the engine may have replaced
    /// entries with identical copies under new handles.
    fn keep_entries(
        &self,
        id: PlaylistId,
        current: &PlaylistRecord,
        data: &PlaylistData,
        checksum: u32,
    ) -> BridgeResult<ReloadOutcome> {
        let rebound: Vec<(EntryId, NativeHandle)> = current
            .entries
            .iter()
            .zip(&data.entries)
            .map(|((entry, _), fetched)| (*entry, fetched.handle))
            .collect();

        if rebound == *current.entries {
            self.update(id, |record| record.info.state = PlaylistState::Ready);
            log::trace!("[PlaylistCache] Playlist {} unchanged ({:08x})", id, checksum);
            return Ok(ReloadOutcome::Unchanged { checksum });
        }

        self.store.rebind_handles(&rebound)?;
        let rebound = Arc::new(rebound);
        self.update(id, |record| {
            record.entries = Arc::clone(&rebound);
            record.info.state = PlaylistState::Ready;
        });
        log::debug!(
            "[PlaylistCache] Playlist {} unchanged ({:08x}), entries moved to new handles",
            id,
            checksum
        );
        Ok(ReloadOutcome::Unchanged { checksum })
    }

    /// Purges the cached entry rows of a playlist; it stays tracked as `Stale`.
    pub fn remove_entries(&self, id: PlaylistId) -> BridgeResult<()> {
        self.record(id)?;
        self.store.remove_entries(id)?;
        self.update(id, |record| {
            record.entries = Arc::new(Vec::new());
            record.info.entry_count = 0;
            record.info.state = PlaylistState::Stale;
            record.loaded = false;
        });
        Ok(())
    }

    /// Stops tracking a playlist and purges its rows.
    pub fn remove_playlist(&self, id: PlaylistId) -> BridgeResult<()> {
        self.update(id, |record| record.info.state = PlaylistState::Removed);
        if self.playlists.remove(&id).is_none() {
            return Err(BridgeError::invalid(format!("unknown playlist id {}", id)));
        }
        self.order.write().retain(|other| *other != id);
        self.reloads.lock().remove(&id);
        self.store.remove_playlist(id)?;
        log::debug!("[PlaylistCache] Removed playlist {}", id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edit lock
    // ─────────────────────────────────────────────────────────────────────────

    /// Takes the engine's edit lock on a playlist.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineCallFailed`] if the engine refuses.
    pub fn lock(&self, id: PlaylistId) -> BridgeResult<()> {
        let handle = self.record(id)?.info.native_handle;
        self.engine.lock(handle)?;
        self.update(id, |record| record.info.locked = true);
        Ok(())
    }

    pub fn unlock(&self, id: PlaylistId) -> BridgeResult<()> {
        let handle = self.record(id)?.info.native_handle;
        self.engine.unlock(handle)?;
        self.update(id, |record| record.info.locked = false);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_field(&self, entry: EntryId, field: &str) -> BridgeResult<FieldValue> {
        let field = EntryField::parse(field)?;
        self.store
            .entry_field(entry, field)?
            .ok_or_else(|| BridgeError::invalid(format!("unknown entry id {}", entry)))
    }

    pub fn get_string(&self, entry: EntryId, field: &str) -> BridgeResult<String> {
        Ok(self.get_field(entry, field)?.into_string())
    }

    pub fn get_i32(&self, entry: EntryId, field: &str) -> BridgeResult<i32> {
        self.get_field(entry, field)?.as_i32()
    }

    pub fn get_i64(&self, entry: EntryId, field: &str) -> BridgeResult<i64> {
        self.get_field(entry, field)?.as_i64()
    }

    pub fn get_f64(&self, entry: EntryId, field: &str) -> BridgeResult<f64> {
        self.get_field(entry, field)?.as_f64()
    }

    pub fn get_checksum(&self, id: PlaylistId) -> BridgeResult<u32> {
        Ok(self.record(id)?.info.checksum)
    }

    pub fn playlist(&self, id: PlaylistId) -> BridgeResult<PlaylistInfo> {
        Ok(self.record(id)?.info.clone())
    }

    /// All tracked playlists in discovery order.
    pub fn playlists(&self) -> Vec<PlaylistInfo> {
        self.order
            .read()
            .iter()
            .filter_map(|id| self.playlists.get(id).map(|r| r.info.clone()))
            .collect()
    }

    /// Entry ids of a playlist in playlist order.
    pub fn entries(&self, id: PlaylistId) -> BridgeResult<Vec<EntryId>> {
        Ok(self.record(id)?.entries.iter().map(|(entry, _)| *entry).collect())
    }

    pub fn entry_count(&self, id: PlaylistId) -> BridgeResult<usize> {
        Ok(self.record(id)?.info.entry_count)
    }

    pub fn entry(&self, entry: EntryId) -> BridgeResult<EntryRecord> {
        self.store
            .entry(entry)?
            .ok_or_else(|| BridgeError::invalid(format!("unknown entry id {}", entry)))
    }

    /// Owning playlist and native handle of an entry.
    ///
    /// Only entries of the playlist's current generation resolve.
    pub fn locate_entry(&self, entry: EntryId) -> BridgeResult<(PlaylistId, NativeHandle)> {
        let unknown = || BridgeError::invalid(format!("unknown entry id {}", entry));
        let playlist = self.store.entry_playlist(entry)?.ok_or_else(unknown)?;
        let record = self.record(playlist).map_err(|_| unknown())?;
        record
            .entries
            .iter()
            .find(|(id, _)| *id == entry)
            .map(|(_, handle)| (playlist, *handle))
            .ok_or_else(unknown)
    }

    /// Entry id of the entry with native handle `handle` in playlist `id`.
    pub fn find_entry(&self, id: PlaylistId, handle: NativeHandle) -> Option<EntryId> {
        let record = self.playlists.get(&id)?;
        record
            .entries
            .iter()
            .find(|(_, h)| *h == handle)
            .map(|(entry, _)| *entry)
    }

    pub fn state(&self, id: PlaylistId) -> Option<PlaylistState> {
        self.playlists.get(&id).map(|r| r.info.state)
    }

    pub fn contains(&self, id: PlaylistId) -> bool {
        self.playlists.contains_key(&id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn record(&self, id: PlaylistId) -> BridgeResult<Arc<PlaylistRecord>> {
        self.playlists
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| BridgeError::invalid(format!("unknown playlist id {}", id)))
    }

    /// Replaces a record with a modified copy. Returns `false` if untracked.
    fn update(&self, id: PlaylistId, f: impl FnOnce(&mut PlaylistRecord)) -> bool {
        match self.playlists.get_mut(&id) {
            Some(mut slot) => {
                let mut record = PlaylistRecord::clone(slot.value());
                f(&mut record);
                *slot = Arc::new(record);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimEngine;

    fn setup() -> (SimEngine, PlaylistCache, PlaylistId, NativeHandle) {
        let sim = SimEngine::new();
        let handle = sim.add_playlist("Road Trip", &["a.mp3", "b.mp3", "c.mp3"]);
        let engine = Arc::new(EngineAdapter::select(sim.classic()).unwrap());
        let cache = PlaylistCache::open(engine, None).unwrap();
        let id = PlaylistId(7);
        cache.register(id, handle);
        (sim, cache, id, handle)
    }

    #[test]
    fn first_reload_moves_discovered_to_ready() {
        let (_sim, cache, id, _) = setup();
        assert_eq!(cache.state(id), Some(PlaylistState::Discovered));

        let outcome = cache.reload(id).unwrap();
        assert!(matches!(outcome, ReloadOutcome::Changed { .. }));
        assert_eq!(cache.state(id), Some(PlaylistState::Ready));
        assert_eq!(cache.entry_count(id).unwrap(), 3);
        assert_eq!(cache.playlist(id).unwrap().title, "Road Trip");
    }

    #[test]
    fn checksum_changes_only_with_content() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        let c1 = cache.get_checksum(id).unwrap();
        let ids_before = cache.entries(id).unwrap();

        assert_eq!(
            cache.reload(id).unwrap(),
            ReloadOutcome::Unchanged { checksum: c1 }
        );
        assert_eq!(cache.entries(id).unwrap(), ids_before);

        sim.append_entry(handle, "d.mp3");
        let outcome = cache.reload(id).unwrap();
        let c2 = cache.get_checksum(id).unwrap();
        assert_eq!(outcome, ReloadOutcome::Changed { checksum: c2 });
        assert_ne!(c1, c2);
        assert_eq!(cache.entry_count(id).unwrap(), 4);
    }

    #[test]
    fn removed_entry_fields_are_invalid() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        let stale = cache.entries(id).unwrap()[0];
        assert_eq!(cache.get_string(stale, "filename").unwrap(), "a.mp3");

        sim.remove_entry_at(handle, 0);
        cache.reload(id).unwrap();
        let err = cache.get_field(stale, "filename").unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert_eq!(
            cache.get_field(EntryId(i64::MAX), "filename").unwrap_err().code(),
            "invalid_argument"
        );
    }

    #[test]
    fn reload_requested_mid_fetch_runs_once_more() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        let cache = Arc::new(cache);
        let fetches = sim.call_count("StorageGetTitle");

        let nested = Arc::new(Mutex::new(None));
        {
            let cache = Arc::clone(&cache);
            let nested = Arc::clone(&nested);
            let engine = sim.clone();
            // Fires after the first pass has read the entry count.
            sim.on_next_call("EntryGetInfo", move || {
                engine.append_entry(handle, "d.mp3");
                *nested.lock() = Some(cache.reload(id));
            });
        }

        let outcome = cache.reload(id).unwrap();
        assert_eq!(nested.lock().take().unwrap().unwrap(), ReloadOutcome::Deferred);
        assert_eq!(sim.call_count("StorageGetTitle"), fetches + 2);
        assert!(matches!(outcome, ReloadOutcome::Changed { .. }));
        assert_eq!(cache.state(id), Some(PlaylistState::Ready));
        assert_eq!(cache.entry_count(id).unwrap(), 4);

        cache.reload(id).unwrap();
        assert_eq!(sim.call_count("StorageGetTitle"), fetches + 3);
    }

    #[test]
    fn replaced_entries_with_same_content_keep_ids() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        let ids = cache.entries(id).unwrap();
        let c1 = cache.get_checksum(id).unwrap();

        sim.remove_entry_at(handle, 2);
        let fresh = sim.append_entry(handle, "c.mp3");
        assert_eq!(
            cache.reload(id).unwrap(),
            ReloadOutcome::Unchanged { checksum: c1 }
        );

        assert_eq!(cache.entries(id).unwrap(), ids);
        assert_eq!(cache.locate_entry(ids[2]).unwrap(), (id, fresh));
        assert_eq!(cache.find_entry(id, fresh), Some(ids[2]));
        assert_eq!(cache.entry(ids[2]).unwrap().data.handle, fresh);
    }

    #[test]
    fn superseded_ids_stop_resolving_after_swap() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        let old = cache.entries(id).unwrap();

        sim.append_entry(handle, "d.mp3");
        cache.reload(id).unwrap();
        let new = cache.entries(id).unwrap();
        assert!(old.iter().all(|entry| !new.contains(entry)));
        assert_eq!(cache.locate_entry(old[0]).unwrap_err().code(), "invalid_argument");
        assert!(cache.entry(old[0]).is_err());
        assert_eq!(cache.get_string(new[3], "filename").unwrap(), "d.mp3");
    }

    #[test]
    fn typed_accessors() {
        let (_sim, cache, id, _) = setup();
        cache.reload(id).unwrap();
        let entry = cache.entries(id).unwrap()[1];

        assert_eq!(cache.get_i32(entry, "position").unwrap(), 1);
        assert_eq!(cache.get_i64(entry, "playlist_id").unwrap(), 7);
        assert!(cache.get_f64(entry, "rating").unwrap() >= 0.0);
        assert_eq!(cache.get_field(entry, "nope").unwrap_err().code(), "invalid_argument");
    }

    #[test]
    fn engine_failure_marks_stale_and_keeps_rows() {
        let (sim, cache, id, _) = setup();
        cache.reload(id).unwrap();
        let entries = cache.entries(id).unwrap();

        sim.fail_next("StorageGetTitle");
        let err = cache.reload(id).unwrap_err();
        assert_eq!(err.code(), "engine_call_failed");
        assert_eq!(cache.state(id), Some(PlaylistState::Stale));
        assert_eq!(cache.entries(id).unwrap(), entries);
        assert!(cache.get_field(entries[0], "filename").is_ok());

        cache.reload(id).unwrap();
        assert_eq!(cache.state(id), Some(PlaylistState::Ready));
    }

    #[test]
    fn reload_while_locked_refreshes_cache() {
        let (sim, cache, id, handle) = setup();
        cache.reload(id).unwrap();
        cache.lock(id).unwrap();
        assert!(cache.playlist(id).unwrap().locked);

        sim.append_entry(handle, "d.mp3");
        cache.reload(id).unwrap();
        assert_eq!(cache.entry_count(id).unwrap(), 4);
        assert!(cache.playlist(id).unwrap().locked);

        cache.unlock(id).unwrap();
        assert!(!cache.playlist(id).unwrap().locked);
    }

    #[test]
    fn engine_rejecting_lock_is_engine_call_failed() {
        let (sim, cache, id, handle) = setup();
        sim.lock_externally(handle);
        assert_eq!(cache.lock(id).unwrap_err().code(), "engine_call_failed");
        assert!(!cache.playlist(id).unwrap().locked);
    }

    #[test]
    fn remove_playlist_purges_everything() {
        let (_sim, cache, id, _) = setup();
        cache.reload(id).unwrap();
        let entry = cache.entries(id).unwrap()[0];

        cache.remove_playlist(id).unwrap();
        assert!(!cache.contains(id));
        assert!(cache.playlists().is_empty());
        assert_eq!(cache.get_checksum(id).unwrap_err().code(), "invalid_argument");
        assert_eq!(cache.get_field(entry, "filename").unwrap_err().code(), "invalid_argument");
        assert_eq!(cache.reload(id).unwrap_err().code(), "invalid_argument");
    }

    #[test]
    fn remove_entries_leaves_playlist_stale() {
        let (_sim, cache, id, _) = setup();
        cache.reload(id).unwrap();
        cache.remove_entries(id).unwrap();
        assert_eq!(cache.entry_count(id).unwrap(), 0);
        assert_eq!(cache.state(id), Some(PlaylistState::Stale));

        cache.reload(id).unwrap();
        assert_eq!(cache.entry_count(id).unwrap(), 3);
    }

    #[test]
    fn locate_and_find_entries() {
        let (_sim, cache, id, _) = setup();
        cache.reload(id).unwrap();
        let entry = cache.entries(id).unwrap()[2];
        let (playlist, handle) = cache.locate_entry(entry).unwrap();
        assert_eq!(playlist, id);
        assert_eq!(cache.find_entry(id, handle), Some(entry));
        assert_eq!(cache.entry(entry).unwrap().data.filename, "c.mp3");
    }
}
