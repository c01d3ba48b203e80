//! The owned playbridge context.
//!
//! [`PlayerManager`] is constructed once per process with
//! [`PlayerManager::initialize`] and torn down with
//! [`PlayerManager::finalize`]. It wires the engine adapter, id translator,
//! playlist cache, change coalescer, dispatch queue and listener bus
//! together, implements every capability trait and runs the dispatch
//! context whenever the host calls [`PlayerManager::on_tick`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::{FieldValue, PlaylistCache, PlaylistInfo, ReloadOutcome};
use crate::capabilities::{
    CoverArtProvider, EventSubscription, PlayQueue, PlaybackControl, PlayerStatus, PlaylistEditor,
    PlaylistQuery, PlaylistUpdate, SupportedFormats, TrackRating,
};
use crate::clock::{Clock, SystemClock};
use crate::coalescer::ChangeCoalescer;
use crate::config::BridgeConfig;
use crate::dispatch::{DispatchItem, DispatchQueue, EngineCallbacks};
use crate::engine::{
    CoverArt, EngineAdapter, NativeEngine, NativeHandle, PlaybackState, PlayerNotification,
    SourceType, Status, StatusValue, StorageEvent,
};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{Listener, ListenerBus, ListenerId, ListenerResult, PlayerEvent};
use crate::ids::{EntryId, IdTranslator, PlaylistId, ResolvedTrack, TrackDescription};

/// Last values seen by the dispatch context, used to detect changes the
/// engine does not announce.
#[derive(Debug, Default)]
struct Observed {
    playback: Option<PlaybackState>,
    track: Option<Option<ResolvedTrack>>,
    statuses: HashMap<Status, StatusValue>,
}

/// An entry resolved down to native handles.
struct EntryRef {
    track: ResolvedTrack,
    playlist: NativeHandle,
    entry: NativeHandle,
}

pub struct PlayerManager {
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
    engine: Arc<EngineAdapter>,
    ids: IdTranslator,
    cache: PlaylistCache,
    coalescer: Mutex<ChangeCoalescer>,
    bus: ListenerBus,
    queue: DispatchQueue,
    observed: Mutex<Observed>,
    /// Held for the duration of a tick; a nested tick is skipped.
    tick_guard: Mutex<()>,
}

impl PlayerManager {
    /// Starts the bridge against the given engine.
    ///
    /// Opens the playlist store, selects the engine adapter and loads every
    /// playlist the engine reports.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Configuration`] for an invalid config or an
    ///   unsupported engine.
    /// - [`BridgeError::Persistence`] if the store cannot be opened.
    pub fn initialize(config: BridgeConfig, native: NativeEngine) -> BridgeResult<Self> {
        Self::initialize_with_clock(config, native, SystemClock::arc())
    }

    /// Like [`PlayerManager::initialize`] with an explicit time source.
    pub fn initialize_with_clock(
        config: BridgeConfig,
        native: NativeEngine,
        clock: Arc<dyn Clock>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        log::info!("[PlayerManager] Initializing...");

        let engine = Arc::new(EngineAdapter::select(native)?);
        let cache = PlaylistCache::open(Arc::clone(&engine), config.database_path.as_deref())?;

        let manager = Self {
            coalescer: Mutex::new(ChangeCoalescer::new(config.min_update_interval())),
            config,
            clock,
            engine,
            ids: IdTranslator::new(),
            cache,
            bus: ListenerBus::new(),
            queue: DispatchQueue::new(),
            observed: Mutex::new(Observed::default()),
            tick_guard: Mutex::new(()),
        };

        let now = manager.clock.now();
        match manager.engine.playlists() {
            Ok(handles) => {
                for handle in handles {
                    if let Err(e) = manager.discover(handle, now) {
                        log::warn!("[PlayerManager] Skipping playlist {}: {}", handle, e);
                    }
                }
            }
            Err(e) => log::warn!("[PlayerManager] Failed to enumerate playlists: {}", e),
        }
        manager.observe(false);

        log::info!(
            "[PlayerManager] Ready: {} playlist(s), engine {}",
            manager.ids.len(),
            manager.engine.version()
        );
        Ok(manager)
    }

    /// Shuts the bridge down.
    ///
    /// Pending debounce timers are cancelled, queued notifications dropped
    /// and listeners released.
    pub fn finalize(self) {
        log::info!("[PlayerManager] Finalizing...");
        let dropped = self.queue.close();
        if !dropped.is_empty() {
            log::debug!("[PlayerManager] Dropped {} queued item(s)", dropped.len());
        }
        {
            let mut coalescer = self.coalescer.lock();
            for info in self.cache.playlists() {
                coalescer.cancel(info.id);
            }
        }
        let listeners = self.bus.clear();
        log::info!(
            "[PlayerManager] Finalized ({} listener(s) released)",
            listeners
        );
    }

    /// Notification sink to hand to the engine.
    pub fn callbacks(&self) -> EngineCallbacks {
        self.queue.callbacks()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Version string of the running engine.
    pub fn engine_version(&self) -> String {
        self.engine.version()
    }

    /// Subscribes a closure to player events.
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// Explicitly reloads a playlist, bypassing the debounce.
    pub fn reload(&self, playlist: i64) -> BridgeResult<ReloadOutcome> {
        let id = self.resolve_playlist(playlist)?;
        self.cache.reload(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch context
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one pass of the dispatch context.
    ///
    /// Drains queued engine notifications, fires due debounce timers and,
    /// when enabled, detects playback, track and status changes the engine
    /// did not announce. Listeners are invoked from here only.
    pub fn on_tick(&self) {
        let Some(_guard) = self.tick_guard.try_lock() else {
            log::trace!("[PlayerManager] Nested tick skipped");
            return;
        };
        let now = self.clock.now();

        for item in self.queue.drain() {
            self.handle_item(item, now);
        }

        let due = self.coalescer.lock().take_due(now);
        for (id, flags) in due {
            log::debug!("[PlayerManager] Debounced reload of playlist {} ({:?})", id, flags);
            self.fire_reload(id);
        }

        if self.config.track_status_changes {
            self.observe(true);
        }
    }

    fn handle_item(&self, item: DispatchItem, now: Instant) {
        match item {
            DispatchItem::Storage(event) => self.handle_storage(event, now),
            DispatchItem::Player(notification) => self.handle_player(notification),
            DispatchItem::Publish(event) => {
                self.bus.publish(&event);
            }
        }
    }

    fn handle_storage(&self, event: StorageEvent, now: Instant) {
        tracing::trace!(?event, "storage_event");
        match event {
            StorageEvent::Added(handle) => match self.discover(handle, now) {
                Ok(id) => {
                    self.bus.publish(&PlayerEvent::PlaylistAdded { playlist_id: id });
                }
                Err(e) => log::debug!("[PlayerManager] Ignoring added storage {}: {}", handle, e),
            },
            StorageEvent::Removed(handle) => {
                let Some(id) = self.ids.lookup(handle) else {
                    return;
                };
                self.coalescer.lock().cancel(id);
                if let Err(e) = self.cache.remove_playlist(id) {
                    log::warn!("[PlayerManager] Failed to purge playlist {}: {}", id, e);
                }
                self.ids.release(id);
                log::info!("[PlayerManager] Playlist {} removed", id);
                self.bus.publish(&PlayerEvent::PlaylistRemoved { playlist_id: id });
            }
            StorageEvent::Changed(handle, flags) => {
                let id = match self.ids.lookup(handle) {
                    Some(id) if self.cache.contains(id) => id,
                    _ => {
                        // Never saw it added; pick it up now.
                        if let Ok(id) = self.discover(handle, now) {
                            self.bus.publish(&PlayerEvent::PlaylistAdded { playlist_id: id });
                        }
                        return;
                    }
                };
                if flags.needs_reload() {
                    self.cache.mark_stale(id);
                    self.coalescer.lock().on_change(id, flags, now);
                }
            }
            StorageEvent::Activated(handle) => {
                if let Some(id) = self.ids.lookup(handle) {
                    self.bus
                        .publish(&PlayerEvent::ActivePlaylistChanged { playlist_id: id });
                }
            }
        }
    }

    fn handle_player(&self, notification: PlayerNotification) {
        match notification {
            PlayerNotification::PlaybackStateChanged => match self.engine.playback_state() {
                Ok(state) => {
                    self.observed.lock().playback = Some(state);
                    self.bus.publish(&PlayerEvent::PlaybackStateChanged { state });
                }
                Err(e) => log::debug!("[PlayerManager] Playback state unavailable: {}", e),
            },
            PlayerNotification::TrackChanged => {
                let track = self.current_track();
                self.observed.lock().track = Some(track);
                self.bus.publish(&PlayerEvent::TrackChanged { track });
            }
            // The engine does not say which status changed.
            PlayerNotification::StatusChanged => self.observe_statuses(true),
        }
    }

    /// Registers and loads a playlist the first time its handle is seen.
    fn discover(&self, handle: NativeHandle, now: Instant) -> BridgeResult<PlaylistId> {
        let engine = &self.engine;
        let id = self.ids.to_stable_id(handle, |h| engine.is_valid(h))?;
        if !self.cache.register(id, handle) {
            return Ok(id);
        }
        self.coalescer.lock().track(id, now);
        if let Err(e) = self.cache.reload(id) {
            self.bus.publish(&PlayerEvent::PlaylistReloadFailed {
                playlist_id: id,
                reason: e.to_string(),
            });
        }
        log::info!("[PlayerManager] Playlist {} discovered ({})", id, handle);
        Ok(id)
    }

    fn fire_reload(&self, id: PlaylistId) {
        if !self.cache.contains(id) {
            return;
        }
        match self.cache.reload(id) {
            Ok(ReloadOutcome::Changed { checksum }) => {
                self.bus.publish(&PlayerEvent::PlaylistContentChanged {
                    playlist_id: id,
                    checksum,
                });
            }
            Ok(ReloadOutcome::Unchanged { .. }) | Ok(ReloadOutcome::Deferred) => {}
            Err(e) => {
                self.bus.publish(&PlayerEvent::PlaylistReloadFailed {
                    playlist_id: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Compares the engine's current state with the last observed one and,
    /// with `publish`, notifies listeners of every difference.
    fn observe(&self, publish: bool) {
        match self.engine.playback_state() {
            Ok(state) => {
                let changed = self.observed.lock().playback.replace(state) != Some(state);
                if changed && publish {
                    self.bus.publish(&PlayerEvent::PlaybackStateChanged { state });
                }
            }
            Err(e) => log::trace!("[PlayerManager] Playback state poll failed: {}", e),
        }

        let track = self.current_track();
        let changed = self.observed.lock().track.replace(track) != Some(track);
        if changed && publish {
            self.bus.publish(&PlayerEvent::TrackChanged { track });
        }

        self.observe_statuses(publish);
    }

    fn observe_statuses(&self, publish: bool) {
        for status in Status::OBSERVED {
            let value = match self.engine.status(status) {
                Ok(value) => value,
                Err(e) => {
                    log::trace!("[PlayerManager] {:?} poll failed: {}", status, e);
                    continue;
                }
            };
            let previous = self.observed.lock().statuses.insert(status, value);
            if publish && previous != Some(value) {
                self.bus.publish(&PlayerEvent::StatusChanged { status, value });
            }
        }
    }

    fn current_track(&self) -> Option<ResolvedTrack> {
        let ctx = self.engine.playing();
        self.ids
            .resolve_track(TrackDescription::current(), &ctx, |p, h| {
                self.cache.find_entry(p, h)
            })
            .ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_playlist(&self, raw: i64) -> BridgeResult<PlaylistId> {
        self.ids.resolve_playlist(raw, &self.engine.playing())
    }

    fn resolve_playlist_handle(&self, raw: i64) -> BridgeResult<(PlaylistId, NativeHandle)> {
        let id = self.resolve_playlist(raw)?;
        Ok((id, self.ids.to_native_handle(id)?))
    }

    fn resolve_entry(&self, desc: TrackDescription) -> BridgeResult<EntryRef> {
        let ctx = self.engine.playing();
        let track = self
            .ids
            .resolve_track(desc, &ctx, |p, h| self.cache.find_entry(p, h))?;
        let (owner, entry) = self.cache.locate_entry(track.entry_id)?;
        if owner != track.playlist_id {
            return Err(BridgeError::invalid(format!(
                "entry {} does not belong to playlist {}",
                track.entry_id, track.playlist_id
            )));
        }
        Ok(EntryRef {
            track,
            playlist: self.ids.to_native_handle(track.playlist_id)?,
            entry,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

impl PlaybackControl for PlayerManager {
    fn start_playback(&self) -> BridgeResult<()> {
        self.engine.start()
    }

    fn start_track(&self, track: TrackDescription) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        self.engine.start_entry(entry.playlist, entry.entry)
    }

    fn stop_playback(&self) -> BridgeResult<()> {
        self.engine.stop()
    }

    fn pause_playback(&self) -> BridgeResult<()> {
        self.engine.pause()
    }

    fn play_next_track(&self) -> BridgeResult<()> {
        self.engine.next()
    }

    fn play_previous_track(&self) -> BridgeResult<()> {
        self.engine.previous()
    }

    fn playback_state(&self) -> BridgeResult<PlaybackState> {
        self.engine.playback_state()
    }
}

impl PlayerStatus for PlayerManager {
    fn status(&self, status: Status) -> BridgeResult<StatusValue> {
        self.engine.status(status)
    }

    fn set_status(&self, status: Status, value: StatusValue) -> BridgeResult<()> {
        self.engine.set_status(status, value)?;
        // The engine does not announce changes made through the API.
        let value = match self.engine.status(status) {
            Ok(read_back) => read_back,
            Err(e) => {
                log::trace!("[PlayerManager] {:?} read-back failed: {}", status, e);
                value
            }
        };
        self.observed.lock().statuses.insert(status, value);
        self.queue.post(PlayerEvent::StatusChanged { status, value });
        Ok(())
    }
}

impl PlayQueue for PlayerManager {
    fn enqueue_entry(&self, track: TrackDescription, at_front: bool) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        self.engine.enqueue(entry.entry, at_front)
    }

    fn remove_entry_from_queue(&self, track: TrackDescription) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        self.engine.dequeue(entry.entry)
    }
}

impl PlaylistQuery for PlayerManager {
    fn playing_playlist(&self) -> BridgeResult<PlaylistId> {
        self.resolve_playlist(crate::ids::CURRENT)
    }

    fn playing_entry(&self) -> BridgeResult<EntryId> {
        Ok(self.playing_track()?.entry_id)
    }

    fn playing_track(&self) -> BridgeResult<ResolvedTrack> {
        self.absolute_track(TrackDescription::current())
    }

    fn absolute_playlist_id(&self, raw: i64) -> BridgeResult<PlaylistId> {
        self.resolve_playlist(raw)
    }

    fn absolute_entry_id(&self, track: TrackDescription) -> BridgeResult<EntryId> {
        Ok(self.resolve_entry(track)?.track.entry_id)
    }

    fn absolute_track(&self, track: TrackDescription) -> BridgeResult<ResolvedTrack> {
        Ok(self.resolve_entry(track)?.track)
    }

    fn playlist_checksum(&self, playlist: i64) -> BridgeResult<u32> {
        let id = self.resolve_playlist(playlist)?;
        self.cache.get_checksum(id)
    }

    fn playlists(&self) -> Vec<PlaylistInfo> {
        self.cache.playlists()
    }

    fn playlist_entries(&self, playlist: i64) -> BridgeResult<Vec<EntryId>> {
        let id = self.resolve_playlist(playlist)?;
        self.cache.entries(id)
    }

    fn entry_field(&self, entry: EntryId, field: &str) -> BridgeResult<FieldValue> {
        self.cache.get_field(entry, field)
    }

    fn track_source_type(&self, track: TrackDescription) -> BridgeResult<SourceType> {
        let entry = self.resolve_entry(track)?;
        self.engine.source_type(entry.entry)
    }

    fn entry_filename(&self, track: TrackDescription) -> BridgeResult<String> {
        let entry = self.resolve_entry(track)?;
        self.engine.filename(entry.entry)
    }

    fn formatted_entry_title(&self, track: TrackDescription, format: &str) -> BridgeResult<String> {
        let entry = self.resolve_entry(track)?;
        self.engine.formatted_title(entry.entry, format)
    }
}

impl TrackRating for PlayerManager {
    fn track_rating(&self, track: TrackDescription) -> BridgeResult<f64> {
        let entry = self.resolve_entry(track)?;
        self.engine.rating(entry.entry)
    }

    fn set_track_rating(&self, track: TrackDescription, rating: f64) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        self.engine.set_rating(entry.entry, rating)
    }
}

impl PlaylistUpdate for PlayerManager {
    fn lock_playlist(&self, playlist: i64) -> BridgeResult<()> {
        let id = self.resolve_playlist(playlist)?;
        self.cache.lock(id)
    }

    fn unlock_playlist(&self, playlist: i64) -> BridgeResult<()> {
        let id = self.resolve_playlist(playlist)?;
        self.cache.unlock(id)
    }
}

impl PlaylistEditor for PlayerManager {
    /// The id is assigned immediately; the cache picks the playlist up when
    /// the engine announces it.
    fn create_playlist(&self, title: &str) -> BridgeResult<PlaylistId> {
        let handle = self.engine.create_playlist(title)?;
        let engine = &self.engine;
        self.ids.to_stable_id(handle, |h| engine.is_valid(h))
    }

    fn add_file_to_playlist(&self, playlist: i64, path: &Path) -> BridgeResult<()> {
        let (_, handle) = self.resolve_playlist_handle(playlist)?;
        self.engine.add_file(handle, path)
    }

    fn add_url_to_playlist(&self, playlist: i64, url: &str) -> BridgeResult<()> {
        let (_, handle) = self.resolve_playlist_handle(playlist)?;
        self.engine.add_url(handle, url)
    }

    fn remove_track(&self, track: TrackDescription, physically: bool) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        self.engine.remove_entry(entry.entry, physically)
    }
}

impl SupportedFormats for PlayerManager {
    fn supported_track_extensions(&self) -> BridgeResult<Vec<String>> {
        self.engine.supported_extensions()
    }
}

impl CoverArtProvider for PlayerManager {
    fn is_cover_image_file_exist(&self, track: TrackDescription) -> BridgeResult<bool> {
        let entry = self.resolve_entry(track)?;
        Ok(match self.engine.cover(entry.entry)? {
            Some(CoverArt::File(path)) => path.is_file(),
            Some(CoverArt::Embedded(bytes)) => !bytes.is_empty(),
            None => false,
        })
    }

    fn save_cover_to_file(&self, track: TrackDescription, target: &Path) -> BridgeResult<()> {
        let entry = self.resolve_entry(track)?;
        match self.engine.cover(entry.entry)? {
            Some(CoverArt::File(path)) => {
                std::fs::copy(&path, target).map_err(|e| cover_io_error(target, e))?;
            }
            Some(CoverArt::Embedded(bytes)) => {
                std::fs::write(target, &bytes).map_err(|e| cover_io_error(target, e))?;
            }
            None => {
                return Err(BridgeError::not_found(format!(
                    "entry {} has no cover",
                    entry.track.entry_id
                )))
            }
        }
        Ok(())
    }
}

/// Cover files live outside the playlist store; a missing source or target
/// directory is `NotFound`, anything else is reported against the engine call.
fn cover_io_error(target: &Path, err: std::io::Error) -> BridgeError {
    let what = format!("cannot save cover to {}: {}", target.display(), err);
    if err.kind() == std::io::ErrorKind::NotFound {
        BridgeError::not_found(what)
    } else {
        BridgeError::EngineCallFailed(what)
    }
}

impl EventSubscription for PlayerManager {
    fn register_listener(&self, listener: Listener) -> ListenerId {
        self.bus.subscribe_listener(listener)
    }

    fn unregister_listener(&self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl crate::testing::Inspect for PlayerManager {
    fn playlist_state(&self, id: PlaylistId) -> Option<crate::cache::PlaylistState> {
        self.cache.state(id)
    }

    fn reload_pending(&self, id: PlaylistId) -> bool {
        self.coalescer.lock().is_pending(id)
    }

    fn stable_id(&self, handle: NativeHandle) -> Option<PlaylistId> {
        self.ids.lookup(handle)
    }

    fn native_handle(&self, id: PlaylistId) -> BridgeResult<NativeHandle> {
        self.ids.to_native_handle(id)
    }
}
