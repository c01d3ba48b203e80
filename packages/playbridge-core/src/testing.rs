//! Test support: a simulated engine and inspection hooks.
//!
//! Available in unit tests and, with the `test-util` feature, to
//! integration tests and downstream crates.
//!
//! [`SimEngine`] implements both SDK generations over one shared in-memory
//! state, so the same scenario can be run against either adapter. Mutations
//! made through the SDK announce themselves through attached
//! [`EngineCallbacks`] like the real engine does; the `sim`-side helpers
//! (`append_entry`, `set_raw_shuffle`, ...) change state silently so tests
//! can decide what the engine reports.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::PlaylistState;
use crate::dispatch::EngineCallbacks;
use crate::engine::classic::status_id;
use crate::engine::title_format::format_title;
use crate::engine::{
    ChangeFlags, ClassicEntryInfo, ClassicSdk, CoverArt, EntryData, ModernItemInfo,
    ModernProperty, ModernSdk, NativeEngine, NativeHandle, PlaybackState, PlayerNotification,
    SourceType,
};
use crate::error::{BridgeResult, EngineError, EngineResult};
use crate::ids::PlaylistId;

pub use crate::clock::ManualClock;

/// Generic failure status the simulated engine reports.
pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

/// Read-only view into manager internals for tests.
pub trait Inspect {
    fn playlist_state(&self, id: PlaylistId) -> Option<PlaylistState>;
    /// Whether a debounced reload is scheduled.
    fn reload_pending(&self, id: PlaylistId) -> bool;
    fn stable_id(&self, handle: NativeHandle) -> Option<PlaylistId>;
    fn native_handle(&self, id: PlaylistId) -> BridgeResult<NativeHandle>;
}

#[derive(Debug, Clone)]
struct SimEntry {
    filename: String,
    duration_ms: u64,
    title: String,
    artist: String,
    album: String,
    rating: f64,
    cover: Option<CoverArt>,
}

#[derive(Debug, Clone)]
struct SimPlaylist {
    handle: NativeHandle,
    title: String,
    entries: Vec<NativeHandle>,
}

struct SimState {
    version_id: i32,
    playlists: Vec<SimPlaylist>,
    entries: HashMap<NativeHandle, SimEntry>,
    next_handle: u64,
    playback: PlaybackState,
    playing: Option<(NativeHandle, NativeHandle)>,
    volume: u32,
    balance: u32,
    mute: bool,
    shuffle: bool,
    repeat: bool,
    radio_capture: bool,
    position_ms: u64,
    queue: Vec<NativeHandle>,
    locked: HashSet<NativeHandle>,
    external_locks: HashSet<NativeHandle>,
    failures: HashMap<String, u32>,
    calls: HashMap<&'static str, usize>,
    hooks: HashMap<String, Box<dyn FnOnce() + Send>>,
    deleted_files: Vec<String>,
    callbacks: Option<EngineCallbacks>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            version_id: 3600,
            playlists: Vec::new(),
            entries: HashMap::new(),
            next_handle: 0x1000,
            playback: PlaybackState::Stopped,
            playing: None,
            volume: 80,
            balance: 50,
            mute: false,
            shuffle: false,
            repeat: false,
            radio_capture: false,
            position_ms: 0,
            queue: Vec::new(),
            locked: HashSet::new(),
            external_locks: HashSet::new(),
            failures: HashMap::new(),
            calls: HashMap::new(),
            hooks: HashMap::new(),
            deleted_files: Vec::new(),
            callbacks: None,
        }
    }
}

impl SimState {
    fn alloc(&mut self) -> NativeHandle {
        self.next_handle += 0x10;
        NativeHandle(self.next_handle)
    }

    fn playlist(&self, handle: NativeHandle, call: &'static str) -> EngineResult<&SimPlaylist> {
        self.playlists
            .iter()
            .find(|p| p.handle == handle)
            .ok_or(EngineError::new(call, E_FAIL))
    }

    fn playlist_mut(
        &mut self,
        handle: NativeHandle,
        call: &'static str,
    ) -> EngineResult<&mut SimPlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.handle == handle)
            .ok_or(EngineError::new(call, E_FAIL))
    }

    fn entry(&self, handle: NativeHandle, call: &'static str) -> EngineResult<&SimEntry> {
        self.entries
            .get(&handle)
            .ok_or(EngineError::new(call, E_FAIL))
    }

    fn owner(&self, entry: NativeHandle) -> Option<NativeHandle> {
        self.playlists
            .iter()
            .find(|p| p.entries.contains(&entry))
            .map(|p| p.handle)
    }

    fn new_entry(&mut self, location: &str) -> NativeHandle {
        let handle = self.alloc();
        let remote = location.starts_with("http://") || location.starts_with("https://");
        let stem = Path::new(location)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.entries.insert(
            handle,
            SimEntry {
                filename: location.to_string(),
                duration_ms: if remote { 0 } else { 180_000 },
                title: stem,
                artist: "Sim Artist".to_string(),
                album: String::new(),
                rating: 0.0,
                cover: None,
            },
        );
        handle
    }

    fn insert_playlist(&mut self, title: &str, files: &[&str]) -> NativeHandle {
        let handle = self.alloc();
        let entries = files.iter().map(|f| self.new_entry(f)).collect();
        self.playlists.push(SimPlaylist {
            handle,
            title: title.to_string(),
            entries,
        });
        handle
    }

    fn step(&mut self, forward: bool) {
        let Some((playlist, entry)) = self.playing else {
            return;
        };
        let Some(list) = self.playlists.iter().find(|p| p.handle == playlist) else {
            return;
        };
        let Some(index) = list.entries.iter().position(|e| *e == entry) else {
            return;
        };
        let next = if forward {
            (index + 1) % list.entries.len()
        } else {
            (index + list.entries.len() - 1) % list.entries.len()
        };
        self.playing = Some((playlist, list.entries[next]));
        self.position_ms = 0;
    }

    fn start(&mut self) {
        if self.playing.is_none() {
            self.playing = self
                .playlists
                .iter()
                .find_map(|p| p.entries.first().map(|e| (p.handle, *e)));
        }
        if self.playing.is_some() {
            self.playback = PlaybackState::Playing;
        }
    }

    fn entry_data(&self, handle: NativeHandle, entry: &SimEntry) -> EntryData {
        let mut data = EntryData {
            handle,
            filename: entry.filename.clone(),
            duration: std::time::Duration::from_millis(entry.duration_ms),
            rating: entry.rating,
            source_type: SourceType::infer(
                &entry.filename,
                std::time::Duration::from_millis(entry.duration_ms),
            ),
            ..Default::default()
        };
        for (name, value) in [
            ("title", &entry.title),
            ("artist", &entry.artist),
            ("album", &entry.album),
        ] {
            if !value.is_empty() {
                data.tags.insert(name.to_string(), value.clone());
            }
        }
        data
    }
}

/// In-memory engine implementing both SDK generations.
#[derive(Clone, Default)]
pub struct SimEngine {
    state: Arc<Mutex<SimState>>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native engine exposing the classic SDK.
    pub fn classic(&self) -> NativeEngine {
        NativeEngine::Classic(Arc::new(self.clone()))
    }

    /// Native engine exposing the modern SDK.
    pub fn modern(&self) -> NativeEngine {
        NativeEngine::Modern(Arc::new(self.clone()))
    }

    /// Routes engine notifications to `callbacks`.
    pub fn attach(&self, callbacks: EngineCallbacks) {
        self.state.lock().callbacks = Some(callbacks);
    }

    pub fn set_version_id(&self, version_id: i32) {
        self.state.lock().version_id = version_id;
    }

    /// Makes the next call named `call` fail once.
    pub fn fail_next(&self, call: &str) {
        *self.state.lock().failures.entry(call.to_string()).or_default() += 1;
    }

    /// Runs `hook` once, right before the next call named `call` is served.
    ///
    /// The hook runs without the engine state locked, so it may call back into
    /// the engine or into code that does.
    pub fn on_next_call(&self, call: &str, hook: impl FnOnce() + Send + 'static) {
        self.state.lock().hooks.insert(call.to_string(), Box::new(hook));
    }

    /// How often the SDK call `call` was made.
    pub fn call_count(&self, call: &str) -> usize {
        self.state.lock().calls.get(call).copied().unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Silent state changes
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_playlist(&self, title: &str, files: &[&str]) -> NativeHandle {
        self.state.lock().insert_playlist(title, files)
    }

    pub fn remove_playlist(&self, playlist: NativeHandle) {
        let mut state = self.state.lock();
        state.playlists.retain(|p| p.handle != playlist);
        if matches!(state.playing, Some((p, _)) if p == playlist) {
            state.playing = None;
            state.playback = PlaybackState::Stopped;
        }
    }

    pub fn rename_playlist(&self, playlist: NativeHandle, title: &str) {
        if let Ok(p) = self.state.lock().playlist_mut(playlist, "Rename") {
            p.title = title.to_string();
        }
    }

    pub fn append_entry(&self, playlist: NativeHandle, location: &str) -> NativeHandle {
        let mut state = self.state.lock();
        let entry = state.new_entry(location);
        if let Ok(p) = state.playlist_mut(playlist, "Append") {
            p.entries.push(entry);
        }
        entry
    }

    pub fn remove_entry_at(&self, playlist: NativeHandle, index: usize) {
        let mut state = self.state.lock();
        if let Ok(p) = state.playlist_mut(playlist, "RemoveAt") {
            if index < p.entries.len() {
                let entry = p.entries.remove(index);
                state.entries.remove(&entry);
            }
        }
    }

    pub fn entry_handles(&self, playlist: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .lock()
            .playlist(playlist, "Entries")
            .map(|p| p.entries.clone())
            .unwrap_or_default()
    }

    pub fn set_cover(&self, entry: NativeHandle, cover: CoverArt) {
        if let Some(e) = self.state.lock().entries.get_mut(&entry) {
            e.cover = Some(cover);
        }
    }

    /// Starts playing `playlist[index]` without announcing it.
    pub fn set_playing(&self, playlist: NativeHandle, index: usize) {
        let mut state = self.state.lock();
        let entry = state
            .playlist(playlist, "SetPlaying")
            .ok()
            .and_then(|p| p.entries.get(index).copied());
        if let Some(entry) = entry {
            state.playing = Some((playlist, entry));
            state.playback = PlaybackState::Playing;
        }
    }

    pub fn set_raw_shuffle(&self, shuffle: bool) {
        self.state.lock().shuffle = shuffle;
    }

    pub fn set_raw_volume(&self, volume: u32) {
        self.state.lock().volume = volume.min(100);
    }

    /// Simulates another actor holding the edit lock.
    pub fn lock_externally(&self, playlist: NativeHandle) {
        self.state.lock().external_locks.insert(playlist);
    }

    pub fn is_locked(&self, playlist: NativeHandle) -> bool {
        self.state.lock().locked.contains(&playlist)
    }

    pub fn queue(&self) -> Vec<NativeHandle> {
        self.state.lock().queue.clone()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        self.state.lock().deleted_files.clone()
    }

    pub fn rating_of(&self, entry: NativeHandle) -> Option<f64> {
        self.state.lock().entries.get(&entry).map(|e| e.rating)
    }

    pub fn volume(&self) -> u32 {
        self.state.lock().volume
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Counts the call and consumes an injected failure for it.
    fn call(&self, name: &'static str) -> EngineResult<parking_lot::MutexGuard<'_, SimState>> {
        let hook = self.state.lock().hooks.remove(name);
        if let Some(hook) = hook {
            hook();
        }
        let mut state = self.state.lock();
        *state.calls.entry(name).or_default() += 1;
        if let Some(remaining) = state.failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(EngineError::new(name, E_FAIL));
            }
        }
        Ok(state)
    }

    fn notify(state: &SimState, f: impl FnOnce(&EngineCallbacks)) {
        if let Some(callbacks) = &state.callbacks {
            f(callbacks);
        }
    }

    fn do_play(&self, name: &'static str) -> EngineResult<()> {
        let mut state = self.call(name)?;
        let before = state.playing;
        state.start();
        let track_changed = before != state.playing;
        Self::notify(&state, |cb| {
            cb.player_notification(PlayerNotification::PlaybackStateChanged);
            if track_changed {
                cb.player_notification(PlayerNotification::TrackChanged);
            }
        });
        Ok(())
    }

    fn do_play_entry(&self, name: &'static str, entry: NativeHandle) -> EngineResult<()> {
        let mut state = self.call(name)?;
        let owner = state.owner(entry).ok_or(EngineError::new(name, E_FAIL))?;
        state.playing = Some((owner, entry));
        state.playback = PlaybackState::Playing;
        state.position_ms = 0;
        Self::notify(&state, |cb| {
            cb.player_notification(PlayerNotification::PlaybackStateChanged);
            cb.player_notification(PlayerNotification::TrackChanged);
        });
        Ok(())
    }

    fn do_set_playback(&self, name: &'static str, playback: PlaybackState) -> EngineResult<()> {
        let mut state = self.call(name)?;
        if playback == PlaybackState::Paused && state.playback == PlaybackState::Paused {
            state.playback = PlaybackState::Playing;
        } else {
            state.playback = playback;
        }
        if playback == PlaybackState::Stopped {
            state.position_ms = 0;
        }
        Self::notify(&state, |cb| {
            cb.player_notification(PlayerNotification::PlaybackStateChanged)
        });
        Ok(())
    }

    fn do_step(&self, name: &'static str, forward: bool) -> EngineResult<()> {
        let mut state = self.call(name)?;
        state.step(forward);
        Self::notify(&state, |cb| {
            cb.player_notification(PlayerNotification::TrackChanged)
        });
        Ok(())
    }

    fn do_add(&self, name: &'static str, playlist: NativeHandle, location: &str) -> EngineResult<()> {
        let mut state = self.call(name)?;
        state.playlist(playlist, name)?;
        let entry = state.new_entry(location);
        state.playlist_mut(playlist, name)?.entries.push(entry);
        Self::notify(&state, |cb| {
            cb.storage_changed(playlist, ChangeFlags::CONTENT.bits())
        });
        Ok(())
    }

    fn do_create(&self, name: &'static str, title: &str) -> EngineResult<NativeHandle> {
        let mut state = self.call(name)?;
        let handle = state.insert_playlist(title, &[]);
        Self::notify(&state, |cb| cb.storage_added(handle));
        Ok(handle)
    }

    fn do_delete(&self, name: &'static str, entry: NativeHandle, physically: bool) -> EngineResult<()> {
        let mut state = self.call(name)?;
        let owner = state.owner(entry).ok_or(EngineError::new(name, E_FAIL))?;
        state.playlist_mut(owner, name)?.entries.retain(|e| *e != entry);
        if let Some(removed) = state.entries.remove(&entry) {
            if physically {
                state.deleted_files.push(removed.filename);
            }
        }
        state.queue.retain(|e| *e != entry);
        Self::notify(&state, |cb| {
            cb.storage_changed(owner, ChangeFlags::CONTENT.bits())
        });
        Ok(())
    }

    fn do_set_rating(&self, name: &'static str, entry: NativeHandle, rating: f64) -> EngineResult<()> {
        let mut state = self.call(name)?;
        let owner = state.owner(entry);
        state
            .entries
            .get_mut(&entry)
            .ok_or(EngineError::new(name, E_FAIL))?
            .rating = rating.clamp(0.0, 5.0);
        if let Some(owner) = owner {
            Self::notify(&state, |cb| {
                cb.storage_changed(owner, ChangeFlags::METADATA.bits())
            });
        }
        Ok(())
    }

    fn do_lock(&self, name: &'static str, playlist: NativeHandle) -> EngineResult<()> {
        let mut state = self.call(name)?;
        state.playlist(playlist, name)?;
        if state.external_locks.contains(&playlist) {
            return Err(EngineError::new(name, E_FAIL));
        }
        state.locked.insert(playlist);
        Ok(())
    }

    fn do_unlock(&self, name: &'static str, playlist: NativeHandle) -> EngineResult<()> {
        let mut state = self.call(name)?;
        if !state.locked.remove(&playlist) {
            return Err(EngineError::new(name, E_FAIL));
        }
        Ok(())
    }

    fn do_enqueue(&self, name: &'static str, entry: NativeHandle, index: Option<usize>) -> EngineResult<()> {
        let mut state = self.call(name)?;
        state.entry(entry, name)?;
        match index {
            Some(index) => {
                let index = index.min(state.queue.len());
                state.queue.insert(index, entry);
            }
            None => state.queue.push(entry),
        }
        Ok(())
    }

    fn do_dequeue(&self, name: &'static str, entry: NativeHandle) -> EngineResult<()> {
        let mut state = self.call(name)?;
        let before = state.queue.len();
        state.queue.retain(|e| *e != entry);
        if state.queue.len() == before {
            return Err(EngineError::new(name, E_FAIL));
        }
        Ok(())
    }

    fn playing_length_ms(state: &SimState) -> u64 {
        state
            .playing
            .and_then(|(_, entry)| state.entries.get(&entry))
            .map(|e| e.duration_ms)
            .unwrap_or(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classic SDK
// ─────────────────────────────────────────────────────────────────────────────

impl ClassicSdk for SimEngine {
    fn version_id(&self) -> i32 {
        self.state.lock().version_id
    }

    fn version_string(&self) -> String {
        let id = self.state.lock().version_id;
        format!("v{}.{:02} (sim)", id / 1000, (id % 1000) / 10)
    }

    fn play(&self) -> EngineResult<()> {
        self.do_play("Play")
    }

    fn play_entry(&self, _storage: NativeHandle, entry: NativeHandle) -> EngineResult<()> {
        self.do_play_entry("PlayEntry", entry)
    }

    fn stop(&self) -> EngineResult<()> {
        self.do_set_playback("Stop", PlaybackState::Stopped)
    }

    fn pause(&self) -> EngineResult<()> {
        self.do_set_playback("Pause", PlaybackState::Paused)
    }

    fn next(&self) -> EngineResult<()> {
        self.do_step("Next", true)
    }

    fn prev(&self) -> EngineResult<()> {
        self.do_step("Prev", false)
    }

    fn status_get(&self, id: i32) -> EngineResult<u32> {
        let state = self.call("StatusGet")?;
        Ok(match id {
            status_id::VOLUME => state.volume,
            status_id::BALANCE => state.balance,
            status_id::PLAYER_STATE => match state.playback {
                PlaybackState::Stopped => 0,
                PlaybackState::Playing => 1,
                PlaybackState::Paused => 2,
            },
            status_id::MUTE => u32::from(state.mute),
            status_id::POSITION_MS => state.position_ms as u32,
            status_id::LENGTH_MS => Self::playing_length_ms(&state) as u32,
            status_id::REPEAT => u32::from(state.repeat),
            status_id::SHUFFLE => u32::from(state.shuffle),
            status_id::RADIO_CAPTURE => u32::from(state.radio_capture),
            _ => return Err(EngineError::new("StatusGet", E_FAIL)),
        })
    }

    fn status_set(&self, id: i32, value: u32) -> EngineResult<()> {
        let mut state = self.call("StatusSet")?;
        match id {
            status_id::VOLUME => state.volume = value.min(100),
            status_id::BALANCE => state.balance = value.min(100),
            status_id::MUTE => state.mute = value != 0,
            status_id::POSITION_MS => state.position_ms = u64::from(value),
            status_id::REPEAT => state.repeat = value != 0,
            status_id::SHUFFLE => state.shuffle = value != 0,
            status_id::RADIO_CAPTURE => state.radio_capture = value != 0,
            _ => return Err(EngineError::new("StatusSet", E_FAIL)),
        }
        Ok(())
    }

    fn playing_storage(&self) -> Option<NativeHandle> {
        self.state.lock().playing.map(|(p, _)| p)
    }

    fn playing_entry(&self) -> Option<NativeHandle> {
        self.state.lock().playing.map(|(_, e)| e)
    }

    fn storage_count(&self) -> usize {
        self.state.lock().playlists.len()
    }

    fn storage_get(&self, index: usize) -> EngineResult<NativeHandle> {
        let state = self.call("StorageGet")?;
        state
            .playlists
            .get(index)
            .map(|p| p.handle)
            .ok_or(EngineError::new("StorageGet", E_FAIL))
    }

    fn storage_is_valid(&self, storage: NativeHandle) -> bool {
        self.state.lock().playlists.iter().any(|p| p.handle == storage)
    }

    fn storage_title(&self, storage: NativeHandle) -> EngineResult<String> {
        let state = self.call("StorageGetTitle")?;
        Ok(state.playlist(storage, "StorageGetTitle")?.title.clone())
    }

    fn storage_entry_count(&self, storage: NativeHandle) -> EngineResult<usize> {
        let state = self.call("StorageGetEntryCount")?;
        Ok(state.playlist(storage, "StorageGetEntryCount")?.entries.len())
    }

    fn storage_entry(&self, storage: NativeHandle, index: usize) -> EngineResult<NativeHandle> {
        let state = self.call("StorageGetEntry")?;
        state
            .playlist(storage, "StorageGetEntry")?
            .entries
            .get(index)
            .copied()
            .ok_or(EngineError::new("StorageGetEntry", E_FAIL))
    }

    fn storage_new(&self, title: &str) -> EngineResult<NativeHandle> {
        self.do_create("StorageNew", title)
    }

    fn storage_add_file(&self, storage: NativeHandle, path: &Path) -> EngineResult<()> {
        self.do_add("StorageAddFile", storage, &path.to_string_lossy())
    }

    fn storage_add_url(&self, storage: NativeHandle, url: &str) -> EngineResult<()> {
        self.do_add("StorageAddUrl", storage, url)
    }

    fn storage_lock(&self, storage: NativeHandle) -> EngineResult<()> {
        self.do_lock("StorageLock", storage)
    }

    fn storage_unlock(&self, storage: NativeHandle) -> EngineResult<()> {
        self.do_unlock("StorageUnlock", storage)
    }

    fn entry_info(&self, entry: NativeHandle) -> EngineResult<ClassicEntryInfo> {
        let state = self.call("EntryGetInfo")?;
        let e = state.entry(entry, "EntryGetInfo")?;
        Ok(ClassicEntryInfo {
            filename: e.filename.clone(),
            duration_ms: e.duration_ms,
            title: e.title.clone(),
            artist: e.artist.clone(),
            album: e.album.clone(),
            mark: e.rating.round() as i32,
            bitrate: 320,
            channels: 2,
            samplerate: 44_100,
            ..Default::default()
        })
    }

    fn entry_set_mark(&self, entry: NativeHandle, mark: i32) -> EngineResult<()> {
        self.do_set_rating("EntrySetMark", entry, f64::from(mark))
    }

    fn entry_delete(&self, entry: NativeHandle, physically: bool) -> EngineResult<()> {
        self.do_delete("EntryDelete", entry, physically)
    }

    fn entry_format_title(&self, entry: NativeHandle, format: &str) -> EngineResult<String> {
        let state = self.call("EntryFormatTitle")?;
        let e = state.entry(entry, "EntryFormatTitle")?;
        Ok(format_title(&state.entry_data(entry, e), format))
    }

    fn entry_cover(&self, entry: NativeHandle) -> EngineResult<Option<CoverArt>> {
        let state = self.call("EntryGetCover")?;
        Ok(state.entry(entry, "EntryGetCover")?.cover.clone())
    }

    fn queue_add(&self, entry: NativeHandle, at_front: bool) -> EngineResult<()> {
        self.do_enqueue("QueueAdd", entry, at_front.then_some(0))
    }

    fn queue_remove(&self, entry: NativeHandle) -> EngineResult<()> {
        self.do_dequeue("QueueRemove", entry)
    }

    fn supported_extensions(&self) -> EngineResult<String> {
        let _state = self.call("SupportedExts")?;
        Ok("*.mp3;*.FLAC;*.ogg;".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modern SDK
// ─────────────────────────────────────────────────────────────────────────────

impl ModernSdk for SimEngine {
    fn version_string(&self) -> String {
        let id = self.state.lock().version_id;
        format!("{}.{}.{} (sim)", id / 1000, (id % 1000) / 100, id % 100)
    }

    fn play(&self) -> EngineResult<()> {
        self.do_play("Play")
    }

    fn play_item(&self, item: NativeHandle) -> EngineResult<()> {
        self.do_play_entry("PlayItem", item)
    }

    fn stop(&self) -> EngineResult<()> {
        self.do_set_playback("Stop", PlaybackState::Stopped)
    }

    fn pause(&self) -> EngineResult<()> {
        self.do_set_playback("Pause", PlaybackState::Paused)
    }

    fn next(&self) -> EngineResult<()> {
        self.do_step("Next", true)
    }

    fn prev(&self) -> EngineResult<()> {
        self.do_step("Prev", false)
    }

    fn state(&self) -> i32 {
        match self.state.lock().playback {
            PlaybackState::Stopped => 0,
            PlaybackState::Paused => 1,
            PlaybackState::Playing => 2,
        }
    }

    fn property_get(&self, property: ModernProperty) -> EngineResult<f64> {
        let state = self.call("PropertyGet")?;
        Ok(match property {
            ModernProperty::Volume => f64::from(state.volume) / 100.0,
            ModernProperty::Balance => f64::from(state.balance) / 50.0 - 1.0,
            ModernProperty::Mute => f64::from(u8::from(state.mute)),
            ModernProperty::Shuffle => f64::from(u8::from(state.shuffle)),
            ModernProperty::Repeat => f64::from(u8::from(state.repeat)),
            ModernProperty::RadioCapture => f64::from(u8::from(state.radio_capture)),
            ModernProperty::PositionSecs => state.position_ms as f64 / 1000.0,
            ModernProperty::DurationSecs => Self::playing_length_ms(&state) as f64 / 1000.0,
        })
    }

    fn property_set(&self, property: ModernProperty, value: f64) -> EngineResult<()> {
        let mut state = self.call("PropertySet")?;
        match property {
            ModernProperty::Volume => state.volume = (value.clamp(0.0, 1.0) * 100.0).round() as u32,
            ModernProperty::Balance => {
                state.balance = ((value.clamp(-1.0, 1.0) + 1.0) * 50.0).round() as u32
            }
            ModernProperty::Mute => state.mute = value != 0.0,
            ModernProperty::Shuffle => state.shuffle = value != 0.0,
            ModernProperty::Repeat => state.repeat = value != 0.0,
            ModernProperty::RadioCapture => state.radio_capture = value != 0.0,
            ModernProperty::PositionSecs => state.position_ms = (value.max(0.0) * 1000.0) as u64,
            ModernProperty::DurationSecs => return Err(EngineError::new("PropertySet", E_FAIL)),
        }
        Ok(())
    }

    fn playing_playlist(&self) -> Option<NativeHandle> {
        self.state.lock().playing.map(|(p, _)| p)
    }

    fn playing_item(&self) -> Option<NativeHandle> {
        self.state.lock().playing.map(|(_, e)| e)
    }

    fn playlists(&self) -> EngineResult<Vec<NativeHandle>> {
        let state = self.call("Playlists")?;
        Ok(state.playlists.iter().map(|p| p.handle).collect())
    }

    fn playlist_is_valid(&self, playlist: NativeHandle) -> bool {
        self.state.lock().playlists.iter().any(|p| p.handle == playlist)
    }

    fn playlist_name(&self, playlist: NativeHandle) -> EngineResult<String> {
        let state = self.call("PlaylistName")?;
        Ok(state.playlist(playlist, "PlaylistName")?.title.clone())
    }

    fn playlist_items(&self, playlist: NativeHandle) -> EngineResult<Vec<NativeHandle>> {
        let state = self.call("PlaylistItems")?;
        Ok(state.playlist(playlist, "PlaylistItems")?.entries.clone())
    }

    fn playlist_create(&self, name: &str) -> EngineResult<NativeHandle> {
        self.do_create("PlaylistCreate", name)
    }

    fn playlist_add(&self, playlist: NativeHandle, location: &str) -> EngineResult<()> {
        self.do_add("PlaylistAdd", playlist, location)
    }

    fn playlist_begin_update(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.do_lock("BeginUpdate", playlist)
    }

    fn playlist_end_update(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.do_unlock("EndUpdate", playlist)
    }

    fn item_info(&self, item: NativeHandle) -> EngineResult<ModernItemInfo> {
        let state = self.call("ItemInfo")?;
        let e = state.entry(item, "ItemInfo")?;
        Ok(ModernItemInfo {
            file_name: e.filename.clone(),
            duration_secs: e.duration_ms as f64 / 1000.0,
            title: e.title.clone(),
            artist: e.artist.clone(),
            album: e.album.clone(),
            mark: e.rating,
            stream: e.filename.starts_with("http://") || e.filename.starts_with("https://"),
            bitrate: 320,
            channels: 2,
            samplerate: 44_100,
            ..Default::default()
        })
    }

    fn item_set_mark(&self, item: NativeHandle, mark: f64) -> EngineResult<()> {
        self.do_set_rating("ItemSetMark", item, mark)
    }

    fn item_delete(&self, item: NativeHandle, physically: bool) -> EngineResult<()> {
        self.do_delete("ItemDelete", item, physically)
    }

    fn item_cover(&self, item: NativeHandle) -> EngineResult<Option<CoverArt>> {
        let state = self.call("ItemCover")?;
        Ok(state.entry(item, "ItemCover")?.cover.clone())
    }

    fn queue_insert(&self, item: NativeHandle, index: i32) -> EngineResult<()> {
        self.do_enqueue("QueueInsert", item, usize::try_from(index).ok())
    }

    fn queue_remove(&self, item: NativeHandle) -> EngineResult<()> {
        self.do_dequeue("QueueRemove", item)
    }

    fn file_formats(&self) -> EngineResult<Vec<String>> {
        let _state = self.call("FileFormats")?;
        Ok(vec![".mp3".into(), ".FLAC".into(), ".ogg".into()])
    }
}
