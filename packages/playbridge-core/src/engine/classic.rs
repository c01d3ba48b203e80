//! Classic (3.x-era) SDK generation.
//!
//! The classic SDK addresses playlists by storage handle and entries by
//! `(storage, index)` pairs, reports status through integer property ids,
//! stores ratings as whole stars and formats titles engine-side.

use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

use super::types::{
    CoverArt, EntryData, NativeHandle, PlaybackState, PlayingContext, PlaylistData, SourceType,
    Status, StatusValue,
};

/// Raw status property ids understood by the classic SDK.
pub mod status_id {
    pub const VOLUME: i32 = 1;
    pub const BALANCE: i32 = 2;
    pub const PLAYER_STATE: i32 = 4;
    pub const MUTE: i32 = 5;
    pub const POSITION_MS: i32 = 31;
    pub const LENGTH_MS: i32 = 32;
    pub const REPEAT: i32 = 33;
    pub const SHUFFLE: i32 = 35;
    pub const RADIO_CAPTURE: i32 = 41;
}

/// Raw player state codes reported through [`status_id::PLAYER_STATE`].
const STATE_STOPPED: u32 = 0;
const STATE_PLAYING: u32 = 1;
const STATE_PAUSED: u32 = 2;

/// Entry properties as the classic SDK reports them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassicEntryInfo {
    pub filename: String,
    pub duration_ms: u64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub date: String,
    pub genre: String,
    /// Whole-star rating, `0..=5`.
    pub mark: i32,
    pub bitrate: u32,
    pub channels: u32,
    pub samplerate: u32,
    pub filesize: u64,
}

/// Raw classic SDK surface.
///
/// Implemented by the host binding (or by a simulated engine in tests).
/// Every call is bounded and runs to completion before returning.
pub trait ClassicSdk: Send + Sync {
    /// Engine build number, e.g. `3100` for 3.10.
    fn version_id(&self) -> i32;
    fn version_string(&self) -> String;

    fn play(&self) -> EngineResult<()>;
    fn play_entry(&self, storage: NativeHandle, entry: NativeHandle) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;
    fn pause(&self) -> EngineResult<()>;
    fn next(&self) -> EngineResult<()>;
    fn prev(&self) -> EngineResult<()>;

    fn status_get(&self, id: i32) -> EngineResult<u32>;
    fn status_set(&self, id: i32, value: u32) -> EngineResult<()>;

    fn playing_storage(&self) -> Option<NativeHandle>;
    fn playing_entry(&self) -> Option<NativeHandle>;

    fn storage_count(&self) -> usize;
    fn storage_get(&self, index: usize) -> EngineResult<NativeHandle>;
    fn storage_is_valid(&self, storage: NativeHandle) -> bool;
    fn storage_title(&self, storage: NativeHandle) -> EngineResult<String>;
    fn storage_entry_count(&self, storage: NativeHandle) -> EngineResult<usize>;
    fn storage_entry(&self, storage: NativeHandle, index: usize) -> EngineResult<NativeHandle>;
    fn storage_new(&self, title: &str) -> EngineResult<NativeHandle>;
    fn storage_add_file(&self, storage: NativeHandle, path: &Path) -> EngineResult<()>;
    fn storage_add_url(&self, storage: NativeHandle, url: &str) -> EngineResult<()>;
    fn storage_lock(&self, storage: NativeHandle) -> EngineResult<()>;
    fn storage_unlock(&self, storage: NativeHandle) -> EngineResult<()>;

    fn entry_info(&self, entry: NativeHandle) -> EngineResult<ClassicEntryInfo>;
    fn entry_set_mark(&self, entry: NativeHandle, mark: i32) -> EngineResult<()>;
    fn entry_delete(&self, entry: NativeHandle, physically: bool) -> EngineResult<()>;
    fn entry_format_title(&self, entry: NativeHandle, format: &str) -> EngineResult<String>;
    fn entry_cover(&self, entry: NativeHandle) -> EngineResult<Option<CoverArt>>;

    fn queue_add(&self, entry: NativeHandle, at_front: bool) -> EngineResult<()>;
    fn queue_remove(&self, entry: NativeHandle) -> EngineResult<()>;

    /// Semicolon separated mask list, e.g. `*.mp3;*.ogg;`.
    fn supported_extensions(&self) -> EngineResult<String>;
}

/// Adapter presenting the classic SDK through the normalized contract.
pub struct ClassicAdapter {
    sdk: std::sync::Arc<dyn ClassicSdk>,
}

impl ClassicAdapter {
    pub fn new(sdk: std::sync::Arc<dyn ClassicSdk>) -> Self {
        Self { sdk }
    }

    fn status_id(status: Status) -> i32 {
        match status {
            Status::Volume => status_id::VOLUME,
            Status::Balance => status_id::BALANCE,
            Status::Mute => status_id::MUTE,
            Status::Shuffle => status_id::SHUFFLE,
            Status::Repeat => status_id::REPEAT,
            Status::RadioCapture => status_id::RADIO_CAPTURE,
            Status::Position => status_id::POSITION_MS,
            Status::Length => status_id::LENGTH_MS,
        }
    }

    pub fn version(&self) -> String {
        self.sdk.version_string()
    }

    pub fn start(&self) -> EngineResult<()> {
        self.sdk.play()
    }

    pub fn start_entry(&self, playlist: NativeHandle, entry: NativeHandle) -> EngineResult<()> {
        self.sdk.play_entry(playlist, entry)
    }

    pub fn stop(&self) -> EngineResult<()> {
        self.sdk.stop()
    }

    pub fn pause(&self) -> EngineResult<()> {
        self.sdk.pause()
    }

    pub fn next(&self) -> EngineResult<()> {
        self.sdk.next()
    }

    pub fn previous(&self) -> EngineResult<()> {
        self.sdk.prev()
    }

    pub fn playback_state(&self) -> EngineResult<PlaybackState> {
        match self.sdk.status_get(status_id::PLAYER_STATE)? {
            STATE_STOPPED => Ok(PlaybackState::Stopped),
            STATE_PLAYING => Ok(PlaybackState::Playing),
            STATE_PAUSED => Ok(PlaybackState::Paused),
            other => Err(EngineError::new("PlayerState", other as i32)),
        }
    }

    pub fn status(&self, status: Status) -> EngineResult<StatusValue> {
        let raw = self.sdk.status_get(Self::status_id(status))?;
        Ok(match status {
            Status::Position | Status::Length => raw / 1000,
            s if s.is_flag() => u32::from(raw != 0),
            _ => raw,
        })
    }

    pub fn set_status(&self, status: Status, value: StatusValue) -> EngineResult<()> {
        let raw = match status {
            Status::Position | Status::Length => value.saturating_mul(1000),
            _ => value,
        };
        self.sdk.status_set(Self::status_id(status), raw)
    }

    pub fn playing(&self) -> PlayingContext {
        PlayingContext {
            playlist: self.sdk.playing_storage(),
            entry: self.sdk.playing_entry(),
        }
    }

    pub fn playlists(&self) -> EngineResult<Vec<NativeHandle>> {
        (0..self.sdk.storage_count())
            .map(|index| self.sdk.storage_get(index))
            .collect()
    }

    pub fn is_valid(&self, playlist: NativeHandle) -> bool {
        self.sdk.storage_is_valid(playlist)
    }

    pub fn playlist_title(&self, playlist: NativeHandle) -> EngineResult<String> {
        self.sdk.storage_title(playlist)
    }

    pub fn fetch_playlist(&self, playlist: NativeHandle) -> EngineResult<PlaylistData> {
        let title = self.sdk.storage_title(playlist)?;
        let count = self.sdk.storage_entry_count(playlist)?;
        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let handle = self.sdk.storage_entry(playlist, index)?;
            let info = self.sdk.entry_info(handle)?;
            entries.push(Self::normalize_entry(handle, info));
        }
        Ok(PlaylistData { title, entries })
    }

    fn normalize_entry(handle: NativeHandle, info: ClassicEntryInfo) -> EntryData {
        let duration = Duration::from_millis(info.duration_ms);
        let source_type = SourceType::infer(&info.filename, duration);
        let tags = [
            ("title", info.title),
            ("artist", info.artist),
            ("album", info.album),
            ("date", info.date),
            ("genre", info.genre),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        EntryData {
            handle,
            filename: info.filename,
            duration,
            tags,
            rating: f64::from(info.mark.clamp(0, 5)),
            source_type,
            bitrate: info.bitrate,
            channels: info.channels,
            samplerate: info.samplerate,
            filesize: info.filesize,
        }
    }

    pub fn rating(&self, entry: NativeHandle) -> EngineResult<f64> {
        Ok(f64::from(self.sdk.entry_info(entry)?.mark.clamp(0, 5)))
    }

    /// Classic ratings are whole stars; fractional values are rounded.
    pub fn set_rating(&self, entry: NativeHandle, rating: f64) -> EngineResult<()> {
        self.sdk.entry_set_mark(entry, rating.round() as i32)
    }

    pub fn source_type(&self, entry: NativeHandle) -> EngineResult<SourceType> {
        let info = self.sdk.entry_info(entry)?;
        Ok(SourceType::infer(
            &info.filename,
            Duration::from_millis(info.duration_ms),
        ))
    }

    pub fn filename(&self, entry: NativeHandle) -> EngineResult<String> {
        Ok(self.sdk.entry_info(entry)?.filename)
    }

    pub fn formatted_title(&self, entry: NativeHandle, format: &str) -> EngineResult<String> {
        self.sdk.entry_format_title(entry, format)
    }

    pub fn cover(&self, entry: NativeHandle) -> EngineResult<Option<CoverArt>> {
        self.sdk.entry_cover(entry)
    }

    pub fn enqueue(&self, entry: NativeHandle, at_front: bool) -> EngineResult<()> {
        self.sdk.queue_add(entry, at_front)
    }

    pub fn dequeue(&self, entry: NativeHandle) -> EngineResult<()> {
        self.sdk.queue_remove(entry)
    }

    pub fn create_playlist(&self, title: &str) -> EngineResult<NativeHandle> {
        self.sdk.storage_new(title)
    }

    pub fn add_file(&self, playlist: NativeHandle, path: &Path) -> EngineResult<()> {
        self.sdk.storage_add_file(playlist, path)
    }

    pub fn add_url(&self, playlist: NativeHandle, url: &str) -> EngineResult<()> {
        self.sdk.storage_add_url(playlist, url)
    }

    pub fn remove_entry(&self, entry: NativeHandle, physically: bool) -> EngineResult<()> {
        self.sdk.entry_delete(entry, physically)
    }

    pub fn lock(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.sdk.storage_lock(playlist)
    }

    pub fn unlock(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.sdk.storage_unlock(playlist)
    }

    /// Converts the `*.mp3;*.ogg;` mask list into bare extensions.
    pub fn supported_extensions(&self) -> EngineResult<Vec<String>> {
        let masks = self.sdk.supported_extensions()?;
        Ok(masks
            .split(';')
            .map(|mask| mask.trim().trim_start_matches("*.").to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_entry_keeps_non_empty_tags_only() {
        let info = ClassicEntryInfo {
            filename: "D:\\Music\\song.flac".into(),
            duration_ms: 215_000,
            title: "Song".into(),
            artist: "Artist".into(),
            mark: 7,
            ..Default::default()
        };
        let entry = ClassicAdapter::normalize_entry(NativeHandle(5), info);

        assert_eq!(entry.tag("title"), "Song");
        assert_eq!(entry.tag("artist"), "Artist");
        assert!(!entry.tags.contains_key("album"));
        assert_eq!(entry.rating, 5.0);
        assert_eq!(entry.duration, Duration::from_secs(215));
        assert_eq!(entry.source_type, SourceType::File);
    }
}
