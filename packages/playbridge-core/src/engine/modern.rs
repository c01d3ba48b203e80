//! Modern (3.6-era) SDK generation.
//!
//! The modern SDK exposes playlists and items as objects, reports player
//! properties as floating point values (volume `0.0..=1.0`, balance
//! `-1.0..=1.0`, times in seconds), keeps fractional ratings and has no
//! engine-side title formatting.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

use super::title_format::format_title;
use super::types::{
    CoverArt, EntryData, NativeHandle, PlaybackState, PlayingContext, PlaylistData, SourceType,
    Status, StatusValue,
};

/// Player properties of the modern SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModernProperty {
    Volume,
    Balance,
    Mute,
    Shuffle,
    Repeat,
    RadioCapture,
    PositionSecs,
    DurationSecs,
}

impl From<Status> for ModernProperty {
    fn from(status: Status) -> Self {
        match status {
            Status::Volume => Self::Volume,
            Status::Balance => Self::Balance,
            Status::Mute => Self::Mute,
            Status::Shuffle => Self::Shuffle,
            Status::Repeat => Self::Repeat,
            Status::RadioCapture => Self::RadioCapture,
            Status::Position => Self::PositionSecs,
            Status::Length => Self::DurationSecs,
        }
    }
}

/// Raw player state codes of the modern SDK.
const STATE_STOPPED: i32 = 0;
const STATE_PAUSED: i32 = 1;
const STATE_PLAYING: i32 = 2;

/// Item properties as the modern SDK reports them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModernItemInfo {
    pub file_name: String,
    pub duration_secs: f64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub date: String,
    pub genre: String,
    /// Rating in `0.0..=5.0`.
    pub mark: f64,
    /// Item is a network stream rather than a local file.
    pub stream: bool,
    pub bitrate: u32,
    pub channels: u32,
    pub samplerate: u32,
    pub file_size: u64,
}

/// Raw modern SDK surface.
pub trait ModernSdk: Send + Sync {
    fn version_string(&self) -> String;

    fn play(&self) -> EngineResult<()>;
    fn play_item(&self, item: NativeHandle) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;
    fn pause(&self) -> EngineResult<()>;
    fn next(&self) -> EngineResult<()>;
    fn prev(&self) -> EngineResult<()>;
    fn state(&self) -> i32;

    fn property_get(&self, property: ModernProperty) -> EngineResult<f64>;
    fn property_set(&self, property: ModernProperty, value: f64) -> EngineResult<()>;

    fn playing_playlist(&self) -> Option<NativeHandle>;
    fn playing_item(&self) -> Option<NativeHandle>;

    fn playlists(&self) -> EngineResult<Vec<NativeHandle>>;
    fn playlist_is_valid(&self, playlist: NativeHandle) -> bool;
    fn playlist_name(&self, playlist: NativeHandle) -> EngineResult<String>;
    fn playlist_items(&self, playlist: NativeHandle) -> EngineResult<Vec<NativeHandle>>;
    fn playlist_create(&self, name: &str) -> EngineResult<NativeHandle>;
    /// Adds a file path or URL; the modern SDK does not distinguish them.
    fn playlist_add(&self, playlist: NativeHandle, location: &str) -> EngineResult<()>;
    fn playlist_begin_update(&self, playlist: NativeHandle) -> EngineResult<()>;
    fn playlist_end_update(&self, playlist: NativeHandle) -> EngineResult<()>;

    fn item_info(&self, item: NativeHandle) -> EngineResult<ModernItemInfo>;
    fn item_set_mark(&self, item: NativeHandle, mark: f64) -> EngineResult<()>;
    fn item_delete(&self, item: NativeHandle, physically: bool) -> EngineResult<()>;
    fn item_cover(&self, item: NativeHandle) -> EngineResult<Option<CoverArt>>;

    /// Inserts into the play queue at `index`; `-1` appends.
    fn queue_insert(&self, item: NativeHandle, index: i32) -> EngineResult<()>;
    fn queue_remove(&self, item: NativeHandle) -> EngineResult<()>;

    /// Extensions with leading dot, e.g. `.mp3`.
    fn file_formats(&self) -> EngineResult<Vec<String>>;
}

/// Adapter presenting the modern SDK through the normalized contract.
pub struct ModernAdapter {
    sdk: Arc<dyn ModernSdk>,
}

impl ModernAdapter {
    pub fn new(sdk: Arc<dyn ModernSdk>) -> Self {
        Self { sdk }
    }

    pub fn version(&self) -> String {
        self.sdk.version_string()
    }

    pub fn start(&self) -> EngineResult<()> {
        self.sdk.play()
    }

    /// The modern SDK plays items directly; the playlist is implied.
    pub fn start_entry(&self, _playlist: NativeHandle, entry: NativeHandle) -> EngineResult<()> {
        self.sdk.play_item(entry)
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
        match self.sdk.state() {
            STATE_STOPPED => Ok(PlaybackState::Stopped),
            STATE_PAUSED => Ok(PlaybackState::Paused),
            STATE_PLAYING => Ok(PlaybackState::Playing),
            other => Err(EngineError::new("GetState", other)),
        }
    }

    pub fn status(&self, status: Status) -> EngineResult<StatusValue> {
        let raw = self.sdk.property_get(status.into())?;
        Ok(match status {
            Status::Volume => (raw.clamp(0.0, 1.0) * 100.0).round() as u32,
            Status::Balance => ((raw.clamp(-1.0, 1.0) + 1.0) * 50.0).round() as u32,
            Status::Position | Status::Length => raw.max(0.0).floor() as u32,
            _ => u32::from(raw != 0.0),
        })
    }

    pub fn set_status(&self, status: Status, value: StatusValue) -> EngineResult<()> {
        let raw = match status {
            Status::Volume => f64::from(value) / 100.0,
            Status::Balance => f64::from(value) / 50.0 - 1.0,
            _ => f64::from(value),
        };
        self.sdk.property_set(status.into(), raw)
    }

    pub fn playing(&self) -> PlayingContext {
        PlayingContext {
            playlist: self.sdk.playing_playlist(),
            entry: self.sdk.playing_item(),
        }
    }

    pub fn playlists(&self) -> EngineResult<Vec<NativeHandle>> {
        self.sdk.playlists()
    }

    pub fn is_valid(&self, playlist: NativeHandle) -> bool {
        self.sdk.playlist_is_valid(playlist)
    }

    pub fn playlist_title(&self, playlist: NativeHandle) -> EngineResult<String> {
        self.sdk.playlist_name(playlist)
    }

    pub fn fetch_playlist(&self, playlist: NativeHandle) -> EngineResult<PlaylistData> {
        let title = self.sdk.playlist_name(playlist)?;
        let entries = self
            .sdk
            .playlist_items(playlist)?
            .into_iter()
            .map(|item| Ok(Self::normalize_item(item, self.sdk.item_info(item)?)))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(PlaylistData { title, entries })
    }

    fn normalize_item(handle: NativeHandle, info: ModernItemInfo) -> EntryData {
        let duration = Duration::from_secs_f64(info.duration_secs.max(0.0));
        let source_type = match (info.stream, duration.is_zero()) {
            (false, _) => SourceType::File,
            (true, true) => SourceType::Radio,
            (true, false) => SourceType::Url,
        };
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
            filename: info.file_name,
            duration,
            tags,
            rating: info.mark.clamp(0.0, 5.0),
            source_type,
            bitrate: info.bitrate,
            channels: info.channels,
            samplerate: info.samplerate,
            filesize: info.file_size,
        }
    }

    fn entry(&self, item: NativeHandle) -> EngineResult<EntryData> {
        Ok(Self::normalize_item(item, self.sdk.item_info(item)?))
    }

    pub fn rating(&self, entry: NativeHandle) -> EngineResult<f64> {
        Ok(self.entry(entry)?.rating)
    }

    pub fn set_rating(&self, entry: NativeHandle, rating: f64) -> EngineResult<()> {
        self.sdk.item_set_mark(entry, rating)
    }

    pub fn source_type(&self, entry: NativeHandle) -> EngineResult<SourceType> {
        Ok(self.entry(entry)?.source_type)
    }

    pub fn filename(&self, entry: NativeHandle) -> EngineResult<String> {
        Ok(self.sdk.item_info(entry)?.file_name)
    }

    pub fn formatted_title(&self, entry: NativeHandle, format: &str) -> EngineResult<String> {
        Ok(format_title(&self.entry(entry)?, format))
    }

    pub fn cover(&self, entry: NativeHandle) -> EngineResult<Option<CoverArt>> {
        self.sdk.item_cover(entry)
    }

    pub fn enqueue(&self, entry: NativeHandle, at_front: bool) -> EngineResult<()> {
        self.sdk.queue_insert(entry, if at_front { 0 } else { -1 })
    }

    pub fn dequeue(&self, entry: NativeHandle) -> EngineResult<()> {
        self.sdk.queue_remove(entry)
    }

    pub fn create_playlist(&self, title: &str) -> EngineResult<NativeHandle> {
        self.sdk.playlist_create(title)
    }

    pub fn add_file(&self, playlist: NativeHandle, path: &Path) -> EngineResult<()> {
        self.sdk.playlist_add(playlist, &path.to_string_lossy())
    }

    pub fn add_url(&self, playlist: NativeHandle, url: &str) -> EngineResult<()> {
        self.sdk.playlist_add(playlist, url)
    }

    pub fn remove_entry(&self, entry: NativeHandle, physically: bool) -> EngineResult<()> {
        self.sdk.item_delete(entry, physically)
    }

    pub fn lock(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.sdk.playlist_begin_update(playlist)
    }

    pub fn unlock(&self, playlist: NativeHandle) -> EngineResult<()> {
        self.sdk.playlist_end_update(playlist)
    }

    pub fn supported_extensions(&self) -> EngineResult<Vec<String>> {
        Ok(self
            .sdk
            .file_formats()?
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_without_duration_is_radio() {
        let info = ModernItemInfo {
            file_name: "http://radio.example:8000/stream".into(),
            stream: true,
            ..Default::default()
        };
        let entry = ModernAdapter::normalize_item(NativeHandle(1), info);
        assert_eq!(entry.source_type, SourceType::Radio);
    }

    #[test]
    fn rating_is_clamped() {
        let info = ModernItemInfo {
            mark: 7.5,
            ..Default::default()
        };
        assert_eq!(ModernAdapter::normalize_item(NativeHandle(1), info).rating, 5.0);
    }
}
