//! Normalized engine domain types.
//!
//! These types are shared by every SDK generation. Adapters convert the
//! generation-specific representations into these before anything above the
//! engine layer sees them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque engine-side reference to a playlist or an entry.
///
/// Meaningless outside the adapter; callers only ever see stable ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Engine playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Where an entry's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    /// Local file.
    #[default]
    File,
    /// Remote URL (finite stream).
    Url,
    /// Internet radio (infinite stream).
    Radio,
}

impl SourceType {
    /// Integer code used by the playlist store.
    #[must_use]
    pub fn as_db(self) -> i32 {
        match self {
            Self::File => 0,
            Self::Url => 1,
            Self::Radio => 2,
        }
    }

    /// Parses the integer code used by the playlist store.
    #[must_use]
    pub fn from_db(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::File),
            1 => Some(Self::Url),
            2 => Some(Self::Radio),
            _ => None,
        }
    }

    /// Infers the source type from a location string.
    ///
    /// Used by generations that do not report it directly.
    #[must_use]
    pub fn infer(location: &str, duration: Duration) -> Self {
        let lower = location.to_ascii_lowercase();
        let remote = ["http://", "https://", "mms://", "rtsp://", "ftp://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme));
        match (remote, duration.is_zero()) {
            (false, _) => Self::File,
            (true, true) => Self::Radio,
            (true, false) => Self::Url,
        }
    }
}

/// Player status properties, normalized across generations.
///
/// Values are exchanged as [`StatusValue`] with the following conventions:
/// volume and balance `0..=100` (balance centered at 50), flags `0`/`1`,
/// position and length in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Volume,
    Balance,
    Mute,
    Shuffle,
    Repeat,
    RadioCapture,
    Position,
    Length,
}

impl Status {
    /// Statuses polled on every tick to detect changes the engine does not announce.
    pub const OBSERVED: [Status; 6] = [
        Status::Volume,
        Status::Balance,
        Status::Mute,
        Status::Shuffle,
        Status::Repeat,
        Status::RadioCapture,
    ];

    /// Whether the value is a `0`/`1` flag.
    #[must_use]
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            Self::Mute | Self::Shuffle | Self::Repeat | Self::RadioCapture
        )
    }

    /// Checks that `value` is acceptable for `set_status`.
    pub(crate) fn check_settable(self, value: StatusValue) -> Result<(), String> {
        match self {
            Self::Length => Err("length is read-only".to_string()),
            Self::Volume | Self::Balance if value > 100 => {
                Err(format!("{:?} must be within 0..=100, got {}", self, value))
            }
            s if s.is_flag() && value > 1 => {
                Err(format!("{:?} is a flag, got {}", s, value))
            }
            _ => Ok(()),
        }
    }
}

/// Normalized status value.
pub type StatusValue = u32;

/// Normalized description of one playlist entry as reported by the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryData {
    pub handle: NativeHandle,
    pub filename: String,
    pub duration: Duration,
    /// Tag fields keyed by name (`title`, `artist`, `album`, `date`, `genre`).
    pub tags: BTreeMap<String, String>,
    /// Star rating in `0.0..=5.0`.
    pub rating: f64,
    pub source_type: SourceType,
    pub bitrate: u32,
    pub channels: u32,
    pub samplerate: u32,
    pub filesize: u64,
}

impl EntryData {
    /// Returns a tag value or an empty string.
    #[must_use]
    pub fn tag(&self, name: &str) -> &str {
        self.tags.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Full content of one playlist as fetched for a reload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaylistData {
    pub title: String,
    pub entries: Vec<EntryData>,
}

/// What the engine is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayingContext {
    pub playlist: Option<NativeHandle>,
    pub entry: Option<NativeHandle>,
}

/// Album cover reference returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverArt {
    /// Cover stored in an external image file.
    File(std::path::PathBuf),
    /// Cover embedded in the track (raw encoded image bytes).
    Embedded(bytes::Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_db_codes_are_stable() {
        for source in [SourceType::File, SourceType::Url, SourceType::Radio] {
            assert_eq!(SourceType::from_db(source.as_db()), Some(source));
        }
        assert_eq!(SourceType::from_db(9), None);
    }

    #[test]
    fn source_type_inference() {
        let minute = Duration::from_secs(60);
        assert_eq!(SourceType::infer("C:\\Music\\a.mp3", minute), SourceType::File);
        assert_eq!(SourceType::infer("http://host/a.mp3", minute), SourceType::Url);
        assert_eq!(SourceType::infer("HTTP://radio:8000", Duration::ZERO), SourceType::Radio);
    }

    #[test]
    fn status_settable_ranges() {
        assert!(Status::Volume.check_settable(100).is_ok());
        assert!(Status::Volume.check_settable(101).is_err());
        assert!(Status::Mute.check_settable(1).is_ok());
        assert!(Status::Mute.check_settable(2).is_err());
        assert!(Status::Length.check_settable(0).is_err());
        assert!(Status::Position.check_settable(3600).is_ok());
    }
}
