//! Engine adapter layer.
//!
//! The media engine ships incompatible SDK generations. Each generation has
//! its own raw trait ([`ClassicSdk`], [`ModernSdk`]) and adapter; the
//! [`EngineAdapter`] enum is selected once from the [`NativeEngine`] the host
//! hands over and dispatches statically afterwards. Callers above this layer
//! never learn which generation is active.

pub mod classic;
pub mod modern;
pub mod notifications;
pub mod title_format;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use crate::error::{BridgeError, BridgeResult};

pub use classic::{ClassicAdapter, ClassicEntryInfo, ClassicSdk};
pub use modern::{ModernAdapter, ModernItemInfo, ModernProperty, ModernSdk};
pub use notifications::{ChangeFlags, PlayerNotification, StorageEvent};
pub use types::{
    CoverArt, EntryData, NativeHandle, PlaybackState, PlayingContext, PlaylistData, SourceType,
    Status, StatusValue,
};

/// Oldest classic build the adapter understands (3.00).
pub const MIN_CLASSIC_VERSION: i32 = 3000;

/// Native engine object handed over by the host at startup.
#[derive(Clone)]
pub enum NativeEngine {
    Classic(Arc<dyn ClassicSdk>),
    Modern(Arc<dyn ModernSdk>),
}

/// Uniform engine control surface.
///
/// Every method validates its arguments, forwards to the active generation
/// and maps SDK failures to [`BridgeError::EngineCallFailed`].
pub enum EngineAdapter {
    Classic(ClassicAdapter),
    Modern(ModernAdapter),
}

macro_rules! dispatch {
    ($self:expr, $adapter:ident => $call:expr) => {
        match $self {
            EngineAdapter::Classic($adapter) => $call,
            EngineAdapter::Modern($adapter) => $call,
        }
    };
}

impl EngineAdapter {
    /// Selects the adapter for the given engine.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] for classic builds older than
    /// [`MIN_CLASSIC_VERSION`].
    pub fn select(native: NativeEngine) -> BridgeResult<Self> {
        let adapter = match native {
            NativeEngine::Classic(sdk) => {
                let build = sdk.version_id();
                if build < MIN_CLASSIC_VERSION {
                    return Err(BridgeError::Configuration(format!(
                        "unsupported engine build {} (need >= {})",
                        build, MIN_CLASSIC_VERSION
                    )));
                }
                Self::Classic(ClassicAdapter::new(sdk))
            }
            NativeEngine::Modern(sdk) => Self::Modern(ModernAdapter::new(sdk)),
        };
        log::info!(
            "[EngineAdapter] Using {} SDK, engine version {}",
            adapter.generation(),
            adapter.version()
        );
        Ok(adapter)
    }

    /// Name of the active generation, for logs.
    pub fn generation(&self) -> &'static str {
        match self {
            Self::Classic(_) => "classic",
            Self::Modern(_) => "modern",
        }
    }

    pub fn version(&self) -> String {
        dispatch!(self, a => a.version())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start(&self) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.start())?)
    }

    pub fn start_entry(&self, playlist: NativeHandle, entry: NativeHandle) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.start_entry(playlist, entry))?)
    }

    pub fn stop(&self) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.stop())?)
    }

    pub fn pause(&self) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.pause())?)
    }

    pub fn next(&self) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.next())?)
    }

    pub fn previous(&self) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.previous())?)
    }

    pub fn playback_state(&self) -> BridgeResult<PlaybackState> {
        Ok(dispatch!(self, a => a.playback_state())?)
    }

    pub fn playing(&self) -> PlayingContext {
        dispatch!(self, a => a.playing())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────────

    pub fn status(&self, status: Status) -> BridgeResult<StatusValue> {
        Ok(dispatch!(self, a => a.status(status))?)
    }

    /// Sets a status value in normalized units.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] for read-only statuses and
    /// out-of-range values.
    pub fn set_status(&self, status: Status, value: StatusValue) -> BridgeResult<()> {
        status.check_settable(value).map_err(BridgeError::InvalidArgument)?;
        Ok(dispatch!(self, a => a.set_status(status, value))?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playlists and entries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn playlists(&self) -> BridgeResult<Vec<NativeHandle>> {
        Ok(dispatch!(self, a => a.playlists())?)
    }

    /// Liveness probe for a playlist handle.
    pub fn is_valid(&self, playlist: NativeHandle) -> bool {
        dispatch!(self, a => a.is_valid(playlist))
    }

    pub fn playlist_title(&self, playlist: NativeHandle) -> BridgeResult<String> {
        Ok(dispatch!(self, a => a.playlist_title(playlist))?)
    }

    /// Fetches title and full entry list of a playlist.
    pub fn fetch_playlist(&self, playlist: NativeHandle) -> BridgeResult<PlaylistData> {
        Ok(dispatch!(self, a => a.fetch_playlist(playlist))?)
    }

    pub fn source_type(&self, entry: NativeHandle) -> BridgeResult<SourceType> {
        Ok(dispatch!(self, a => a.source_type(entry))?)
    }

    pub fn filename(&self, entry: NativeHandle) -> BridgeResult<String> {
        Ok(dispatch!(self, a => a.filename(entry))?)
    }

    pub fn formatted_title(&self, entry: NativeHandle, format: &str) -> BridgeResult<String> {
        Ok(dispatch!(self, a => a.formatted_title(entry, format))?)
    }

    pub fn cover(&self, entry: NativeHandle) -> BridgeResult<Option<CoverArt>> {
        Ok(dispatch!(self, a => a.cover(entry))?)
    }

    pub fn rating(&self, entry: NativeHandle) -> BridgeResult<f64> {
        Ok(dispatch!(self, a => a.rating(entry))?)
    }

    /// Sets an entry's rating.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] if `rating` is outside `0..=5`.
    pub fn set_rating(&self, entry: NativeHandle, rating: f64) -> BridgeResult<()> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(BridgeError::invalid(format!(
                "rating must be within 0..=5, got {}",
                rating
            )));
        }
        Ok(dispatch!(self, a => a.set_rating(entry, rating))?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Play queue
    // ─────────────────────────────────────────────────────────────────────────

    pub fn enqueue(&self, entry: NativeHandle, at_front: bool) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.enqueue(entry, at_front))?)
    }

    pub fn dequeue(&self, entry: NativeHandle) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.dequeue(entry))?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_playlist(&self, title: &str) -> BridgeResult<NativeHandle> {
        Ok(dispatch!(self, a => a.create_playlist(title))?)
    }

    pub fn add_file(&self, playlist: NativeHandle, path: &Path) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.add_file(playlist, path))?)
    }

    pub fn add_url(&self, playlist: NativeHandle, url: &str) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.add_url(playlist, url))?)
    }

    pub fn remove_entry(&self, entry: NativeHandle, physically: bool) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.remove_entry(entry, physically))?)
    }

    pub fn lock(&self, playlist: NativeHandle) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.lock(playlist))?)
    }

    pub fn unlock(&self, playlist: NativeHandle) -> BridgeResult<()> {
        Ok(dispatch!(self, a => a.unlock(playlist))?)
    }

    pub fn supported_extensions(&self) -> BridgeResult<Vec<String>> {
        Ok(dispatch!(self, a => a.supported_extensions())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimEngine;

    #[test]
    fn both_generations_normalize_volume() {
        for native in [SimEngine::new().classic(), SimEngine::new().modern()] {
            let adapter = EngineAdapter::select(native).unwrap();
            adapter.set_status(Status::Volume, 40).unwrap();
            assert_eq!(adapter.status(Status::Volume).unwrap(), 40);
        }
    }

    #[test]
    fn out_of_range_arguments_are_rejected() {
        let adapter = EngineAdapter::select(SimEngine::new().modern()).unwrap();
        let err = adapter.set_status(Status::Volume, 101).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");

        let err = adapter.set_rating(NativeHandle(1), 5.5).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn old_classic_build_is_rejected() {
        let sim = SimEngine::new();
        sim.set_version_id(2900);
        let err = EngineAdapter::select(sim.classic()).err().unwrap();
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn engine_failure_maps_to_engine_call_failed() {
        let sim = SimEngine::new();
        let adapter = EngineAdapter::select(sim.classic()).unwrap();
        sim.fail_next("Play");
        assert_eq!(adapter.start().unwrap_err().code(), "engine_call_failed");
        assert!(adapter.start().is_ok());
    }
}
