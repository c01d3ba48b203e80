//! The same caller-visible behaviour on every SDK generation.

use std::sync::Arc;

use bytes::Bytes;
use playbridge_core::engine::CoverArt;
use playbridge_core::testing::{ManualClock, SimEngine};
use playbridge_core::{
    BridgeConfig, CoverArtProvider, NativeEngine, PlayQueue, PlaybackControl, PlaybackState,
    PlayerManager, PlayerStatus, PlaylistEditor, PlaylistId, PlaylistQuery, SourceType, Status,
    SupportedFormats, TrackDescription, TrackRating,
};

struct Fixture {
    sim: SimEngine,
    manager: PlayerManager,
    clock: ManualClock,
    playlist: PlaylistId,
}

fn both() -> Vec<(&'static str, Fixture)> {
    [
        ("classic", SimEngine::classic as fn(&SimEngine) -> NativeEngine),
        ("modern", SimEngine::modern),
    ]
    .into_iter()
    .map(|(name, select)| {
        let sim = SimEngine::new();
        let handle = sim.add_playlist(
            "Mixed",
            &["/music/one.mp3", "/music/two.flac", "http://radio.example/live"],
        );
        let clock = ManualClock::new();
        let manager = PlayerManager::initialize_with_clock(
            BridgeConfig::default(),
            select(&sim),
            Arc::new(clock.clone()),
        )
        .unwrap();
        sim.attach(manager.callbacks());
        let playlist = manager.absolute_playlist_id(1).unwrap();
        assert_eq!(manager.playlists()[0].native_handle, handle);
        (
            name,
            Fixture {
                sim,
                manager,
                clock,
                playlist,
            },
        )
    })
    .collect()
}

fn track(f: &Fixture, index: usize) -> TrackDescription {
    let entry = f.manager.playlist_entries(f.playlist.0).unwrap()[index];
    TrackDescription::new(f.playlist.0, entry.0)
}

#[test]
fn status_values_are_normalized() {
    for (name, f) in both() {
        f.manager.set_status(Status::Volume, 40).unwrap();
        assert_eq!(f.manager.status(Status::Volume).unwrap(), 40, "{}", name);
        assert_eq!(f.sim.volume(), 40, "{}", name);

        f.manager.set_status(Status::Balance, 75).unwrap();
        assert_eq!(f.manager.status(Status::Balance).unwrap(), 75, "{}", name);

        f.manager.set_status(Status::Repeat, 1).unwrap();
        assert_eq!(f.manager.status(Status::Repeat).unwrap(), 1, "{}", name);

        let err = f.manager.set_status(Status::Volume, 101).unwrap_err();
        assert_eq!(err.code(), "invalid_argument", "{}", name);
        let err = f.manager.set_status(Status::Length, 10).unwrap_err();
        assert_eq!(err.code(), "invalid_argument", "{}", name);
    }
}

#[test]
fn transport_control() {
    for (name, f) in both() {
        assert_eq!(f.manager.playback_state().unwrap(), PlaybackState::Stopped);

        f.manager.start_track(track(&f, 1)).unwrap();
        f.manager.on_tick();
        assert_eq!(f.manager.playback_state().unwrap(), PlaybackState::Playing);
        assert_eq!(
            f.manager.playing_track().unwrap(),
            f.manager.absolute_track(track(&f, 1)).unwrap(),
            "{}",
            name
        );

        f.manager.play_next_track().unwrap();
        assert_eq!(
            f.manager.playing_entry().unwrap(),
            f.manager.absolute_entry_id(track(&f, 2)).unwrap(),
            "{}",
            name
        );

        f.manager.pause_playback().unwrap();
        assert_eq!(f.manager.playback_state().unwrap(), PlaybackState::Paused);
        f.manager.stop_playback().unwrap();
        assert_eq!(f.manager.playback_state().unwrap(), PlaybackState::Stopped);
    }
}

#[test]
fn entry_metadata() {
    for (name, f) in both() {
        assert_eq!(
            f.manager.track_source_type(track(&f, 0)).unwrap(),
            SourceType::File,
            "{}",
            name
        );
        assert_eq!(
            f.manager.track_source_type(track(&f, 2)).unwrap(),
            SourceType::Radio,
            "{}",
            name
        );
        assert_eq!(
            f.manager.entry_filename(track(&f, 1)).unwrap(),
            "/music/two.flac"
        );
        assert_eq!(
            f.manager
                .formatted_entry_title(track(&f, 0), "%a - %T")
                .unwrap(),
            "Sim Artist - one",
            "{}",
            name
        );
        assert_eq!(
            f.manager.supported_track_extensions().unwrap(),
            vec!["mp3", "flac", "ogg"],
            "{}",
            name
        );
    }
}

#[test]
fn ratings_round_trip() {
    for (name, f) in both() {
        f.manager.set_track_rating(track(&f, 0), 4.0).unwrap();
        assert_eq!(f.manager.track_rating(track(&f, 0)).unwrap(), 4.0, "{}", name);

        let err = f.manager.set_track_rating(track(&f, 0), 6.0).unwrap_err();
        assert_eq!(err.code(), "invalid_argument", "{}", name);
    }
}

#[test]
fn play_queue() {
    for (name, f) in both() {
        let handles = f.sim.entry_handles(f.manager.playlists()[0].native_handle);
        f.manager.enqueue_entry(track(&f, 0), false).unwrap();
        f.manager.enqueue_entry(track(&f, 1), false).unwrap();
        f.manager.enqueue_entry(track(&f, 2), true).unwrap();
        assert_eq!(
            f.sim.queue(),
            vec![handles[2], handles[0], handles[1]],
            "{}",
            name
        );

        f.manager.remove_entry_from_queue(track(&f, 0)).unwrap();
        assert_eq!(f.sim.queue(), vec![handles[2], handles[1]], "{}", name);
        let err = f.manager.remove_entry_from_queue(track(&f, 0)).unwrap_err();
        assert_eq!(err.code(), "engine_call_failed", "{}", name);
    }
}

#[test]
fn editing_goes_through_the_debounce() {
    for (name, f) in both() {
        f.manager.remove_track(track(&f, 1), true).unwrap();
        f.manager
            .add_file_to_playlist(f.playlist.0, std::path::Path::new("/music/new.ogg"))
            .unwrap();
        assert_eq!(f.sim.deleted_files(), vec!["/music/two.flac"], "{}", name);

        f.manager.on_tick();
        assert_eq!(f.manager.playlist_entries(f.playlist.0).unwrap().len(), 3);

        f.clock.advance_ms(1_000);
        f.manager.on_tick();
        let entries = f.manager.playlist_entries(f.playlist.0).unwrap();
        assert_eq!(entries.len(), 3, "{}", name);
        assert_eq!(
            f.manager
                .entry_field(entries[2], "filename")
                .unwrap()
                .to_string(),
            "/music/new.ogg",
            "{}",
            name
        );
    }
}

#[test]
fn cover_art() {
    let dir = tempfile::tempdir().unwrap();
    for (name, f) in both() {
        assert!(!f.manager.is_cover_image_file_exist(track(&f, 0)).unwrap());
        let err = f
            .manager
            .save_cover_to_file(track(&f, 0), &dir.path().join("none.png"))
            .unwrap_err();
        assert_eq!(err.code(), "not_found", "{}", name);

        let handles = f.sim.entry_handles(f.manager.playlists()[0].native_handle);
        let image = Bytes::from_static(b"\x89PNG\r\n\x1a\nfake");
        f.sim.set_cover(handles[0], CoverArt::Embedded(image.clone()));
        assert!(f.manager.is_cover_image_file_exist(track(&f, 0)).unwrap());

        let target = dir.path().join(format!("{}.png", name));
        f.manager.save_cover_to_file(track(&f, 0), &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), image.to_vec());
    }
}
