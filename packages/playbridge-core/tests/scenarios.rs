//! End-to-end behaviour of the dispatch context against a simulated engine.

use std::sync::Arc;

use parking_lot::Mutex;
use playbridge_core::testing::{Inspect, ManualClock, SimEngine};
use playbridge_core::{
    BridgeConfig, ChangeFlags, EventSubscription, ListenerResult, NativeHandle, PlaybackControl,
    PlayerEvent, PlayerManager, PlayerStatus, PlaylistEditor, PlaylistQuery, PlaylistState,
    PlaylistUpdate, ResolvedTrack, Status, TrackDescription, CURRENT,
};

struct Harness {
    sim: SimEngine,
    manager: PlayerManager,
    clock: ManualClock,
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl Harness {
    fn start(sim: SimEngine) -> Self {
        Self::start_with(sim, BridgeConfig::default())
    }

    fn start_with(sim: SimEngine, config: BridgeConfig) -> Self {
        let clock = ManualClock::new();
        let manager =
            PlayerManager::initialize_with_clock(config, sim.classic(), Arc::new(clock.clone()))
                .unwrap();
        sim.attach(manager.callbacks());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });

        Self {
            sim,
            manager,
            clock,
            events,
        }
    }

    fn tick_after(&self, ms: u64) {
        self.clock.advance_ms(ms);
        self.manager.on_tick();
    }

    fn take_events(&self) -> Vec<PlayerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn changed(&self, handle: NativeHandle) {
        self.manager
            .callbacks()
            .storage_changed(handle, ChangeFlags::CONTENT.bits());
    }

    fn fetches(&self) -> usize {
        self.sim.call_count("StorageGetTitle")
    }
}

#[test]
fn burst_of_changes_collapses_into_one_reload() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Road Trip", &["a.mp3", "b.mp3", "c.mp3"]);
    let h = Harness::start(sim);

    let id = h.manager.stable_id(handle).unwrap();
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Ready));
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 3);
    let c1 = h.manager.playlist_checksum(id.0).unwrap();
    let fetches = h.fetches();

    // Two "changed" notifications and one "entry added" within 200ms.
    h.changed(handle);
    h.manager.on_tick();
    h.changed(handle);
    h.tick_after(50);
    h.sim.append_entry(handle, "d.mp3");
    h.changed(handle);
    h.tick_after(150);

    assert!(h.manager.reload_pending(id));
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Stale));
    h.tick_after(799);
    assert_eq!(h.fetches(), fetches);

    h.tick_after(1);
    assert_eq!(h.fetches(), fetches + 1);
    assert!(!h.manager.reload_pending(id));

    let c2 = h.manager.playlist_checksum(id.0).unwrap();
    assert_ne!(c1, c2);
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 4);
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Ready));
    assert_eq!(
        h.take_events(),
        vec![PlayerEvent::PlaylistContentChanged {
            playlist_id: id,
            checksum: c2
        }]
    );

    for _ in 0..5 {
        h.tick_after(500);
    }
    assert_eq!(h.fetches(), fetches + 1);
}

#[test]
fn spaced_notifications_respect_minimum_interval() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Spaced", &["a.mp3"]);
    let h = Harness::start(sim);
    let fetches = h.fetches();

    // Long after discovery: fires on the same tick.
    h.clock.advance_ms(5_000);
    h.changed(handle);
    h.manager.on_tick();
    assert_eq!(h.fetches(), fetches + 1);

    // 300ms after that fire: waits out the remaining 700ms.
    h.clock.advance_ms(300);
    h.changed(handle);
    h.manager.on_tick();
    assert_eq!(h.fetches(), fetches + 1);
    h.tick_after(699);
    assert_eq!(h.fetches(), fetches + 1);
    h.tick_after(1);
    assert_eq!(h.fetches(), fetches + 2);
}

#[test]
fn unchanged_content_reload_publishes_nothing() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Static", &["a.mp3", "b.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let entries = h.manager.playlist_entries(id.0).unwrap();

    h.changed(handle);
    h.tick_after(1_000);

    assert!(h.take_events().is_empty());
    assert_eq!(h.manager.playlist_entries(id.0).unwrap(), entries);
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Ready));
}

#[test]
fn ui_only_flags_do_not_reload() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Focus", &["a.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let fetches = h.fetches();

    h.manager
        .callbacks()
        .storage_changed(handle, (ChangeFlags::SELECTION | ChangeFlags::FOCUS).bits());
    h.tick_after(2_000);

    assert!(!h.manager.reload_pending(id));
    assert_eq!(h.fetches(), fetches);
}

#[test]
fn removed_entry_field_is_invalid_argument() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Shrinking", &["a.mp3", "b.mp3", "c.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let first = h.manager.playlist_entries(id.0).unwrap()[0];

    assert_eq!(
        h.manager.entry_field(first, "filename").unwrap().to_string(),
        "a.mp3"
    );

    h.sim.remove_entry_at(handle, 0);
    h.changed(handle);
    h.tick_after(1_000);

    let err = h.manager.entry_field(first, "filename").unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 2);
}

#[test]
fn locked_playlist_still_reloads() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Locked", &["a.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();

    h.manager.lock_playlist(id.0).unwrap();
    assert!(h.sim.is_locked(handle));

    h.sim.append_entry(handle, "b.mp3");
    h.changed(handle);
    h.tick_after(1_000);

    let info = h
        .manager
        .playlists()
        .into_iter()
        .find(|p| p.id == id)
        .unwrap();
    assert!(info.locked);
    assert_eq!(info.entry_count, 2);

    h.manager.unlock_playlist(id.0).unwrap();
    assert!(!h.sim.is_locked(handle));
}

#[test]
fn removal_cancels_pending_reload() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Doomed", &["a.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let fetches = h.fetches();

    h.changed(handle);
    h.manager.on_tick();
    assert!(h.manager.reload_pending(id));

    h.sim.remove_playlist(handle);
    h.manager.callbacks().storage_removed(handle);
    h.tick_after(2_000);

    assert!(!h.manager.reload_pending(id));
    assert_eq!(h.fetches(), fetches);
    assert_eq!(
        h.take_events(),
        vec![PlayerEvent::PlaylistRemoved { playlist_id: id }]
    );
    assert_eq!(
        h.manager.playlist_checksum(id.0).unwrap_err().code(),
        "invalid_argument"
    );
}

#[test]
fn created_playlist_is_picked_up_when_announced() {
    let h = Harness::start(SimEngine::new());

    let id = h.manager.create_playlist("Fresh").unwrap();
    assert!(h.manager.playlists().is_empty());

    h.manager.on_tick();
    assert_eq!(
        h.take_events(),
        vec![PlayerEvent::PlaylistAdded { playlist_id: id }]
    );
    assert_eq!(h.manager.playlists()[0].title, "Fresh");

    h.manager
        .add_url_to_playlist(id.0, "http://radio.example:8000/live")
        .unwrap();
    h.manager.on_tick();
    assert!(h.manager.playlist_entries(id.0).unwrap().is_empty());

    h.tick_after(1_000);
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 1);
}

#[test]
fn failed_reload_leaves_playlist_stale_until_next_change() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Flaky", &["a.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();

    h.sim.append_entry(handle, "b.mp3");
    h.sim.fail_next("StorageGetTitle");
    h.changed(handle);
    h.tick_after(1_000);

    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Stale));
    assert!(matches!(
        h.take_events().as_slice(),
        [PlayerEvent::PlaylistReloadFailed { playlist_id, .. }] if *playlist_id == id
    ));

    // No retry without a new notification.
    h.tick_after(5_000);
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Stale));
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 1);

    h.changed(handle);
    h.manager.on_tick();
    assert_eq!(h.manager.playlist_state(id), Some(PlaylistState::Ready));
    assert_eq!(h.manager.playlist_entries(id.0).unwrap().len(), 2);
}

#[test]
fn failing_listeners_are_isolated() {
    let h = Harness::start(SimEngine::new());
    h.manager.subscribe(|_| Err("listener failed".into()));
    h.manager.subscribe(|_| panic!("listener panicked"));
    let late = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&late);
    h.manager.subscribe(move |_| {
        *counter.lock() += 1;
        Ok(())
    });

    h.manager.set_status(Status::Mute, 1).unwrap();
    h.manager.on_tick();

    assert_eq!(*late.lock(), 1);
    assert_eq!(
        h.take_events(),
        vec![PlayerEvent::StatusChanged {
            status: Status::Mute,
            value: 1
        }]
    );
}

#[test]
fn unsubscribed_listener_misses_queued_events() {
    let h = Harness::start(SimEngine::new());
    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    let id = h.manager.register_listener(Arc::new(move |_: &PlayerEvent| -> ListenerResult {
        *counter.lock() += 1;
        Ok(())
    }));

    h.manager.set_status(Status::Volume, 10).unwrap();
    assert!(h.manager.unregister_listener(id));
    assert!(!h.manager.unregister_listener(id));
    h.manager.on_tick();

    assert_eq!(*seen.lock(), 0);
    assert_eq!(h.take_events().len(), 1);
}

#[test]
fn unannounced_track_change_round_trips_ids() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Now Playing", &["a.mp3", "b.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let entries = h.manager.playlist_entries(id.0).unwrap();

    assert_eq!(h.manager.playing_track().unwrap_err().code(), "not_found");

    h.sim.set_playing(handle, 1);
    h.manager.on_tick();

    let expected = ResolvedTrack {
        playlist_id: id,
        entry_id: entries[1],
    };
    assert!(h.take_events().contains(&PlayerEvent::TrackChanged {
        track: Some(expected)
    }));
    assert_eq!(h.manager.playing_track().unwrap(), expected);
    assert_eq!(h.manager.playing_playlist().unwrap(), id);
    assert_eq!(h.manager.absolute_playlist_id(CURRENT).unwrap(), id);
    assert_eq!(
        h.manager
            .absolute_track(TrackDescription::new(CURRENT, CURRENT))
            .unwrap(),
        expected
    );
    assert_eq!(
        h.manager
            .absolute_entry_id(TrackDescription::new(id.0, entries[0].0))
            .unwrap(),
        entries[0]
    );
    assert_eq!(h.manager.native_handle(id).unwrap(), handle);
}

#[test]
fn identical_replacement_keeps_ids_playable() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Swap", &["a.mp3", "b.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let entries = h.manager.playlist_entries(id.0).unwrap();
    let checksum = h.manager.playlist_checksum(id.0).unwrap();
    h.take_events();

    // Same file removed and added back: new native handle, same content.
    h.sim.remove_entry_at(handle, 1);
    h.sim.append_entry(handle, "b.mp3");
    h.changed(handle);
    h.manager.on_tick();
    h.tick_after(1_000);

    assert_eq!(h.manager.playlist_entries(id.0).unwrap(), entries);
    assert_eq!(h.manager.playlist_checksum(id.0).unwrap(), checksum);
    assert!(!h
        .take_events()
        .iter()
        .any(|event| matches!(event, PlayerEvent::PlaylistContentChanged { .. })));

    let expected = ResolvedTrack {
        playlist_id: id,
        entry_id: entries[1],
    };
    h.manager
        .start_track(TrackDescription::new(id.0, entries[1].0))
        .unwrap();
    h.manager.on_tick();
    assert_eq!(h.manager.playing_track().unwrap(), expected);
    assert!(h.take_events().contains(&PlayerEvent::TrackChanged {
        track: Some(expected)
    }));
}

#[test]
fn malformed_ids_are_invalid_argument() {
    let sim = SimEngine::new();
    let handle = sim.add_playlist("Ids", &["a.mp3"]);
    let other = sim.add_playlist("Other", &["b.mp3"]);
    let h = Harness::start(sim);
    let id = h.manager.stable_id(handle).unwrap();
    let foreign = h
        .manager
        .playlist_entries(h.manager.stable_id(other).unwrap().0)
        .unwrap()[0];

    for raw in [0, -2, 999] {
        assert_eq!(
            h.manager.absolute_playlist_id(raw).unwrap_err().code(),
            "invalid_argument"
        );
    }
    assert_eq!(
        h.manager
            .absolute_track(TrackDescription::new(id.0, foreign.0))
            .unwrap_err()
            .code(),
        "invalid_argument"
    );
    assert_eq!(
        h.manager.playlist_checksum(999).unwrap_err().code(),
        "invalid_argument"
    );
}

#[test]
fn disabled_status_tracking_skips_polling() {
    let sim = SimEngine::new();
    let config = BridgeConfig {
        track_status_changes: false,
        ..BridgeConfig::default()
    };
    let h = Harness::start_with(sim, config);

    h.sim.set_raw_shuffle(true);
    h.tick_after(100);
    assert!(h.take_events().is_empty());
}

#[test]
fn store_on_disk_starts_empty_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = BridgeConfig {
        database_path: Some(dir.path().join("playlists.db")),
        ..BridgeConfig::default()
    };

    let sim = SimEngine::new();
    let handle = sim.add_playlist("Persisted", &["a.mp3", "b.mp3"]);
    let first = Harness::start_with(sim.clone(), config.clone());
    let id = first.manager.stable_id(handle).unwrap();
    let old_entry = first.manager.playlist_entries(id.0).unwrap()[0];
    first.manager.finalize();

    let second = Harness::start_with(sim, config);
    let id = second.manager.stable_id(handle).unwrap();
    assert_eq!(second.manager.playlist_entries(id.0).unwrap().len(), 2);
    assert!(second.manager.entry_field(old_entry, "filename").is_err());
}
