//! Per-playlist debounce of engine change notifications.
//!
//! The engine reports one change per edited entry, often dozens within a few
//! milliseconds. The coalescer turns such a burst into a single reload:
//!
//! 1. The first reload-relevant flag for a playlist that is not pending
//!    schedules a fire at `last_fire + min_interval` (or immediately if that
//!    is already past).
//! 2. Further flags before the fire are OR-ed into the pending set; the
//!    deadline never moves.
//! 3. The dispatch tick calls [`ChangeCoalescer::take_due`], reloads every
//!    returned playlist and the coalescer records the fire time.
//!
//! Timers are plain deadlines polled by the tick; nothing sleeps.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::engine::ChangeFlags;
use crate::ids::PlaylistId;

#[derive(Debug, Clone)]
struct PendingChange {
    last_fire: Instant,
    flags: ChangeFlags,
    due_at: Option<Instant>,
}

/// Debounce state for every tracked playlist.
#[derive(Debug)]
pub struct ChangeCoalescer {
    min_interval: Duration,
    pending: HashMap<PlaylistId, PendingChange>,
}

impl ChangeCoalescer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            pending: HashMap::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Starts tracking a playlist; `now` counts as its last fire.
    pub fn track(&mut self, id: PlaylistId, now: Instant) {
        self.pending.entry(id).or_insert(PendingChange {
            last_fire: now,
            flags: ChangeFlags::empty(),
            due_at: None,
        });
    }

    /// Records a change notification.
    ///
    /// Returns the deadline if this call scheduled a new fire. Flags that do
    /// not require a reload and untracked playlists are ignored.
    pub fn on_change(
        &mut self,
        id: PlaylistId,
        flags: ChangeFlags,
        now: Instant,
    ) -> Option<Instant> {
        if !flags.needs_reload() {
            return None;
        }
        let min_interval = self.min_interval;
        let state = self.pending.get_mut(&id)?;
        state.flags |= flags & ChangeFlags::RELOAD;

        if state.due_at.is_some() {
            return None;
        }
        let elapsed = now.saturating_duration_since(state.last_fire);
        let due_at = now + min_interval.saturating_sub(elapsed);
        state.due_at = Some(due_at);
        log::trace!(
            "[ChangeCoalescer] Playlist {} reload scheduled in {}ms",
            id,
            due_at.saturating_duration_since(now).as_millis()
        );
        Some(due_at)
    }

    /// Removes and returns every playlist whose fire time has come, earliest
    /// deadline first, together with the flags accumulated for it.
    pub fn take_due(&mut self, now: Instant) -> Vec<(PlaylistId, ChangeFlags)> {
        let mut due: Vec<(Instant, PlaylistId, ChangeFlags)> = self
            .pending
            .iter_mut()
            .filter_map(|(id, state)| {
                let at = state.due_at.filter(|at| *at <= now)?;
                let flags = std::mem::take(&mut state.flags);
                state.due_at = None;
                state.last_fire = now;
                Some((at, *id, flags))
            })
            .collect();
        due.sort_by_key(|(at, id, _)| (*at, *id));
        due.into_iter().map(|(_, id, flags)| (id, flags)).collect()
    }

    /// Stops tracking a playlist, dropping any pending fire.
    pub fn cancel(&mut self, id: PlaylistId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: PlaylistId) -> bool {
        self.pending
            .get(&id)
            .is_some_and(|state| state.due_at.is_some())
    }

    /// Flags accumulated for a pending playlist.
    pub fn pending_flags(&self, id: PlaylistId) -> ChangeFlags {
        self.pending
            .get(&id)
            .map(|state| state.flags)
            .unwrap_or_default()
    }

    /// Earliest scheduled fire across all playlists.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().filter_map(|state| state.due_at).min()
    }
}
