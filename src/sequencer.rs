use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::Catalog;

/// Tracks are identified by their full path throughout the pipeline.
pub type TrackId = PathBuf;

#[derive(Debug, Default)]
struct NavState {
    // May transiently leave [0, len) between operations; corrected by
    // next_track() before the streaming loop ever observes it.
    index: isize,
    skip_requested: bool,
    repeat: bool,
}

/// Navigation state shared between the control surface and the
/// streaming loop. One lock, no nested acquisition.
#[derive(Clone, Default)]
pub struct NavHandle {
    state: Arc<Mutex<NavState>>,
}

impl NavHandle {
    pub fn skip_forward(&self) {
        let mut state = self.state.lock();
        state.skip_requested = true;
        state.index += 1;
    }

    pub fn skip_backward(&self) {
        let mut state = self.state.lock();
        state.skip_requested = true;
        state.index -= 1;
    }

    pub fn set_repeat(&self, enabled: bool) {
        self.state.lock().repeat = enabled;
    }

    pub fn skip_requested(&self) -> bool {
        self.state.lock().skip_requested
    }

    /// Discards any pending skip, e.g. when playback starts fresh.
    pub fn clear_skip(&self) {
        self.state.lock().skip_requested = false;
    }
}

/// The ordered play sequence and its navigation operations.
///
/// Owned by the streaming loop; only `NavHandle` is shared outside it.
pub struct Sequencer {
    order: Vec<TrackId>,
    nav: NavHandle,
}

impl Sequencer {
    pub fn new(catalog: &Catalog, nav: NavHandle, rng: &mut impl Rng) -> Self {
        let mut sequencer = Sequencer {
            order: catalog.track_ids(),
            nav,
        };
        sequencer.reshuffle(rng);
        sequencer
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Produces a new random permutation whose first element is never
    /// the track that was playing last, then rewinds to the start.
    ///
    /// Expected O(1) regeneration attempts.
    fn reshuffle(&mut self, rng: &mut impl Rng) {
        if self.order.len() > 1 {
            let last_playing = self.order.last().cloned();
            loop {
                self.order.shuffle(rng);
                if self.order.first() != last_playing.as_ref() {
                    break;
                }
            }
        }
        self.state().index = 0;
    }

    /// Resolves any out-of-bounds index, consumes a pending skip, and
    /// returns the track to play. `None` signals the non-fatal "unable
    /// to get next track" condition.
    ///
    /// Skip consumption, bounds resolution, and the index read happen
    /// under one lock acquisition, so a skip landing mid-call is either
    /// fully applied or left for the next call, never half-observed.
    pub fn next_track(&mut self, rng: &mut impl Rng) -> Option<TrackId> {
        if self.order.is_empty() {
            warn!("Unable to get next track: sequence is empty");
            return None;
        }

        loop {
            {
                let mut state = self.state();
                if state.skip_requested {
                    state.skip_requested = false;
                }
                if state.index < 0 {
                    state.index = 0;
                }
                if state.index < self.order.len() as isize {
                    return self.order.get(state.index as usize).cloned();
                }
                if self.order.len() == 1 {
                    state.index = 0;
                    return self.order.first().cloned();
                }
            }
            // Exhausted with more than one track: reshuffle rewinds the
            // index, then re-check in case another skip landed meanwhile.
            self.reshuffle(rng);
        }
    }

    /// Advances past a track that finished naturally. A pending skip
    /// has already moved the index, and repeat pins it in place.
    pub fn advance_on_complete(&self) {
        let mut state = self.state();
        if !state.skip_requested && !state.repeat {
            state.index += 1;
        }
    }

    /// Reconciles a pending skip against the currently playing track:
    /// a backward skip never rewinds past a position already superseded
    /// by forward navigation.
    pub fn reconcile_skip(&self, current: &TrackId) {
        if let Some(pos) = self.position_of(current) {
            let mut state = self.state();
            if pos as isize > state.index {
                debug!("Overriding stale backward skip to sequence position {}", pos);
                state.index = pos as isize;
            }
        }
    }

    /// Removes a track from the sequence; no-op if absent. The index
    /// keeps pointing at the same upcoming track.
    pub fn remove(&mut self, track: &TrackId) {
        if let Some(pos) = self.position_of(track) {
            self.order.remove(pos);
            let mut state = self.state();
            if (pos as isize) < state.index {
                state.index -= 1;
            }
        }
    }

    /// 1-based "K of N" label for the current position.
    pub fn position_label(&self) -> String {
        let index = self.state().index.max(0) as usize;
        let position = (index + 1).min(self.order.len().max(1));
        format!("{} of {}", position, self.order.len())
    }

    fn position_of(&self, track: &TrackId) -> Option<usize> {
        self.order.iter().position(|t| t == track)
    }

    fn state(&self) -> parking_lot::MutexGuard<'_, NavState> {
        self.nav.state.lock()
    }
}
