use log::{error, warn};

use crate::catalog::Catalog;
use crate::sequencer::{Sequencer, TrackId};

/// What the engine should do after a track-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// The failed track was dropped; move on to the next one.
    Continue,
    /// No viable alternative remains; halt playback.
    Stop,
}

/// Drops a failed track from the catalog and sequence.
///
/// Playback continues only while more than one track remains;
/// idempotent for a track that was already removed.
pub fn on_track_failure(
    failed: &TrackId,
    catalog: &mut Catalog,
    sequence: &mut Sequencer,
) -> RecoveryAction {
    catalog.remove(failed);

    if catalog.len() > 1 {
        sequence.remove(failed);
        warn!(
            "Dropped track {} after playback error, continuing with {} tracks",
            failed.display(),
            catalog.len()
        );
        RecoveryAction::Continue
    } else {
        error!(
            "No playable tracks remain after failure of {}",
            failed.display()
        );
        RecoveryAction::Stop
    }
}
