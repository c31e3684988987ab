use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::config::TRACK_EXTENSION;

/// A playable file, keyed by its full path and shown by its base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub path: PathBuf,
    pub display_name: String,
}

/// The set of currently known playable tracks for a channel.
///
/// Mutated only by scanning and by failure-driven removal.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: HashMap<PathBuf, Track>,
}

impl Catalog {
    /// Lists playable files directly inside `dir` (no recursion).
    ///
    /// A missing or unreadable directory is the canonical "no tracks"
    /// state, not an error.
    pub fn scan(dir: &Path) -> Catalog {
        let mut catalog = Catalog::default();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Unable to read tracks from {}: {}", dir.display(), e);
                return catalog;
            }
        };

        for entry in entries.filter_map(|r| r.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let playable = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase() == TRACK_EXTENSION)
                .unwrap_or(false);
            if !playable {
                continue;
            }

            let display_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            catalog.insert(Track { path, display_name });
        }

        info!(
            "Found {} playable tracks in {}",
            catalog.len(),
            dir.display()
        );
        catalog
    }

    pub fn insert(&mut self, track: Track) {
        self.tracks.insert(track.path.clone(), track);
    }

    /// Removes a track; no-op if it is already gone.
    pub fn remove(&mut self, path: &Path) -> Option<Track> {
        self.tracks.remove(path)
    }

    pub fn display_name(&self, path: &Path) -> Option<&str> {
        self.tracks.get(path).map(|t| t.display_name.as_str())
    }

    /// Catalog keys in a stable order, ready to be shuffled.
    pub fn track_ids(&self) -> Vec<PathBuf> {
        let mut ids: Vec<PathBuf> = self.tracks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
