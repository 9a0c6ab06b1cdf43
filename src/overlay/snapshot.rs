//! flattening and live-reference collection
//!
//! flatten folds the layer into a fresh manifest fit to serve as the next
//! base; the reference collector enumerates every fingerprint the composed
//! view still needs, which is the live set the store sweeper keeps.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;
use crate::hash::Fingerprint;
use crate::overlay::OverlayFs;
use crate::types::{EntryKind, Manifest};

impl OverlayFs {
    /// merge base and layer into a single self-contained manifest
    ///
    /// unshadowed base entries come first, then live layer entries. the
    /// result carries no tombstones: a deletion simply leaves its base entry
    /// out. the overlay itself is not modified.
    pub fn flatten(&self) -> Result<Manifest> {
        let state = self.read_state();
        let mut merged = Manifest::new();

        for entry in state.base().entries() {
            if !state.layer_shadows(&entry.path) && !entry.is_tombstone() {
                merged.push_new(entry.clone());
            }
        }
        for entry in state.layer().entries() {
            if !entry.is_tombstone() {
                merged.push_new(entry.clone());
            }
        }
        drop(state);

        debug!(entries = merged.len(), "flatten");
        Ok(merged)
    }

    /// fingerprints of every blob the composed view references
    ///
    /// counts regular files with content in the live view only: shadowed or
    /// tombstoned base entries contribute nothing, and neither do
    /// directories, symlinks or empty files. deduplicated content yields one
    /// fingerprint no matter how many paths carry it.
    pub fn referenced_fingerprints(&self) -> HashSet<Fingerprint> {
        let state = self.read_state();
        let mut live = HashSet::new();

        for entry in state.base().entries() {
            if state.layer_shadows(&entry.path) {
                continue;
            }
            if let Some(metadata) = entry.metadata() {
                if let EntryKind::Regular { fingerprint, size } = &metadata.kind {
                    if *size > 0 {
                        live.insert(*fingerprint);
                    }
                }
            }
        }
        for entry in state.layer().entries() {
            if let Some(metadata) = entry.metadata() {
                if let EntryKind::Regular { fingerprint, size } = &metadata.kind {
                    if *size > 0 {
                        live.insert(*fingerprint);
                    }
                }
            }
        }

        live
    }
}
