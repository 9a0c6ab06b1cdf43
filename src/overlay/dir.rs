//! directory virtualization
//!
//! directories are not containers: a child is any entry whose path sits
//! directly under the parent. listings merge the layer and the base in two
//! passes: layer entries win by basename, and layer tombstones put the
//! basename in a skip-set so the shadowed base child stays hidden.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::overlay::resolve::resolve_metadata;
use crate::overlay::{OverlayFs, State};
use crate::path;
use crate::types::Metadata;

/// one visible child of a directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// basename of the child
    pub name: String,
    pub metadata: Metadata,
}

impl OverlayFs {
    /// list the direct children of a directory, following symlinks to it
    ///
    /// each live name appears exactly once; results are sorted by name.
    pub fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>> {
        let state = self.read_state();
        let (entry, metadata) = resolve_metadata(&state, "readdir", name)?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory {
                op: "readdir",
                path: path::normalize(name),
            });
        }
        Ok(list_children(&state, &entry.path))
    }

    /// paths in the composed view matching a glob pattern
    ///
    /// `*` does not cross `/`; matches are full normalized paths, sorted.
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let compiled = glob::Pattern::new(pattern)?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..Default::default()
        };

        let state = self.read_state();
        let mut matches = Vec::new();

        for entry in state.layer().entries() {
            if !entry.is_tombstone() && compiled.matches_with(&entry.path, options) {
                matches.push(entry.path.clone());
            }
        }
        for entry in state.base().entries() {
            if !state.layer_shadows(&entry.path)
                && !entry.is_tombstone()
                && compiled.matches_with(&entry.path, options)
            {
                matches.push(entry.path.clone());
            }
        }

        matches.sort();
        Ok(matches)
    }
}

/// direct children of `dir` in the composed view
///
/// pass 1 scans the layer: tombstoned basenames go to the skip-set, live
/// children to the result. pass 2 scans the base, adding children neither
/// seen nor skipped. this is how layer writes and deletions override base
/// content without mutating it.
pub(crate) fn list_children(state: &State, dir: &str) -> Vec<DirEntry> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut skip: HashSet<&str> = HashSet::new();
    let mut children = Vec::new();

    for entry in state.layer().entries() {
        if !path::is_direct_child(dir, &entry.path) {
            continue;
        }
        let basename = path::base_name(&entry.path);
        if !seen.insert(basename) {
            continue;
        }
        match entry.metadata() {
            None => {
                skip.insert(basename);
            }
            Some(metadata) => children.push(DirEntry {
                name: basename.to_string(),
                metadata: metadata.clone(),
            }),
        }
    }

    for entry in state.base().entries() {
        if !path::is_direct_child(dir, &entry.path) {
            continue;
        }
        let basename = path::base_name(&entry.path);
        if seen.contains(basename) || skip.contains(basename) {
            continue;
        }
        if let Some(metadata) = entry.metadata() {
            seen.insert(basename);
            children.push(DirEntry {
                name: basename.to_string(),
                metadata: metadata.clone(),
            });
        }
    }

    children.sort_by(|a, b| a.name.cmp(&b.name));
    children
}
