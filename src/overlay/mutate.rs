//! layer mutations
//!
//! every mutation targets the layer only. precondition checks and the layer
//! update run under one exclusive lock acquisition, so no reader or writer
//! interleaves between a check and its mutation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::overlay::dir::list_children;
use crate::overlay::{OverlayFs, State};
use crate::path;
use crate::types::Entry;

impl OverlayFs {
    /// write a whole file in one call
    ///
    /// the content goes to the blob store first, outside the lock; only the
    /// layer update holds it. an existing entry of any kind at the path is
    /// replaced.
    pub fn write_file(&self, name: &str, content: &[u8], mode: u32) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "write",
                path: norm,
            });
        }

        let fingerprint = self
            .store()
            .put(content)
            .map_err(|e| Error::store("write", norm.clone(), e))?;

        let mut state = self.write_state();
        state.upsert_layer(Entry::regular(
            norm.clone(),
            fingerprint,
            content.len() as u64,
            mode,
        ));
        drop(state);

        debug!(path = %norm, size = content.len(), "write file");
        Ok(())
    }

    /// create a directory
    ///
    /// fails if anything live already occupies the path. a tombstoned path
    /// can be re-created. the parent need not exist; directories are just
    /// path-keyed entries.
    pub fn mkdir(&self, name: &str, mode: u32) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "mkdir",
                path: norm,
            });
        }

        let mut state = self.write_state();
        if state.exists(&norm) {
            return Err(Error::AlreadyExists {
                op: "mkdir",
                path: norm,
            });
        }
        state.upsert_layer(Entry::directory(norm.clone(), mode));
        drop(state);

        debug!(path = %norm, "mkdir");
        Ok(())
    }

    /// create a directory and any missing ancestors
    ///
    /// succeeds without effect if the full path already names a directory.
    pub fn mkdir_all(&self, name: &str, mode: u32) -> Result<()> {
        let norm = path::normalize(name);
        let mut state = self.write_state();
        mkdir_all_inner(&mut state, &norm, mode)
    }

    /// delete a single path by inserting a layer tombstone
    ///
    /// directories must be empty in the composed view. the blob store is
    /// never touched; reclamation is the sweeper's job.
    pub fn remove(&self, name: &str) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "remove",
                path: norm,
            });
        }

        let mut state = self.write_state();
        let entry = state.lookup("remove", &norm)?;
        let is_dir = entry.metadata().map(|m| m.is_dir()).unwrap_or(false);
        if is_dir && !list_children(&state, &norm).is_empty() {
            return Err(Error::NotEmpty {
                op: "remove",
                path: norm,
            });
        }
        state.upsert_layer(Entry::tombstone(norm.clone()));
        drop(state);

        debug!(path = %norm, "remove");
        Ok(())
    }

    /// delete a path and everything beneath it
    ///
    /// removing an absent path is a no-op. the whole subtree is tombstoned
    /// under one lock acquisition, so no reader sees a half-deleted tree.
    pub fn remove_all(&self, name: &str) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "removeall",
                path: norm,
            });
        }

        let mut state = self.write_state();
        match state.lookup("removeall", &norm) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }
        remove_all_inner(&mut state, &norm);
        drop(state);

        debug!(path = %norm, "remove all");
        Ok(())
    }

    /// move an entry (and, for directories, its whole subtree) to a new path
    ///
    /// the destination must not exist in the composed view. directory moves
    /// collect the live descendant set by merging base and layer keyed by
    /// path: a layer tombstone drops the base descendant from the set, so
    /// deleted children are not resurrected at the destination. the source
    /// paths are tombstoned in the same batch.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old = path::normalize(old_name);
        let new = path::normalize(new_name);
        if old.is_empty() || new.is_empty() {
            return Err(Error::InvalidPath {
                op: "rename",
                path: if old.is_empty() { old } else { new },
            });
        }

        let mut state = self.write_state();
        let entry = state.lookup("rename", &old)?;
        if state.exists(&new) {
            return Err(Error::AlreadyExists {
                op: "rename",
                path: new,
            });
        }
        let metadata = entry
            .metadata()
            .cloned()
            .expect("lookup never returns tombstones");

        if metadata.is_dir() {
            let mut subtree: BTreeMap<String, Entry> = BTreeMap::new();
            for e in state.base().entries() {
                if path::is_within(&old, &e.path) && !e.is_tombstone() {
                    subtree.insert(e.path.clone(), e.clone());
                }
            }
            for e in state.layer().entries() {
                if !path::is_within(&old, &e.path) {
                    continue;
                }
                if e.is_tombstone() {
                    subtree.remove(&e.path);
                } else {
                    subtree.insert(e.path.clone(), e.clone());
                }
            }
            for (p, e) in &subtree {
                let moved = format!("{}{}", new, &p[old.len()..]);
                let m = e
                    .metadata()
                    .cloned()
                    .expect("subtree holds only live entries");
                state.upsert_layer(Entry::live(moved, m));
            }
            for p in subtree.keys() {
                state.upsert_layer(Entry::tombstone(p.clone()));
            }
        } else {
            state.upsert_layer(Entry::live(new.clone(), metadata));
            state.upsert_layer(Entry::tombstone(old.clone()));
        }
        drop(state);

        debug!(from = %old, to = %new, "rename");
        Ok(())
    }

    /// create a symlink at `name` pointing at `target`
    ///
    /// the target is stored verbatim and validated only when resolved, so
    /// dangling links are representable.
    pub fn symlink(&self, target: &str, name: &str) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "symlink",
                path: norm,
            });
        }

        let mut state = self.write_state();
        if state.exists(&norm) {
            return Err(Error::AlreadyExists {
                op: "symlink",
                path: norm,
            });
        }
        state.upsert_layer(Entry::symlink(norm.clone(), target));
        drop(state);

        debug!(path = %norm, link_target = %target, "symlink");
        Ok(())
    }

    /// change permission bits, leaving kind, content and mtime untouched
    pub fn chmod(&self, name: &str, mode: u32) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "chmod",
                path: norm,
            });
        }

        let mut state = self.write_state();
        let entry = state.lookup("chmod", &norm)?;
        let mut metadata = entry
            .metadata()
            .cloned()
            .expect("lookup never returns tombstones");
        metadata.mode = mode;
        state.upsert_layer(Entry::live(norm, metadata));
        Ok(())
    }

    /// set the modification time; the access time is accepted and discarded
    /// (only one timestamp is stored per entry)
    pub fn chtimes(&self, name: &str, _atime: i64, mtime: i64) -> Result<()> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "chtimes",
                path: norm,
            });
        }

        let mut state = self.write_state();
        let entry = state.lookup("chtimes", &norm)?;
        let mut metadata = entry
            .metadata()
            .cloned()
            .expect("lookup never returns tombstones");
        metadata.mtime = mtime;
        state.upsert_layer(Entry::live(norm, metadata));
        Ok(())
    }
}

fn mkdir_all_inner(state: &mut State, norm: &str, mode: u32) -> Result<()> {
    if norm.is_empty() {
        return Ok(());
    }
    if let Ok(entry) = state.lookup("mkdir", norm) {
        let metadata = entry.metadata().expect("lookup never returns tombstones");
        if metadata.is_dir() {
            return Ok(());
        }
        return Err(Error::NotADirectory {
            op: "mkdir",
            path: norm.to_string(),
        });
    }

    let parent = path::parent(norm).to_string();
    mkdir_all_inner(state, &parent, mode)?;
    state.upsert_layer(Entry::directory(norm.to_string(), mode));
    Ok(())
}

fn remove_all_inner(state: &mut State, norm: &str) {
    let is_dir = state
        .lookup("removeall", norm)
        .ok()
        .and_then(|e| e.metadata().map(|m| m.is_dir()))
        .unwrap_or(false);
    if is_dir {
        for child in list_children(state, norm) {
            remove_all_inner(state, &path::join(norm, &child.name));
        }
    }
    state.upsert_layer(Entry::tombstone(norm.to_string()));
}
