//! copy-on-write overlay filesystem
//!
//! an [`OverlayFs`] composes an immutable *base* manifest (a snapshot) with a
//! mutable *layer* manifest. lookups check the layer first and fall back to
//! the base; every mutation writes only to the layer, so the base snapshot is
//! never touched. deletion inserts a tombstone in the layer that shadows the
//! base entry.
//!
//! one reader/writer lock guards the composed state: reads take the shared
//! lock, mutations take the exclusive lock for the duration of their layer
//! update, so no reader ever observes a partially-applied mutation.

mod dir;
mod file;
mod mutate;
mod resolve;
mod snapshot;
mod subtree;

pub use dir::DirEntry;
pub use file::{DirHandle, Handle, ReadHandle, WriteHandle};
pub use subtree::Subtree;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::store::ContentStore;
use crate::types::{Entry, Manifest, Metadata};

/// mode bits of the synthetic root directory
pub(crate) const ROOT_MODE: u32 = 0o755;

/// the composed copy-on-write filesystem
pub struct OverlayFs {
    state: RwLock<State>,
    store: Arc<dyn ContentStore>,
}

/// base + layer manifests and their path indices, guarded as one unit
pub(crate) struct State {
    base: Manifest,
    layer: Manifest,
    base_index: HashMap<String, usize>,
    layer_index: HashMap<String, usize>,
}

impl State {
    fn new(base: Manifest, layer: Manifest) -> Self {
        let base_index = base.build_index();
        let layer_index = layer.build_index();
        Self {
            base,
            layer,
            base_index,
            layer_index,
        }
    }

    pub(crate) fn base(&self) -> &Manifest {
        &self.base
    }

    pub(crate) fn layer(&self) -> &Manifest {
        &self.layer
    }

    pub(crate) fn layer_shadows(&self, path: &str) -> bool {
        self.layer_index.contains_key(path)
    }

    /// composed lookup: layer first, then base, honoring tombstones
    ///
    /// the path must already be normalized. the root always exists as a
    /// synthetic directory entry that is never stored in either manifest.
    /// never follows symlinks and never consults the blob store.
    pub(crate) fn lookup(&self, op: &'static str, path: &str) -> Result<Entry> {
        if path.is_empty() {
            return Ok(root_entry());
        }

        if let Some(&i) = self.layer_index.get(path) {
            let entry = &self.layer.entries()[i];
            if entry.is_tombstone() {
                return Err(Error::NotFound {
                    op,
                    path: path.to_string(),
                });
            }
            return Ok(entry.clone());
        }

        if let Some(&i) = self.base_index.get(path) {
            return Ok(self.base.entries()[i].clone());
        }

        Err(Error::NotFound {
            op,
            path: path.to_string(),
        })
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.lookup("stat", path).is_ok()
    }

    /// insert or replace an entry in the layer, keeping list and index in sync
    ///
    /// replace semantics: a path never has two live layer entries. replacing
    /// in place keeps every other index position valid.
    pub(crate) fn upsert_layer(&mut self, entry: Entry) {
        if let Some(&i) = self.layer_index.get(&entry.path) {
            self.layer.replace_at(i, entry);
        } else {
            self.layer_index
                .insert(entry.path.clone(), self.layer.len());
            self.layer.push_new(entry);
        }
    }
}

/// the synthetic always-present root directory entry
pub(crate) fn root_entry() -> Entry {
    Entry::directory("", ROOT_MODE)
}

impl OverlayFs {
    /// create a filesystem over an empty base
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self::with_base(Manifest::new(), store)
    }

    /// create a filesystem from a base snapshot
    pub fn with_base(base: Manifest, store: Arc<dyn ContentStore>) -> Self {
        Self::with_base_and_layer(base, Manifest::new(), store)
    }

    /// create a filesystem from a base snapshot and a pre-existing layer
    pub fn with_base_and_layer(
        base: Manifest,
        layer: Manifest,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            state: RwLock::new(State::new(base, layer)),
            store,
        }
    }

    /// the underlying content store
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub(crate) fn read_state(&self) -> parking_lot::RwLockReadGuard<'_, State> {
        self.state.read()
    }

    pub(crate) fn write_state(&self) -> parking_lot::RwLockWriteGuard<'_, State> {
        self.state.write()
    }

    /// metadata for a path without following symlinks
    pub fn lstat(&self, name: &str) -> Result<Metadata> {
        let norm = crate::path::normalize(name);
        let entry = self.read_state().lookup("lstat", &norm)?;
        Ok(entry.metadata().cloned().expect("lookup never returns tombstones"))
    }

    /// true if the path exists in the composed view (tombstones hide it)
    pub fn exists(&self, name: &str) -> bool {
        self.lstat(name).is_ok()
    }

    /// true if the path exists and is a directory
    pub fn is_dir(&self, name: &str) -> bool {
        self.lstat(name).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// true if the path exists and is not a directory
    pub fn is_file(&self, name: &str) -> bool {
        self.lstat(name).map(|m| !m.is_dir()).unwrap_or(false)
    }

    /// logical size of the entry at the path (no symlink follow)
    pub fn size(&self, name: &str) -> Result<u64> {
        Ok(self.lstat(name)?.size())
    }

    /// read the target of a symlink without resolving it
    pub fn read_link(&self, name: &str) -> Result<String> {
        let norm = crate::path::normalize(name);
        let entry = self.read_state().lookup("readlink", &norm)?;
        let metadata = entry.metadata().expect("lookup never returns tombstones");
        match metadata.symlink_target() {
            Some(target) => Ok(target.to_string()),
            None => Err(Error::NotASymlink {
                op: "readlink",
                path: norm,
            }),
        }
    }

    /// copy of the immutable base manifest
    pub fn base(&self) -> Manifest {
        self.read_state().base.clone()
    }

    /// copy of the current layer manifest
    pub fn layer(&self) -> Manifest {
        self.read_state().layer.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::EntryState;

    pub(crate) fn empty_fs() -> OverlayFs {
        OverlayFs::new(Arc::new(MemoryStore::new()))
    }

    /// a base with one file ("x.txt" = "hello") and one directory ("docs")
    pub(crate) fn seeded_fs() -> OverlayFs {
        let store = Arc::new(MemoryStore::new());
        let fingerprint = store.put(b"hello").unwrap();
        let base = Manifest::with_entries(vec![
            Entry::regular("x.txt", fingerprint, 5, 0o644),
            Entry::directory("docs", 0o755),
        ]);
        OverlayFs::with_base(base, store)
    }

    #[test]
    fn test_root_always_exists() {
        let fs = empty_fs();
        let meta = fs.lstat("/").unwrap();
        assert!(meta.is_dir());
        assert!(fs.exists(""));
        assert!(fs.exists("."));
        assert!(fs.is_dir("/"));
    }

    #[test]
    fn test_lookup_missing() {
        let fs = empty_fs();
        let err = fs.lstat("nope.txt").unwrap_err();
        assert!(matches!(err, Error::NotFound { op: "lstat", .. }));
    }

    #[test]
    fn test_base_entry_visible() {
        let fs = seeded_fs();
        let meta = fs.lstat("x.txt").unwrap();
        assert_eq!(meta.size(), 5);
        assert!(fs.is_file("x.txt"));
        assert!(fs.is_dir("docs"));
    }

    #[test]
    fn test_layer_shadows_base() {
        let fs = seeded_fs();
        fs.write_file("x.txt", b"HELLO!", 0o644).unwrap();

        assert_eq!(fs.size("x.txt").unwrap(), 6);

        // the base snapshot still carries the original entry
        let base = fs.base();
        let original = base.get("x.txt").unwrap();
        match &original.state {
            EntryState::Live(m) => {
                assert_eq!(m.size(), 5);
                assert_eq!(m.fingerprint(), Some(&crate::Fingerprint::of(b"hello")));
            }
            EntryState::Tombstone => panic!("base entry must stay live"),
        }
    }

    #[test]
    fn test_cow_isolation() {
        let fs = seeded_fs();
        let before = fs.base();

        fs.write_file("new.txt", b"data", 0o644).unwrap();
        fs.remove("x.txt").unwrap();

        assert_eq!(fs.base(), before);
    }

    #[test]
    fn test_with_base_and_layer() {
        let store = Arc::new(MemoryStore::new());
        let f = store.put(b"base").unwrap();
        let base = Manifest::with_entries(vec![Entry::regular("keep.txt", f, 4, 0o644)]);
        let g = store.put(b"layered").unwrap();
        let layer = Manifest::with_entries(vec![
            Entry::regular("added.txt", g, 7, 0o644),
            Entry::tombstone("keep.txt"),
        ]);

        let fs = OverlayFs::with_base_and_layer(base, layer, store);
        assert!(fs.exists("added.txt"));
        assert!(!fs.exists("keep.txt"));
    }

    #[test]
    fn test_read_link_on_non_symlink() {
        let fs = seeded_fs();
        let err = fs.read_link("x.txt").unwrap_err();
        assert!(matches!(err, Error::NotASymlink { .. }));
    }

    #[test]
    fn test_size_of_directory_is_zero() {
        let fs = seeded_fs();
        assert_eq!(fs.size("docs").unwrap(), 0);
    }

    #[test]
    fn test_disk_backed_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::store::DiskStore::init(&dir.path().join("store")).unwrap());

        let fs = OverlayFs::new(store.clone());
        fs.mkdir("etc", 0o755).unwrap();
        fs.write_file("etc/hostname", b"box\n", 0o644).unwrap();
        fs.write_file("scratch.txt", b"scratch", 0o644).unwrap();
        fs.remove("scratch.txt").unwrap();

        let snapshot = fs.flatten().unwrap();
        let manifest_path = dir.path().join("base.manifest");
        snapshot.save(&manifest_path).unwrap();

        // reload as the next generation's base
        let next = OverlayFs::with_base(Manifest::load(&manifest_path).unwrap(), store.clone());
        assert_eq!(next.read_file("etc/hostname").unwrap(), b"box\n");
        assert!(!next.exists("scratch.txt"));

        // the removed file's blob is unreferenced and gets swept
        let stats = store.sweep(&next.referenced_fingerprints(), false).unwrap();
        assert_eq!(stats.blobs_removed, 1);
        assert_eq!(next.read_file("etc/hostname").unwrap(), b"box\n");
    }
}
