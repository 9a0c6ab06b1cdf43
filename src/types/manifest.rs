use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::types::Entry;

/// zstd level for manifest files (fast, reasonable ratio)
const MANIFEST_ZSTD_LEVEL: i32 = 3;

/// an ordered collection of entries describing one whole-tree state
///
/// a manifest is immutable once it serves as a base; the overlay's layer is
/// the only manifest that mutates. `upsert` keeps the invariant of at most
/// one entry per path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<Entry>,
}

impl Manifest {
    /// create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// create from a list of entries
    ///
    /// later entries win when the list repeats a path, matching upsert order.
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        let mut manifest = Self::new();
        for entry in entries {
            manifest.upsert(entry);
        }
        manifest
    }

    /// entries slice, in insertion order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// consume and return entries
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// look up an entry by path (linear scan; the overlay keeps indices)
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// insert or replace the entry at its path
    ///
    /// replace semantics: an existing entry at the same path is evicted, so
    /// a path never has two entries simultaneously. replacement happens in
    /// place, keeping positions of other entries stable for index reuse.
    pub fn upsert(&mut self, entry: Entry) {
        if let Some(i) = self.entries.iter().position(|e| e.path == entry.path) {
            self.entries[i] = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// append an entry; the caller guarantees the path is not present
    pub(crate) fn push_new(&mut self, entry: Entry) {
        debug_assert!(self.get(&entry.path).is_none());
        self.entries.push(entry);
    }

    /// replace the entry at a known position with one for the same path
    pub(crate) fn replace_at(&mut self, i: usize, entry: Entry) {
        debug_assert_eq!(self.entries[i].path, entry.path);
        self.entries[i] = entry;
    }

    /// build a path → position index for O(1) lookups
    pub fn build_index(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// serialize to CBOR and compress with zstd
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut cbor_bytes = Vec::new();
        ciborium::into_writer(self, &mut cbor_bytes)?;
        zstd::encode_all(&cbor_bytes[..], MANIFEST_ZSTD_LEVEL).with_path("<zstd>")
    }

    /// decode from zstd-compressed CBOR
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let cbor_bytes = zstd::decode_all(bytes).with_path("<zstd>")?;
        let manifest = ciborium::from_reader(&cbor_bytes[..])?;
        Ok(manifest)
    }

    /// write to a file, atomically (temp sibling + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = self.encode()?;

        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&encoded).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        fs::rename(&tmp_path, path).with_path(path)?;
        Ok(())
    }

    /// read from a file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_path(path)?;
        Self::decode(&bytes)
    }
}
