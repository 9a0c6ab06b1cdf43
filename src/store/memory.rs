use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::hash::Fingerprint;
use crate::store::ContentStore;

/// in-memory content store, useful for tests and scratch filesystems
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Fingerprint, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of distinct blobs held
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, content: &[u8]) -> Result<Fingerprint> {
        let fingerprint = Fingerprint::of(content);
        self.data
            .write()
            .entry(fingerprint)
            .or_insert_with(|| content.to_vec());
        Ok(fingerprint)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>> {
        self.data
            .read()
            .get(fingerprint)
            .cloned()
            .ok_or(Error::BlobNotFound(*fingerprint))
    }

    fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.data.read().contains_key(fingerprint)
    }

    fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.data.write().remove(fingerprint);
        Ok(())
    }
}
