//! content-addressable blob storage
//!
//! a store maps content fingerprints to byte payloads. two puts of identical
//! bytes yield the same fingerprint and the second put is a no-op.

mod disk;
mod memory;

pub use disk::{DiskStore, StoreLock, SweepStats};
pub use memory::MemoryStore;

use crate::error::Result;
use crate::hash::Fingerprint;

/// contract every blob store backend implements
///
/// implementations must be safe for concurrent use from multiple overlay
/// filesystems; the overlay's lock does not cover the store.
pub trait ContentStore: Send + Sync {
    /// store content, returning its fingerprint (dedup: no-op if present)
    fn put(&self, content: &[u8]) -> Result<Fingerprint>;

    /// retrieve content by fingerprint
    fn get(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>>;

    /// check whether content exists for the fingerprint
    fn has(&self, fingerprint: &Fingerprint) -> bool;

    /// remove content for the fingerprint (ok if already absent)
    fn delete(&self, fingerprint: &Fingerprint) -> Result<()>;
}
