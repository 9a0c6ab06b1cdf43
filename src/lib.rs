//! strata - copy-on-write content-addressed filesystem overlay
//!
//! a virtual filesystem that composes an immutable base snapshot with a
//! mutable layer. file content lives in a content-addressed blob store;
//! manifests map paths to metadata and fingerprints.
//!
//! # Core concepts
//!
//! - **Blob**: content-addressed file data, keyed by SHA-256 fingerprint
//!   (compressed with zstd on disk)
//! - **Manifest**: a flat path → entry map describing one whole-tree state
//!   (CBOR + zstd)
//! - **Overlay**: base manifest + layer manifest; reads fall through the
//!   layer to the base, writes and deletions touch only the layer
//! - **Tombstone**: a layer entry marking a path deleted, shadowing the base
//!
//! # Example usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata::{DiskStore, OverlayFs};
//!
//! let store = Arc::new(DiskStore::init(std::path::Path::new("/path/to/store")).unwrap());
//! let fs = OverlayFs::new(store);
//!
//! fs.write_file("etc/hostname", b"box\n", 0o644).unwrap();
//! let snapshot = fs.flatten().unwrap();
//! snapshot.save(std::path::Path::new("/path/to/base.manifest")).unwrap();
//! ```

mod config;
mod error;
mod hash;
mod ingest;
mod path;
mod store;

pub mod overlay;
pub mod types;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use hash::Fingerprint;
pub use ingest::{ingest_dir, materialize};
pub use overlay::{DirEntry, DirHandle, Handle, OverlayFs, ReadHandle, Subtree, WriteHandle};
pub use path::normalize;
pub use store::{ContentStore, DiskStore, MemoryStore, StoreLock, SweepStats};
pub use types::{Entry, EntryKind, EntryState, Manifest, Metadata};
