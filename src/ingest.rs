//! import from and export to a real directory tree
//!
//! ingestion walks an on-disk tree, stores file content as blobs and builds
//! a manifest describing it; materialization writes a manifest's composed
//! tree back out to disk. symlinks are carried by target, never followed.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::store::ContentStore;
use crate::types::{Entry, EntryKind, Manifest, Metadata};

/// permission bits carried into manifest entries
const MODE_MASK: u32 = 0o7777;

/// walk a directory tree into a manifest, storing file content as blobs
///
/// paths in the manifest are relative to `source`, slash-separated. the
/// walk is sorted so the resulting manifest order is deterministic.
pub fn ingest_dir(store: &dyn ContentStore, source: &Path) -> Result<Manifest> {
    let mut manifest = Manifest::new();

    for item in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|e| Error::Io {
            path: source.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walkdir error")),
        })?;

        let rel = item
            .path()
            .strip_prefix(source)
            .expect("walk entries live under the walk root");
        let path = rel.to_string_lossy().replace('\\', "/");

        let meta = fs::symlink_metadata(item.path()).with_path(item.path())?;
        let mode = meta.permissions().mode() & MODE_MASK;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let kind = if meta.file_type().is_symlink() {
            let target = fs::read_link(item.path()).with_path(item.path())?;
            EntryKind::Symlink {
                target: target.to_string_lossy().into_owned(),
            }
        } else if meta.is_dir() {
            EntryKind::Directory
        } else {
            let content = fs::read(item.path()).with_path(item.path())?;
            let fingerprint = store
                .put(&content)
                .map_err(|e| Error::store("ingest", path.clone(), e))?;
            EntryKind::Regular {
                fingerprint,
                size: content.len() as u64,
            }
        };

        manifest.upsert(Entry::live(path, Metadata { kind, mode, mtime }));
    }

    debug!(entries = manifest.len(), source = %source.display(), "ingest complete");
    Ok(manifest)
}

/// write a manifest's tree out to a real directory
///
/// `dest` is created if missing. entries are written parents-first; blob
/// content is hydrated from the store. tombstones (in a raw layer manifest)
/// are skipped.
pub fn materialize(store: &dyn ContentStore, manifest: &Manifest, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_path(dest)?;

    let mut entries: Vec<&Entry> = manifest
        .entries()
        .iter()
        .filter(|e| !e.is_tombstone())
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in entries {
        let metadata = entry.metadata().expect("tombstones were filtered out");
        let target_path = dest.join(&entry.path);

        match &metadata.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target_path).with_path(&target_path)?;
                fs::set_permissions(&target_path, fs::Permissions::from_mode(metadata.mode))
                    .with_path(&target_path)?;
            }
            EntryKind::Regular { fingerprint, .. } => {
                if let Some(parent) = target_path.parent() {
                    fs::create_dir_all(parent).with_path(parent)?;
                }
                let content = store
                    .get(fingerprint)
                    .map_err(|e| Error::store("materialize", entry.path.clone(), e))?;
                fs::write(&target_path, content).with_path(&target_path)?;
                fs::set_permissions(&target_path, fs::Permissions::from_mode(metadata.mode))
                    .with_path(&target_path)?;
            }
            EntryKind::Symlink { target } => {
                if let Some(parent) = target_path.parent() {
                    fs::create_dir_all(parent).with_path(parent)?;
                }
                std::os::unix::fs::symlink(target, &target_path).with_path(&target_path)?;
            }
        }
    }

    debug!(entries = manifest.len(), dest = %dest.display(), "materialize complete");
    Ok(())
}
