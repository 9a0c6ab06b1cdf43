use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Fingerprint;
use crate::store::ContentStore;

/// disk-based content store
///
/// blobs live under `blobs/` in a two-level hex fanout
/// (`blobs/ab/cd/ef0123...`), zstd compressed at rest. writes go through a
/// temp file in `tmp/` and a rename, so a crashed put never leaves a partial
/// blob at its final path.
pub struct DiskStore {
    path: PathBuf,
    config: StoreConfig,
}

impl DiskStore {
    /// initialize a new store at the given path
    pub fn init(path: &Path) -> Result<Self> {
        Self::init_with_config(path, StoreConfig::default())
    }

    /// initialize with explicit configuration
    pub fn init_with_config(path: &Path, config: StoreConfig) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::StoreExists(path.to_path_buf()));
        }

        fs::create_dir_all(path.join("blobs")).with_path(path)?;
        fs::create_dir_all(path.join("tmp")).with_path(path)?;
        config.save(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// open an existing store
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoStore(path.to_path_buf()));
        }
        let config = StoreConfig::load(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// store root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// path to blobs directory
    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("blobs")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// filesystem path for a fingerprint
    pub fn blob_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let (d1, d2, rest) = fingerprint.to_path_components();
        self.blobs_path().join(d1).join(d2).join(rest)
    }

    /// acquire an exclusive lock on the store
    /// returns a guard that releases the lock on drop
    pub fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.path.join(".lock");
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock =
            Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|_| Error::LockContention)?;

        Ok(StoreLock { _flock: flock })
    }

    /// delete every blob whose fingerprint is not in the live set
    ///
    /// the live set comes from the overlay's reference collector. holds the
    /// store lock for the whole sweep so a concurrent put cannot race the
    /// deletions. with `dry_run` the stats are computed but nothing is
    /// removed.
    pub fn sweep(&self, live: &HashSet<Fingerprint>, dry_run: bool) -> Result<SweepStats> {
        let _lock = self.lock()?;
        let blobs = self.blobs_path();
        let mut stats = SweepStats::default();

        for entry in WalkDir::new(&blobs).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| Error::Io {
                path: blobs.clone(),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walkdir error")),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            // reconstruct fingerprint from fanout path: blobs/XX/YY/ZZZZ...
            let path = entry.path();
            let Some(hex) = fanout_hex(path) else {
                continue;
            };
            let Ok(fingerprint) = Fingerprint::from_hex(&hex) else {
                continue;
            };

            if !live.contains(&fingerprint) {
                let meta = fs::metadata(path).with_path(path)?;
                stats.blobs_removed += 1;
                stats.bytes_freed += meta.len();

                if !dry_run {
                    fs::remove_file(path).with_path(path)?;
                }
            }
        }

        // clean up empty fanout directories
        if !dry_run {
            for depth in [2, 1] {
                for entry in WalkDir::new(&blobs)
                    .min_depth(depth)
                    .max_depth(depth)
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if entry.file_type().is_dir() {
                        let _ = fs::remove_dir(entry.path());
                    }
                }
            }
        }

        debug!(
            removed = stats.blobs_removed,
            bytes = stats.bytes_freed,
            dry_run,
            "store sweep complete"
        );
        Ok(stats)
    }
}

/// rebuild the hex digest from the last three fanout path components
fn fanout_hex(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    let d2 = path.parent()?.file_name()?.to_str()?;
    let d1 = path.parent()?.parent()?.file_name()?.to_str()?;
    Some(format!("{}{}{}", d1, d2, file))
}

impl ContentStore for DiskStore {
    fn put(&self, content: &[u8]) -> Result<Fingerprint> {
        let fingerprint = Fingerprint::of(content);
        let blob_path = self.blob_path(&fingerprint);

        // deduplication: if blob already exists, we're done
        if blob_path.exists() {
            return Ok(fingerprint);
        }

        let compressed =
            zstd::encode_all(content, self.config.compression_level).with_path(&blob_path)?;

        let blob_dir = blob_path.parent().expect("fanout path has a parent");
        fs::create_dir_all(blob_dir).with_path(blob_dir)?;

        // atomic write: temp file -> fsync -> rename
        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&compressed).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        fs::rename(&tmp_path, &blob_path).with_path(&blob_path)?;

        // fsync parent directory
        let dir_file = File::open(blob_dir).with_path(blob_dir)?;
        dir_file.sync_all().with_path(blob_dir)?;

        Ok(fingerprint)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>> {
        let path = self.blob_path(fingerprint);

        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BlobNotFound(*fingerprint)
            } else {
                Error::Io { path, source: e }
            }
        })?;

        let content = zstd::decode_all(&compressed[..]).with_path(self.blob_path(fingerprint))?;

        // verify content against the requested fingerprint
        if Fingerprint::of(&content) != *fingerprint {
            return Err(Error::CorruptBlob(*fingerprint));
        }

        Ok(content)
    }

    fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.blob_path(fingerprint).exists()
    }

    fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        let path = self.blob_path(fingerprint);

        if let Err(e) = fs::remove_file(&path) {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Ok(()); // already gone
            }
            return Err(Error::Io { path, source: e });
        }

        // try to remove empty fanout directories, ignoring failures
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
            if let Some(parent) = dir.parent() {
                let _ = fs::remove_dir(parent);
            }
        }

        Ok(())
    }
}

/// guard that holds the store lock until dropped
pub struct StoreLock {
    _flock: Flock<File>,
}

/// sweep statistics
#[derive(Debug, Default)]
pub struct SweepStats {
    pub blobs_removed: usize,
    pub bytes_freed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (tempfile::TempDir, DiskStore) {
        let dir = tempdir().unwrap();
        let store = DiskStore::init(&dir.path().join("store")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_init_creates_layout() {
        let (dir, store) = test_store();
        assert!(store.blobs_path().is_dir());
        assert!(store.tmp_path().is_dir());
        assert!(dir.path().join("store/config.toml").is_file());
    }

    #[test]
    fn test_init_twice_fails() {
        let (dir, _store) = test_store();
        let result = DiskStore::init(&dir.path().join("store"));
        assert!(matches!(result, Err(Error::StoreExists(_))));
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = tempdir().unwrap();
        let result = DiskStore::open(&dir.path().join("nope"));
        assert!(matches!(result, Err(Error::NoStore(_))));
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, store) = test_store();
        let f = store.put(b"hello, disk!").unwrap();
        assert_eq!(store.get(&f).unwrap(), b"hello, disk!");
    }

    #[test]
    fn test_put_deduplicates() {
        let (_dir, store) = test_store();
        let f1 = store.put(b"dup").unwrap();
        let f2 = store.put(b"dup").unwrap();
        assert_eq!(f1, f2);
        assert!(store.has(&f1));
    }

    #[test]
    fn test_fanout_layout() {
        let (_dir, store) = test_store();
        let f = store.put(b"layout").unwrap();
        let hex = f.to_hex();
        let expected = store
            .blobs_path()
            .join(&hex[..2])
            .join(&hex[2..4])
            .join(&hex[4..]);
        assert!(expected.is_file());
    }

    #[test]
    fn test_get_missing() {
        let (_dir, store) = test_store();
        let result = store.get(&Fingerprint::ZERO);
        assert!(matches!(result, Err(Error::BlobNotFound(_))));
    }

    #[test]
    fn test_delete_idempotent() {
        let (_dir, store) = test_store();
        let f = store.put(b"bye").unwrap();
        store.delete(&f).unwrap();
        assert!(!store.has(&f));
        store.delete(&f).unwrap();
    }

    #[test]
    fn test_corrupt_blob_detected() {
        let (_dir, store) = test_store();
        let f = store.put(b"honest content").unwrap();

        // overwrite the blob with different (validly compressed) bytes
        let forged = zstd::encode_all(&b"tampered"[..], 3).unwrap();
        fs::write(store.blob_path(&f), forged).unwrap();

        let result = store.get(&f);
        assert!(matches!(result, Err(Error::CorruptBlob(_))));
    }

    #[test]
    fn test_lock_exclusive() {
        let (_dir, store) = test_store();
        let lock = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(Error::LockContention)));
        drop(lock);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_sweep_removes_unreferenced() {
        let (_dir, store) = test_store();
        let keep = store.put(b"keep me").unwrap();
        let drop_me = store.put(b"drop me").unwrap();

        let live: HashSet<Fingerprint> = [keep].into_iter().collect();
        let stats = store.sweep(&live, false).unwrap();

        assert_eq!(stats.blobs_removed, 1);
        assert!(store.has(&keep));
        assert!(!store.has(&drop_me));
    }

    #[test]
    fn test_sweep_dry_run() {
        let (_dir, store) = test_store();
        let f = store.put(b"still here").unwrap();

        let stats = store.sweep(&HashSet::new(), true).unwrap();
        assert_eq!(stats.blobs_removed, 1);
        assert!(store.has(&f));
    }
}
