use serde::{Deserialize, Serialize};

use crate::hash::Fingerprint;

/// default permission bits for symlink entries
pub const SYMLINK_MODE: u32 = 0o777;

/// current time as unix seconds
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// kind of manifest entry with associated content data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// regular file addressed by content fingerprint
    Regular { fingerprint: Fingerprint, size: u64 },

    /// directory (no content, children are separate entries)
    Directory,

    /// symbolic link, target stored verbatim
    Symlink { target: String },
}

impl EntryKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, EntryKind::Regular { .. })
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, EntryKind::Symlink { .. })
    }

    /// type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Regular { .. } => "regular",
            EntryKind::Directory => "directory",
            EntryKind::Symlink { .. } => "symlink",
        }
    }
}

/// metadata of a live entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub kind: EntryKind,
    /// permission bits
    pub mode: u32,
    /// modification time, unix seconds (the only stored timestamp)
    pub mtime: i64,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    /// logical size: content length for files, 0 for directories and symlinks
    pub fn size(&self) -> u64 {
        match &self.kind {
            EntryKind::Regular { size, .. } => *size,
            _ => 0,
        }
    }

    /// content fingerprint, if this entry has content
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match &self.kind {
            EntryKind::Regular { fingerprint, .. } => Some(fingerprint),
            _ => None,
        }
    }

    /// symlink target, if this is a symlink
    pub fn symlink_target(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

/// state of a path in a manifest
///
/// deletion is an explicit variant, not a size sentinel: a tombstone in the
/// layer shadows any base entry at the same path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    Live(Metadata),
    Tombstone,
}

/// one path → state mapping inside a manifest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// normalized slash-separated path ("" is never stored; the root is virtual)
    pub path: String,
    pub state: EntryState,
}

impl Entry {
    /// create a live entry with explicit metadata
    pub fn live(path: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            path: path.into(),
            state: EntryState::Live(metadata),
        }
    }

    /// create a regular-file entry stamped now
    pub fn regular(path: impl Into<String>, fingerprint: Fingerprint, size: u64, mode: u32) -> Self {
        Self::live(
            path,
            Metadata {
                kind: EntryKind::Regular { fingerprint, size },
                mode,
                mtime: unix_now(),
            },
        )
    }

    /// create a directory entry stamped now
    pub fn directory(path: impl Into<String>, mode: u32) -> Self {
        Self::live(
            path,
            Metadata {
                kind: EntryKind::Directory,
                mode,
                mtime: unix_now(),
            },
        )
    }

    /// create a symlink entry stamped now
    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self::live(
            path,
            Metadata {
                kind: EntryKind::Symlink {
                    target: target.into(),
                },
                mode: SYMLINK_MODE,
                mtime: unix_now(),
            },
        )
    }

    /// create a tombstone marking the path deleted
    pub fn tombstone(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: EntryState::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.state, EntryState::Tombstone)
    }

    /// live metadata, None for tombstones
    pub fn metadata(&self) -> Option<&Metadata> {
        match &self.state {
            EntryState::Live(m) => Some(m),
            EntryState::Tombstone => None,
        }
    }
}
