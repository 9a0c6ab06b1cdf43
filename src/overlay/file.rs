//! open file and directory handles
//!
//! handles are fully hydrated at open time: a [`ReadHandle`] owns the whole
//! decompressed content, a [`DirHandle`] owns the listing snapshot. neither
//! observes later layer mutations. a [`WriteHandle`] buffers in memory and
//! publishes content plus entry atomically on [`WriteHandle::finish`].

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::Fingerprint;
use crate::overlay::dir::{list_children, DirEntry};
use crate::overlay::resolve::resolve_metadata;
use crate::overlay::OverlayFs;
use crate::path;
use crate::types::{Entry, EntryKind, Metadata};

/// default permission bits for files created without explicit mode
pub(crate) const DEFAULT_FILE_MODE: u32 = 0o644;

/// what [`OverlayFs::open`] produced: a file or a directory
pub enum Handle {
    File(ReadHandle),
    Dir(DirHandle),
}

impl Handle {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Handle::File(h) => h.metadata(),
            Handle::Dir(h) => h.metadata(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    /// unwrap the file handle, failing for directories
    pub fn into_file(self) -> Result<ReadHandle> {
        match self {
            Handle::File(h) => Ok(h),
            Handle::Dir(h) => Err(Error::IsADirectory {
                op: "read",
                path: h.path,
            }),
        }
    }
}

/// read-only handle over hydrated file content
#[derive(Debug)]
pub struct ReadHandle {
    path: String,
    metadata: Metadata,
    cursor: Cursor<Vec<u8>>,
}

impl ReadHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// consume the handle, returning the full content
    pub fn into_contents(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for ReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for ReadHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

// writes through a read handle always fail; the error carries the path so
// the caller can tell which handle was misused
impl Write for ReadHandle {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            Error::ReadOnly {
                op: "write",
                path: self.path.clone(),
            },
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// handle over a directory listing snapshot
pub struct DirHandle {
    path: String,
    metadata: Metadata,
    entries: Vec<DirEntry>,
    pos: usize,
}

impl DirHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// remaining entries as a slice without consuming them
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries[self.pos..]
    }
}

impl Iterator for DirHandle {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let entry = self.entries.get(self.pos)?.clone();
        self.pos += 1;
        Some(entry)
    }
}

/// in-progress file write, published on [`finish`](WriteHandle::finish)
///
/// nothing is visible to readers (and nothing reaches the blob store) until
/// finish; dropping the handle discards the buffered content.
pub struct WriteHandle<'a> {
    fs: &'a OverlayFs,
    path: String,
    mode: u32,
    buf: Vec<u8>,
}

impl std::fmt::Debug for WriteHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("buf", &self.buf)
            .finish_non_exhaustive()
    }
}

impl WriteHandle<'_> {
    /// grow or shrink the buffered content to exactly `size` bytes,
    /// zero-filling on growth
    pub fn truncate(&mut self, size: u64) {
        self.buf.resize(size as usize, 0);
    }

    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// store the buffered content and publish the layer entry
    pub fn finish(self) -> Result<Fingerprint> {
        let fingerprint = self
            .fs
            .store()
            .put(&self.buf)
            .map_err(|e| Error::store("close", self.path.clone(), e))?;

        let entry = Entry::regular(self.path.clone(), fingerprint, self.buf.len() as u64, self.mode);
        self.fs.write_state().upsert_layer(entry);

        debug!(path = %self.path, size = self.buf.len(), "finish write");
        Ok(fingerprint)
    }
}

impl Write for WriteHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OverlayFs {
    /// open a path for reading, following symlinks
    ///
    /// files come back hydrated from the blob store; directories come back
    /// with a listing snapshot.
    pub fn open(&self, name: &str) -> Result<Handle> {
        let (entry, metadata) = {
            let state = self.read_state();
            let (entry, metadata) = resolve_metadata(&state, "open", name)?;
            if metadata.is_dir() {
                return Ok(Handle::Dir(DirHandle {
                    entries: list_children(&state, &entry.path),
                    path: entry.path,
                    metadata,
                    pos: 0,
                }));
            }
            (entry, metadata)
        };

        // blob hydration happens outside the lock
        let content = match &metadata.kind {
            EntryKind::Regular { fingerprint, .. } => self
                .store()
                .get(fingerprint)
                .map_err(|e| Error::store("open", entry.path.clone(), e))?,
            // resolution only ever lands on regular files or directories
            _ => Vec::new(),
        };

        Ok(Handle::File(ReadHandle {
            path: entry.path,
            metadata,
            cursor: Cursor::new(content),
        }))
    }

    /// start writing a new file with default permissions
    pub fn create(&self, name: &str) -> Result<WriteHandle<'_>> {
        self.create_with_mode(name, DEFAULT_FILE_MODE)
    }

    /// start writing a new file with explicit permissions
    ///
    /// no layer entry exists until the handle is finished.
    pub fn create_with_mode(&self, name: &str, mode: u32) -> Result<WriteHandle<'_>> {
        let norm = path::normalize(name);
        if norm.is_empty() {
            return Err(Error::InvalidPath {
                op: "create",
                path: norm,
            });
        }
        Ok(WriteHandle {
            fs: self,
            path: norm,
            mode,
            buf: Vec::new(),
        })
    }

    /// read a whole file, following symlinks
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let (entry, metadata) = {
            let state = self.read_state();
            resolve_metadata(&state, "read", name)?
        };

        match &metadata.kind {
            EntryKind::Regular { fingerprint, .. } => self
                .store()
                .get(fingerprint)
                .map_err(|e| Error::store("read", entry.path, e)),
            EntryKind::Directory => Err(Error::IsADirectory {
                op: "read",
                path: entry.path,
            }),
            EntryKind::Symlink { .. } => unreachable!("resolution never returns symlinks"),
        }
    }
}
