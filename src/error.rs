use std::path::PathBuf;

use crate::Fingerprint;

/// error type for strata operations
///
/// filesystem-facing variants carry the failing operation name and the path
/// involved so callers can report actionable context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{op} {path}: no such file or directory")]
    NotFound { op: &'static str, path: String },

    #[error("{op} {path}: file exists")]
    AlreadyExists { op: &'static str, path: String },

    #[error("{op} {path}: not a directory")]
    NotADirectory { op: &'static str, path: String },

    #[error("{op} {path}: is a directory")]
    IsADirectory { op: &'static str, path: String },

    #[error("{op} {path}: directory not empty")]
    NotEmpty { op: &'static str, path: String },

    #[error("{op} {path}: too many levels of symbolic links")]
    TooManyLinks { op: &'static str, path: String },

    #[error("{op} {path}: invalid path")]
    InvalidPath { op: &'static str, path: String },

    #[error("{op} {path}: read-only handle")]
    ReadOnly { op: &'static str, path: String },

    #[error("{op} {path}: not a symlink")]
    NotASymlink { op: &'static str, path: String },

    #[error("{op} {path}: store failure")]
    Store {
        op: &'static str,
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("blob not found: {0}")]
    BlobNotFound(Fingerprint),

    #[error("corrupt blob: fingerprint mismatch for {0}")]
    CorruptBlob(Fingerprint),

    #[error("store not found at {0}")]
    NoStore(PathBuf),

    #[error("store already exists at {0}")]
    StoreExists(PathBuf),

    #[error("unsupported store format version {0}")]
    StoreVersion(u32),

    #[error("lock contention on store")]
    LockContention,

    #[error("invalid fingerprint hex: {0}")]
    InvalidFingerprintHex(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// wrap a store error with the operation and path it failed for
    pub(crate) fn store(op: &'static str, path: impl Into<String>, source: Error) -> Self {
        Error::Store {
            op,
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// true if this error (or the store error it wraps) is a not-found
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } | Error::BlobNotFound(_) => true,
            Error::Store { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_op_and_path() {
        let err = Error::NotFound {
            op: "stat",
            path: "a/b.txt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stat"));
        assert!(msg.contains("a/b.txt"));
    }

    #[test]
    fn test_store_error_wraps_source() {
        let inner = Error::BlobNotFound(Fingerprint::ZERO);
        let err = Error::store("open", "f.txt", inner);
        assert!(err.is_not_found());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound {
            op: "stat",
            path: "x".into()
        }
        .is_not_found());
        assert!(!Error::AlreadyExists {
            op: "mkdir",
            path: "x".into()
        }
        .is_not_found());
    }
}
