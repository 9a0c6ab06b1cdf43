use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::Error;

/// SHA-256 content fingerprint used for addressing blobs
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// zero fingerprint (useful as sentinel in tests)
    pub const ZERO: Fingerprint = Fingerprint([0u8; 32]);

    /// compute the fingerprint of a byte payload
    ///
    /// deterministic: identical bytes always yield identical fingerprints,
    /// which is exactly the deduplication signal the store relies on.
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        Self(digest.into())
    }

    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidFingerprintHex(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidFingerprintHex(s.to_string()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// split into path components for the disk store fanout
    /// returns (first 2 hex chars, next 2, remaining 60)
    pub fn to_path_components(&self) -> (String, String, String) {
        let hex = self.to_hex();
        (
            hex[..2].to_string(),
            hex[2..4].to_string(),
            hex[4..].to_string(),
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_determinism() {
        let f1 = Fingerprint::of(b"hello");
        let f2 = Fingerprint::of(b"hello");
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_fingerprint_different_content() {
        let f1 = Fingerprint::of(b"hello");
        let f2 = Fingerprint::of(b"world");
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_fingerprint_empty_content() {
        let f = Fingerprint::of(b"");
        assert_ne!(f, Fingerprint::ZERO);
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = Fingerprint::of(b"roundtrip");
        let parsed = Fingerprint::from_hex(&original.to_hex()).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Fingerprint::from_hex("not valid hex").is_err());
        assert!(Fingerprint::from_hex("abcd").is_err()); // too short
        assert!(Fingerprint::from_hex(
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789ff"
        )
        .is_err()); // too long
    }

    #[test]
    fn test_path_components() {
        let f =
            Fingerprint::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
                .unwrap();
        let (d1, d2, rest) = f.to_path_components();
        assert_eq!(d1, "ab");
        assert_eq!(d2, "cd");
        assert_eq!(rest, "ef0123456789abcdef0123456789abcdef0123456789abcdef0123456789");
    }

    #[test]
    fn test_serde_json() {
        let f = Fingerprint::of(b"serde");
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains(&f.to_hex()[..8]));
        let parsed: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(f, parsed);
    }
}
