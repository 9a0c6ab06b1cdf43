use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// current on-disk store format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// disk store configuration stored in config.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// on-disk layout version
    pub version: u32,
    /// zstd level applied to blobs at rest
    pub compression_level: i32,
}

impl StoreConfig {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: StoreConfig = toml::from_str(&content)?;
        if config.version != STORE_FORMAT_VERSION {
            return Err(Error::StoreVersion(config.version));
        }
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            compression_level: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = StoreConfig {
            version: STORE_FORMAT_VERSION,
            compression_level: 9,
        };
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "version = 99\ncompression_level = 3\n").unwrap();

        let result = StoreConfig::load(&path);
        assert!(matches!(result, Err(Error::StoreVersion(99))));
    }

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.version, STORE_FORMAT_VERSION);
        assert_eq!(config.compression_level, 3);
    }
}
