//! Storage configuration
//!
//! Settings read once when a client is constructed. Loading them from a
//! file or the environment is the embedding application's job.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};
use super::row_key::HashAlgorithm;
use crate::observability::{Logger, Severity};

/// Storage client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bytes per body block (default: 1 MiB)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Blocks per block set row (default: 64)
    #[serde(default = "default_max_chunks_per_block_set")]
    pub max_chunks_per_block_set: usize,

    /// Root directory for file-backed bodies (default: "store")
    #[serde(default = "default_body_store_dir")]
    pub body_store_dir: PathBuf,

    /// Overrides the dialect's `rowid-hash` property when set
    #[serde(default)]
    pub rowid_hash: Option<HashAlgorithm>,

    /// Minimum severity written by loggers built from this config
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_block_size() -> usize {
    1024 * 1024
}

fn default_max_chunks_per_block_set() -> usize {
    64
}

fn default_body_store_dir() -> PathBuf {
    PathBuf::from("store")
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            max_chunks_per_block_set: default_max_chunks_per_block_set(),
            body_store_dir: default_body_store_dir(),
            rowid_hash: None,
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let config: StoreConfig = serde_json::from_str(json)
            .map_err(|e| StorageError::config(format!("invalid store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_body_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.body_store_dir = dir.into();
        self
    }

    pub fn with_block_layout(mut self, block_size: usize, max_chunks_per_block_set: usize) -> Self {
        self.block_size = block_size;
        self.max_chunks_per_block_set = max_chunks_per_block_set;
        self
    }

    /// Stdout logger filtered at the configured level
    pub fn logger(&self, component: &str) -> Logger {
        Logger::stdio(component).with_min_severity(self.log_level)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.block_size == 0 {
            return Err(StorageError::config("block_size must be greater than zero"));
        }
        if self.max_chunks_per_block_set == 0 {
            return Err(StorageError::config(
                "max_chunks_per_block_set must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.block_size, 1024 * 1024);
        assert_eq!(config.max_chunks_per_block_set, 64);
        assert_eq!(config.body_store_dir, PathBuf::from("store"));
        assert_eq!(config.rowid_hash, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = StoreConfig::from_json(r#"{"block_size": 16, "rowid_hash": "SHA-512"}"#).unwrap();
        assert_eq!(config.block_size, 16);
        assert_eq!(config.max_chunks_per_block_set, 64);
        assert_eq!(config.rowid_hash, Some(HashAlgorithm::Sha512));
        assert_eq!(config.log_level, Severity::Info);
    }

    #[test]
    fn test_logger_uses_configured_level() {
        let config = StoreConfig::from_json(r#"{"log_level": "WARN"}"#).unwrap();
        let logger = config.logger("store");
        assert!(!logger.enabled(Severity::Info));
        assert!(logger.enabled(Severity::Error));
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(StoreConfig::from_json(r#"{"block_size": 0}"#).is_err());
        assert!(StoreConfig::default().with_block_layout(8, 0).validate().is_err());
    }
}
