//! Engine configuration.
//!
//! `defaults/bru.default.toml` is embedded so that the documented defaults
//! and runtime behavior stay in sync. A user file is layered over it key by
//! key before deserializing into [`EngineConfig`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

const DEFAULT_TOML: &str = include_str!("../defaults/bru.default.toml");

/// Error loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Syntax(#[from] toml_edit::TomlError),

    #[error("invalid configuration: {0}")]
    Shape(#[from] toml_edit::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    pub lanes: LaneConfig,
    pub cache: CacheConfig,
}

/// Lane routing knobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LaneConfig {
    /// Ascending lane capacities in megabytes.
    pub thresholds_mb: Vec<f64>,
    pub max_queue_depth: usize,
}

/// Parsed-file cache knobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheConfig {
    pub timeout_ms: u64,
    pub flush_interval_ms: u64,
    pub max_age_days: u64,
    /// Persist the store here; in-memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lanes: LaneConfig {
                thresholds_mb: vec![0.01, 0.05, 0.1, 1.0, 1000.0],
                max_queue_depth: 64,
            },
            cache: CacheConfig {
                timeout_ms: 5000,
                flush_interval_ms: 1000,
                max_age_days: 30,
                path: None,
            },
        }
    }
}

impl EngineConfig {
    /// The embedded defaults.
    pub fn load_defaults() -> Result<Self, ConfigError> {
        Self::from_toml_str("")
    }

    /// Layer `overrides` over the embedded defaults.
    pub fn from_toml_str(overrides: &str) -> Result<Self, ConfigError> {
        let mut doc: DocumentMut = DEFAULT_TOML.parse()?;
        let user: DocumentMut = overrides.parse()?;
        merge(doc.as_table_mut(), user.as_table());
        Ok(toml_edit::de::from_document(doc)?)
    }

    /// Layer a configuration file over the embedded defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

fn merge(base: &mut Table, overlay: &Table) {
    for (key, item) in overlay.iter() {
        match (base.get_mut(key), item) {
            (Some(Item::Table(base_table)), Item::Table(overlay_table)) => {
                merge(base_table, overlay_table)
            }
            _ => {
                base.insert(key, item.clone());
            }
        }
    }
}
