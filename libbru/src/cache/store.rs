//! Backing store for the parsed-file cache.

use super::{CacheEntry, CacheStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

/// Format version of the store. A store written by another version is
/// discarded on open.
pub const CACHE_VERSION: &str = "1.0.0";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    collection_path: String,
    mtime_ms: f64,
    parsed_data: Value,
    /// When the entry was written, in ms since the epoch.
    parsed_at: u64,
}

#[derive(Deserialize)]
struct StoreFile {
    version: String,
    entries: BTreeMap<String, Record>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: &'a str,
    entries: &'a BTreeMap<String, Record>,
}

/// Ordered map from `collection \0 file` to cached parse results, optionally
/// persisted to a JSON file.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: BTreeMap<String, Record>,
    path: Option<PathBuf>,
    dirty: bool,
}

fn key(collection_path: &str, file_path: &str) -> String {
    format!("{}\0{}", collection_path, file_path)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl CacheStore {
    /// An empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`, creating it on first flush. Entries older
    /// than `max_age` are dropped.
    pub fn open(path: &Path, max_age: Duration) -> Result<Self, StoreError> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let file: StoreFile = serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        if file.version == CACHE_VERSION {
            store.entries = file.entries;
        } else {
            info!(
                found = %file.version,
                expected = CACHE_VERSION,
                "cache version changed, starting empty"
            );
            store.dirty = true;
        }
        store.prune(max_age);
        Ok(store)
    }

    pub fn get_entry(&self, collection_path: &str, file_path: &str) -> Option<CacheEntry<Value>> {
        self.entries
            .get(&key(collection_path, file_path))
            .map(|r| CacheEntry {
                mtime_ms: r.mtime_ms,
                parsed_data: r.parsed_data.clone(),
            })
    }

    pub fn set_entry(&mut self, collection_path: &str, file_path: &str, entry: CacheEntry<Value>) {
        let record = Record {
            collection_path: collection_path.to_string(),
            mtime_ms: entry.mtime_ms,
            parsed_data: entry.parsed_data,
            parsed_at: now_ms(),
        };
        self.entries.insert(key(collection_path, file_path), record);
        self.dirty = true;
    }

    pub fn invalidate(&mut self, collection_path: &str, file_path: &str) -> bool {
        let removed = self.entries.remove(&key(collection_path, file_path)).is_some();
        self.dirty |= removed;
        removed
    }

    /// Drop every entry of the collection under `dir_path`.
    pub fn invalidate_directory(&mut self, collection_path: &str, dir_path: &str) -> usize {
        let dir = if dir_path.ends_with(MAIN_SEPARATOR) {
            dir_path.to_string()
        } else {
            format!("{}{}", dir_path, MAIN_SEPARATOR)
        };
        self.remove_prefix(&key(collection_path, &dir))
    }

    pub fn invalidate_collection(&mut self, collection_path: &str) -> usize {
        self.remove_prefix(&key(collection_path, ""))
    }

    fn remove_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            self.entries.remove(k);
        }
        self.dirty |= !doomed.is_empty();
        doomed.len()
    }

    /// Re-key an entry after a rename. Missing entries are left alone.
    pub fn move_entry(
        &mut self,
        collection_path: &str,
        old_file_path: &str,
        new_file_path: &str,
    ) -> bool {
        match self.get_entry(collection_path, old_file_path) {
            Some(entry) => {
                self.invalidate(collection_path, old_file_path);
                self.set_entry(collection_path, new_file_path, entry);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let collections: BTreeSet<&str> = self
            .entries
            .values()
            .map(|r| r.collection_path.as_str())
            .collect();
        CacheStats {
            version: CACHE_VERSION.to_string(),
            total_collections: collections.len(),
            total_files: self.entries.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    /// Drop entries written more than `max_age` ago.
    pub fn prune(&mut self, max_age: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(max_age.as_millis() as u64);
        self.prune_before(cutoff)
    }

    fn prune_before(&mut self, cutoff_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| r.parsed_at >= cutoff_ms);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, "pruned cache entries");
            self.dirty = true;
        }
        pruned
    }

    /// Take a copy of the entries if there are changes to persist. The
    /// store counts as clean afterwards; see [`CacheStore::mark_dirty`].
    pub fn snapshot(&mut self) -> Option<Snapshot> {
        let path = self.path.clone()?;
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(Snapshot {
            path,
            entries: self.entries.clone(),
        })
    }

    /// Record that a snapshot was not written.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Write pending changes to disk. No-op for in-memory stores.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(());
        };
        let written = snapshot.write();
        if written.is_err() {
            self.mark_dirty();
        }
        written
    }
}

/// Store contents detached from the store, so they can be written on a
/// blocking thread while the store keeps serving.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    entries: BTreeMap<String, Record>,
}

impl Snapshot {
    /// Serialize and replace the store file through a temporary sibling.
    pub fn write(&self) -> Result<(), StoreError> {
        let path = &self.path;
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let file = StoreFileRef {
            version: CACHE_VERSION,
            entries: &self.entries,
        };
        let json = serde_json::to_vec(&file).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        debug!(path = %path.display(), entries = self.entries.len(), "cache written");
        Ok(())
    }
}
