//! Parsed-file cache.
//!
//! Maps (collection, file) to the file's modification time and its parsed
//! document so unchanged files are not parsed again. The store lives behind
//! a request/response channel; the client gives every call a deadline and
//! treats any failure as a miss, so parsing never depends on the cache.
//!
//! The cache does not look at files. An entry is only valid if its
//! `mtime_ms` matches the file on disk, and checking that is up to the
//! caller.

mod client;
mod store;

pub use client::{spawn_cache_service, Envelope, ParsedFileCache};
pub use store::{CacheStore, Snapshot, StoreError, CACHE_VERSION};

use crate::model::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached parse result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T = Document> {
    /// Modification time of the file when it was parsed, in ms since the epoch.
    pub mtime_ms: f64,
    pub parsed_data: T,
}

/// Store summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub version: String,
    pub total_collections: usize,
    pub total_files: usize,
}

/// One call on the cache channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CacheRequest {
    GetEntry {
        collection_path: String,
        file_path: String,
    },
    SetEntry {
        collection_path: String,
        file_path: String,
        entry: CacheEntry<Value>,
    },
    Invalidate {
        collection_path: String,
        file_path: String,
    },
    InvalidateDirectory {
        collection_path: String,
        dir_path: String,
    },
    InvalidateCollection {
        collection_path: String,
    },
    MoveEntry {
        collection_path: String,
        old_file_path: String,
        new_file_path: String,
    },
    GetStats,
    Clear,
    Prune {
        max_age_ms: u64,
    },
}

impl CacheRequest {
    pub fn op(&self) -> &'static str {
        match self {
            CacheRequest::GetEntry { .. } => "getEntry",
            CacheRequest::SetEntry { .. } => "setEntry",
            CacheRequest::Invalidate { .. } => "invalidate",
            CacheRequest::InvalidateDirectory { .. } => "invalidateDirectory",
            CacheRequest::InvalidateCollection { .. } => "invalidateCollection",
            CacheRequest::MoveEntry { .. } => "moveEntry",
            CacheRequest::GetStats => "getStats",
            CacheRequest::Clear => "clear",
            CacheRequest::Prune { .. } => "prune",
        }
    }
}

/// Reply to a [`CacheRequest`]: `{success, data}` or `{success: false, error}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheResponse {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
