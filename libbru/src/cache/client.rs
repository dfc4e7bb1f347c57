//! Fail-open client for the parsed-file cache, and the task serving it.

use super::{CacheEntry, CacheRequest, CacheResponse, CacheStats, CacheStore, StoreError};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// A request and the slot its response goes into.
#[derive(Debug)]
pub struct Envelope {
    pub request: CacheRequest,
    pub reply: oneshot::Sender<CacheResponse>,
}

/// Handle to the cache.
///
/// Every call is bounded by the configured timeout. Timeouts, a closed
/// channel, failed replies and data that does not decode are all treated as
/// a miss on reads and ignored on writes.
#[derive(Clone, Debug)]
pub struct ParsedFileCache {
    tx: Option<mpsc::Sender<Envelope>>,
    timeout: Duration,
}

impl ParsedFileCache {
    pub fn from_sender(tx: mpsc::Sender<Envelope>, timeout: Duration) -> Self {
        Self {
            tx: Some(tx),
            timeout,
        }
    }

    /// A cache with no backing store: every read misses.
    pub fn disconnected() -> Self {
        Self {
            tx: None,
            timeout: Duration::ZERO,
        }
    }

    /// Send one request. `None` means the call failed.
    async fn call(&self, request: CacheRequest) -> Option<Option<Value>> {
        let op = request.op();
        let Some(tx) = &self.tx else {
            return None;
        };

        let (reply, rx) = oneshot::channel();
        let exchange = async {
            tx.send(Envelope { request, reply }).await.ok()?;
            rx.await.ok()
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(Some(response)) if response.success => Some(response.data),
            Ok(Some(response)) => {
                let error = response.error.as_deref().unwrap_or("");
                warn!(op, error, "cache call failed");
                None
            }
            Ok(None) => {
                debug!(op, "cache channel closed");
                None
            }
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "cache call timed out");
                None
            }
        }
    }

    pub async fn get_entry(&self, collection_path: &str, file_path: &str) -> Option<CacheEntry> {
        let data = self
            .call(CacheRequest::GetEntry {
                collection_path: collection_path.to_string(),
                file_path: file_path.to_string(),
            })
            .await??;
        match serde_json::from_value(data) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(file_path, %err, "cached entry does not decode");
                None
            }
        }
    }

    pub async fn set_entry(&self, collection_path: &str, file_path: &str, entry: &CacheEntry) {
        let parsed_data = match serde_json::to_value(&entry.parsed_data) {
            Ok(value) => value,
            Err(err) => {
                debug!(file_path, %err, "document does not encode, not caching");
                return;
            }
        };
        self.call(CacheRequest::SetEntry {
            collection_path: collection_path.to_string(),
            file_path: file_path.to_string(),
            entry: CacheEntry {
                mtime_ms: entry.mtime_ms,
                parsed_data,
            },
        })
        .await;
    }

    pub async fn invalidate(&self, collection_path: &str, file_path: &str) {
        self.call(CacheRequest::Invalidate {
            collection_path: collection_path.to_string(),
            file_path: file_path.to_string(),
        })
        .await;
    }

    pub async fn invalidate_directory(&self, collection_path: &str, dir_path: &str) {
        self.call(CacheRequest::InvalidateDirectory {
            collection_path: collection_path.to_string(),
            dir_path: dir_path.to_string(),
        })
        .await;
    }

    pub async fn invalidate_collection(&self, collection_path: &str) {
        self.call(CacheRequest::InvalidateCollection {
            collection_path: collection_path.to_string(),
        })
        .await;
    }

    pub async fn move_entry(
        &self,
        collection_path: &str,
        old_file_path: &str,
        new_file_path: &str,
    ) {
        self.call(CacheRequest::MoveEntry {
            collection_path: collection_path.to_string(),
            old_file_path: old_file_path.to_string(),
            new_file_path: new_file_path.to_string(),
        })
        .await;
    }

    pub async fn get_stats(&self) -> Option<CacheStats> {
        let data = self.call(CacheRequest::GetStats).await??;
        serde_json::from_value(data).ok()
    }

    pub async fn clear(&self) {
        self.call(CacheRequest::Clear).await;
    }

    pub async fn prune(&self, max_age: Duration) {
        self.call(CacheRequest::Prune {
            max_age_ms: max_age.as_millis() as u64,
        })
        .await;
    }
}

/// Serve `store` on a background task.
///
/// Requests are answered from memory. Pending changes are written at most
/// once per `flush_interval`, on a blocking thread, with one write in flight
/// at a time. The task writes whatever is left and exits once every client
/// handle is dropped.
pub fn spawn_cache_service(
    store: CacheStore,
    timeout: Duration,
    flush_interval: Duration,
) -> (ParsedFileCache, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(serve(store, rx, flush_interval));
    (ParsedFileCache::from_sender(tx, timeout), handle)
}

type Write = JoinHandle<Result<(), StoreError>>;

async fn serve(mut store: CacheStore, mut rx: mpsc::Receiver<Envelope>, flush_interval: Duration) {
    // `interval` panics on a zero period.
    let mut ticker = time::interval(flush_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut writing: Option<Write> = None;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(envelope) => answer(&mut store, envelope),
                None => break,
            },
            _ = ticker.tick() => {
                if writing.as_ref().is_some_and(|w| !w.is_finished()) {
                    continue;
                }
                if let Some(done) = writing.take() {
                    settle(&mut store, done).await;
                }
                writing = start_write(&mut store);
            }
        }
    }

    if let Some(done) = writing.take() {
        settle(&mut store, done).await;
    }
    if let Some(done) = start_write(&mut store) {
        settle(&mut store, done).await;
    }
}

fn start_write(store: &mut CacheStore) -> Option<Write> {
    let snapshot = store.snapshot()?;
    Some(task::spawn_blocking(move || snapshot.write()))
}

/// Wait for a write; a failed one leaves the changes pending.
async fn settle(store: &mut CacheStore, write: Write) {
    let error = match write.await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(err) => err.to_string(),
    };
    warn!(%error, "cannot persist cache");
    store.mark_dirty();
}

fn answer(store: &mut CacheStore, envelope: Envelope) {
    let Envelope { request, reply } = envelope;
    let response = respond(store, request);
    // The caller may have timed out.
    let _ = reply.send(response);
}

fn respond(store: &mut CacheStore, request: CacheRequest) -> CacheResponse {
    let data = match request {
        CacheRequest::GetEntry {
            collection_path,
            file_path,
        } => match store.get_entry(&collection_path, &file_path) {
            Some(entry) => match serde_json::to_value(entry) {
                Ok(value) => Some(value),
                Err(err) => return CacheResponse::err(err.to_string()),
            },
            None => None,
        },
        CacheRequest::SetEntry {
            collection_path,
            file_path,
            entry,
        } => {
            store.set_entry(&collection_path, &file_path, entry);
            None
        }
        CacheRequest::Invalidate {
            collection_path,
            file_path,
        } => {
            store.invalidate(&collection_path, &file_path);
            None
        }
        CacheRequest::InvalidateDirectory {
            collection_path,
            dir_path,
        } => {
            store.invalidate_directory(&collection_path, &dir_path);
            None
        }
        CacheRequest::InvalidateCollection { collection_path } => {
            store.invalidate_collection(&collection_path);
            None
        }
        CacheRequest::MoveEntry {
            collection_path,
            old_file_path,
            new_file_path,
        } => {
            store.move_entry(&collection_path, &old_file_path, &new_file_path);
            None
        }
        CacheRequest::GetStats => match serde_json::to_value(store.stats()) {
            Ok(value) => Some(value),
            Err(err) => return CacheResponse::err(err.to_string()),
        },
        CacheRequest::Clear => {
            store.clear();
            None
        }
        CacheRequest::Prune { max_age_ms } => {
            store.prune(Duration::from_millis(max_age_ms));
            None
        }
    };
    CacheResponse::ok(data)
}
