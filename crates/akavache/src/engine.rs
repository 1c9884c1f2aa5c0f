//! `BlobCacheEngine`: the public operations (insert/get/invalidate/flush/
//! vacuum) composing the index, blob store, encryption filter, ordered
//! executor, and request coalescer into one store.

use akavache_core::{
    CacheEntry, CacheEntryMeta, CacheError, CacheMetrics, CacheOperation, CacheTier, Clock,
    EvictionReason, ExpiresAt, FilesystemProvider, NoopMetrics, Result,
};
use akavache_storage::{digest_of, BlobStore, CacheIndex, EncryptionFilter};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;

use crate::coalescer::RequestCoalescer;
use crate::ordered_executor::OrderedExecutor;
use crate::state::CacheState;

/// What `vacuum()` reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacuumReport {
    pub expired_entries_removed: usize,
    pub orphaned_blobs_removed: usize,
}

/// One logical store: either `UserAccount`/`LocalMachine`/`Secure` backed by
/// a `DiskBlobStore`, or `InMemory` backed by a `MemoryBlobStore`.
pub struct BlobCacheEngine {
    fs: Arc<dyn FilesystemProvider>,
    index_path: PathBuf,
    blob_store: Arc<dyn BlobStore>,
    index: Arc<CacheIndex>,
    encryption: Option<EncryptionFilter>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn CacheMetrics>,
    coalescer: RequestCoalescer<CacheEntry>,
    executor: OrderedExecutor,
    state: RwLock<CacheState>,
    init: OnceCell<()>,
    flush_debounce: Duration,
    flush_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl BlobCacheEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fs: Arc<dyn FilesystemProvider>,
        index_path: PathBuf,
        blob_store: Arc<dyn BlobStore>,
        encryption: Option<EncryptionFilter>,
        clock: Arc<dyn Clock>,
        flush_debounce: Duration,
    ) -> Self {
        Self {
            index: Arc::new(CacheIndex::new(fs.clone(), index_path.clone())),
            fs,
            index_path,
            blob_store,
            encryption,
            clock,
            metrics: Arc::new(NoopMetrics),
            coalescer: RequestCoalescer::new(),
            executor: OrderedExecutor::spawn(),
            state: RwLock::new(CacheState::Uninitialized),
            init: OnceCell::new(),
            flush_debounce,
            flush_task: AsyncMutex::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Lazily create the store directory, load the index (dropping entries
    /// whose payload is missing), and start the debounced flush loop. Runs
    /// exactly once no matter how many callers race into it.
    async fn ensure_ready(&self) -> Result<()> {
        self.check_not_disposed()?;
        if *self.state.read() == CacheState::Ready {
            return Ok(());
        }

        self.init
            .get_or_try_init(|| async {
                if let Some(parent) = self.index_path.parent() {
                    self.fs.create_dir_all(parent).await?;
                }

                let live_digests: HashSet<String> =
                    self.blob_store.list_digests().await?.into_iter().collect();
                self.index
                    .load(|key| live_digests.contains(&digest_of(key)))
                    .await?;

                let index = self.index.clone();
                let debounce = self.flush_debounce;
                let handle = tokio::spawn(async move {
                    CacheIndex::run_debounced_flush(&index, debounce).await;
                });
                *self.flush_task.lock().await = Some(handle);

                *self.state.write() = CacheState::Ready;
                Ok(())
            })
            .await?;
        Ok(())
    }

    fn check_not_disposed(&self) -> Result<()> {
        match *self.state.read() {
            CacheState::Disposing | CacheState::Disposed => Err(CacheError::Disposed),
            CacheState::Uninitialized | CacheState::Ready => Ok(()),
        }
    }

    /// Insert a raw payload under `key`. `type_tag` is set by
    /// [`crate::typed::TypedObjectLayer`]; raw callers pass `None`.
    pub async fn insert_with_tag(
        &self,
        key: &str,
        bytes: Vec<u8>,
        expires_at: ExpiresAt,
        type_tag: Option<String>,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::Internal("cache key must not be empty".to_string()));
        }
        self.ensure_ready().await?;

        let key = key.to_string();
        let index = self.index.clone();
        let blob_store = self.blob_store.clone();
        let encryption = self.encryption.clone();
        let clock = self.clock.clone();
        let metrics = self.metrics.clone();
        let started = Instant::now();

        self.executor
            .submit(move || {
                Box::pin(async move {
                    let created_at = clock.now();
                    let resolved_expires = expires_at.resolve(created_at, &*clock);

                    let on_disk = match &encryption {
                        Some(filter) => filter.encrypt(&bytes).await?,
                        None => bytes,
                    };
                    blob_store.write(&key, &on_disk).await?;
                    index.insert(key.clone(), CacheEntryMeta::new(created_at, resolved_expires, type_tag));

                    metrics.record_latency(CacheOperation::Set, started.elapsed());
                    tracing::debug!(key = %key, "inserted");
                    Ok(())
                })
            })
            .await
    }

    pub async fn insert(&self, key: &str, bytes: Vec<u8>, expires_at: ExpiresAt) -> Result<()> {
        self.insert_with_tag(key, bytes, expires_at, None).await
    }

    /// Insert every pair; completes only once all have been accepted.
    /// Ordering among the pairs is unspecified.
    pub async fn insert_many(&self, pairs: Vec<(String, Vec<u8>, ExpiresAt)>) -> Result<()> {
        for (key, bytes, expires_at) in pairs {
            self.insert(&key, bytes, expires_at).await?;
        }
        Ok(())
    }

    async fn get_entry(&self, key: &str) -> Result<CacheEntry> {
        self.ensure_ready().await?;

        let owned_key = key.to_string();
        let index = self.index.clone();
        let blob_store = self.blob_store.clone();
        let encryption = self.encryption.clone();
        let clock = self.clock.clone();
        let metrics = self.metrics.clone();

        self.coalescer
            .coalesce(key, move || async move {
                let now = clock.now();
                let meta = match index.get(&owned_key) {
                    Some(meta) => meta,
                    None => {
                        metrics.record_miss(&owned_key);
                        return Err(CacheError::NotFound(owned_key));
                    }
                };

                if meta.is_expired_at(now) {
                    index.remove(&owned_key);
                    let _ = blob_store.delete(&owned_key).await;
                    metrics.record_eviction(EvictionReason::Expired);
                    return Err(CacheError::NotFound(owned_key));
                }

                let raw = match blob_store.read(&owned_key).await? {
                    Some(raw) => raw,
                    None => {
                        index.remove(&owned_key);
                        metrics.record_eviction(EvictionReason::MissingPayload);
                        return Err(CacheError::NotFound(owned_key));
                    }
                };
                let payload = match &encryption {
                    Some(filter) => filter.decrypt(&raw).await?,
                    None => raw,
                };

                metrics.record_hit(&owned_key, CacheTier::L1Memory);
                Ok(CacheEntry::new(meta, payload))
            })
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.get_entry(key).await.map(|entry| entry.payload)
    }

    /// Bulk read: keys that fail (missing, expired, I/O error) are simply
    /// omitted rather than failing the whole call.
    pub async fn get_many(&self, keys: &[String]) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Ok(bytes) = self.get(key).await {
                out.push((key.clone(), bytes));
            }
        }
        out
    }

    /// Yields `None` for a key that is absent or expired, rather than
    /// `KeyNotFound` as `get` does.
    pub async fn get_created_at(&self, key: &str) -> Result<Option<SystemTime>> {
        self.ensure_ready().await?;
        let now = self.clock.now();
        let meta = match self.index.get(key) {
            Some(meta) => meta,
            None => return Ok(None),
        };
        if meta.is_expired_at(now) {
            return Ok(None);
        }
        Ok(Some(meta.created_at))
    }

    pub async fn get_all_keys(&self) -> Result<Vec<String>> {
        self.ensure_ready().await?;
        let now = self.clock.now();
        Ok(self
            .index
            .keys()
            .into_iter()
            .filter(|key| !self.index.get(key).map(|meta| meta.is_expired_at(now)).unwrap_or(true))
            .collect())
    }

    /// `get-all-keys(type-tag)` (spec.md:73): the live, unexpired keys whose
    /// entry carries the given type tag.
    pub async fn get_all_keys_with_tag(&self, type_tag: &str) -> Result<Vec<String>> {
        self.keys_with_tag(type_tag).await
    }

    async fn keys_with_tag(&self, type_tag: &str) -> Result<Vec<String>> {
        self.ensure_ready().await?;
        Ok(self
            .index
            .keys()
            .into_iter()
            .filter(|key| self.index.get(key).and_then(|m| m.type_tag).as_deref() == Some(type_tag))
            .collect())
    }

    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.invalidate_many(std::slice::from_ref(&key.to_string())).await
    }

    pub async fn invalidate_many(&self, keys: &[String]) -> Result<()> {
        self.ensure_ready().await?;
        let keys = keys.to_vec();
        let index = self.index.clone();
        let blob_store = self.blob_store.clone();

        self.executor
            .submit(move || {
                Box::pin(async move {
                    for key in keys {
                        if index.remove(&key).is_some() {
                            blob_store.delete(&key).await?;
                        }
                    }
                    Ok(())
                })
            })
            .await
    }

    pub async fn invalidate_all(&self) -> Result<()> {
        self.ensure_ready().await?;
        let index = self.index.clone();
        let blob_store = self.blob_store.clone();

        self.executor
            .submit(move || {
                Box::pin(async move {
                    for key in index.keys() {
                        index.remove(&key);
                        blob_store.delete(&key).await?;
                    }
                    Ok(())
                })
            })
            .await
    }

    pub(crate) async fn invalidate_all_by_tag(&self, type_tag: &str) -> Result<()> {
        let keys = self.keys_with_tag(type_tag).await?;
        self.invalidate_many(&keys).await
    }

    pub async fn update_expiration(&self, key: &str, expires_at: ExpiresAt) -> Result<()> {
        self.ensure_ready().await?;
        let key = key.to_string();
        let index = self.index.clone();
        let clock = self.clock.clone();

        self.executor
            .submit(move || {
                Box::pin(async move {
                    let meta = index
                        .get(&key)
                        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
                    let resolved = expires_at.resolve(meta.created_at, &*clock);
                    index.insert(key, CacheEntryMeta::new(meta.created_at, resolved, meta.type_tag));
                    Ok(())
                })
            })
            .await
    }

    pub async fn flush(&self) -> Result<()> {
        self.ensure_ready().await?;
        let index = self.index.clone();
        self.executor.submit(move || Box::pin(async move { index.flush().await })).await
    }

    /// Remove every entry whose `expires_at` is at or before now, then
    /// delete blob files that no live entry references.
    pub async fn vacuum(&self) -> Result<VacuumReport> {
        self.ensure_ready().await?;
        let index = self.index.clone();
        let blob_store = self.blob_store.clone();
        let clock = self.clock.clone();
        let metrics = self.metrics.clone();

        self.executor
            .submit(move || {
                Box::pin(async move {
                    let now = clock.now();
                    let mut report = VacuumReport::default();

                    let expired: Vec<String> = index
                        .keys()
                        .into_iter()
                        .filter(|key| index.get(key).map(|meta| meta.is_expired_at(now)).unwrap_or(false))
                        .collect();
                    for key in expired {
                        index.remove(&key);
                        if let Err(e) = blob_store.delete(&key).await {
                            tracing::warn!(key = %key, error = %e, "vacuum: failed to delete expired blob");
                        } else {
                            report.expired_entries_removed += 1;
                            metrics.record_eviction(EvictionReason::Expired);
                        }
                    }

                    let live_digests: HashSet<String> = index.keys().iter().map(|k| digest_of(k)).collect();
                    for digest in blob_store.list_digests().await? {
                        if !live_digests.contains(&digest) {
                            if let Err(e) = blob_store.delete_digest(&digest).await {
                                tracing::warn!(digest = %digest, error = %e, "vacuum: failed to delete orphaned blob");
                            } else {
                                report.orphaned_blobs_removed += 1;
                            }
                        }
                    }

                    index.flush().await?;
                    Ok(report)
                })
            })
            .await
    }

    /// Flush, then reject every further operation with `Disposed`.
    pub async fn dispose(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state == CacheState::Disposed {
                return Ok(());
            }
            *state = CacheState::Disposing;
        }

        let flush_result = self.index.flush().await;

        if let Some(handle) = self.flush_task.lock().await.take() {
            handle.abort();
        }
        self.executor.shutdown().await;

        *self.state.write() = CacheState::Disposed;
        flush_result
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
