//! In-memory key index with debounced, versioned persistence.

use akavache_core::{CacheEntryMeta, CacheError, FilesystemProvider, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;

const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    key: String,
    created_at: SystemTime,
    expires_at: Option<SystemTime>,
    type_tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    records: Vec<IndexRecord>,
}

/// The live key -> metadata map for a single store, with a background task
/// that coalesces writes into a single debounced flush instead of hitting
/// disk on every insert.
pub struct CacheIndex {
    entries: RwLock<HashMap<String, CacheEntryMeta>>,
    fs: Arc<dyn FilesystemProvider>,
    path: PathBuf,
    dirty: AtomicBool,
    notify: Notify,
}

impl CacheIndex {
    /// Build an empty index; call [`CacheIndex::load`] to recover from disk.
    pub fn new(fs: Arc<dyn FilesystemProvider>, path: PathBuf) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fs,
            path,
            dirty: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Load index records from disk, dropping entries whose payload file is
    /// missing and resetting to empty on a version mismatch or corrupt file.
    pub async fn load(&self, blob_exists: impl Fn(&str) -> bool) -> Result<()> {
        if !self.fs.exists(&self.path).await {
            return Ok(());
        }

        let bytes = self.fs.read(&self.path).await?;
        let decoded: std::result::Result<(IndexFile, usize), _> =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard());

        let file = match decoded {
            Ok((file, _)) if file.version == INDEX_FORMAT_VERSION => file,
            Ok((file, _)) => {
                tracing::warn!(found = file.version, expected = INDEX_FORMAT_VERSION, "index format version mismatch, starting empty");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "index file is corrupt, starting empty");
                return Ok(());
            }
        };

        let mut entries = self.entries.write();
        for record in file.records {
            if !blob_exists(&record.key) {
                continue;
            }
            entries.insert(
                record.key,
                CacheEntryMeta::new(record.created_at, record.expires_at, record.type_tag),
            );
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<CacheEntryMeta> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: String, meta: CacheEntryMeta) {
        self.entries.write().insert(key, meta);
        self.mark_dirty();
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntryMeta> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.mark_dirty();
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Serialize the index and write it to disk immediately, regardless of
    /// the debounce schedule. Called on `dispose`/`flush`.
    pub async fn flush(&self) -> Result<()> {
        let records: Vec<IndexRecord> = self
            .entries
            .read()
            .iter()
            .map(|(key, meta)| IndexRecord {
                key: key.clone(),
                created_at: meta.created_at,
                expires_at: meta.expires_at,
                type_tag: meta.type_tag.clone(),
            })
            .collect();

        let file = IndexFile {
            version: INDEX_FORMAT_VERSION,
            records,
        };

        let bytes = bincode::serde::encode_to_vec(&file, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        self.fs.write(&self.path, &bytes).await?;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Run the debounce loop: wait for a dirty mark, sleep `debounce`, flush
    /// if still dirty. Intended to run for the lifetime of the store inside
    /// a `tokio::spawn`ed task, cooperatively cancelled by dropping its
    /// `JoinHandle`.
    pub async fn run_debounced_flush(self: &Arc<Self>, debounce: Duration) {
        loop {
            self.notify.notified().await;
            tokio::time::sleep(debounce).await;
            if self.dirty.load(Ordering::Acquire) {
                if let Err(e) = self.flush().await {
                    tracing::warn!(error = %e, "debounced index flush failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akavache_core::MemoryFilesystem;

    fn meta_at(created: SystemTime) -> CacheEntryMeta {
        CacheEntryMeta::new(created, None, None)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let index = CacheIndex::new(Arc::new(MemoryFilesystem::new()), PathBuf::from("/mem/idx"));
        assert!(index.get("k").is_none());

        index.insert("k".to_string(), meta_at(SystemTime::UNIX_EPOCH));
        assert!(index.get("k").is_some());
        assert_eq!(index.len(), 1);

        index.remove("k");
        assert!(index.get("k").is_none());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_flush_and_load_roundtrip() {
        let fs = Arc::new(MemoryFilesystem::new());
        let path = PathBuf::from("/mem/app/index.bin");

        let index = CacheIndex::new(fs.clone(), path.clone());
        index.insert("alpha".to_string(), meta_at(SystemTime::UNIX_EPOCH));
        index.insert("beta".to_string(), meta_at(SystemTime::UNIX_EPOCH));
        index.flush().await.unwrap();

        let reloaded = CacheIndex::new(fs, path);
        reloaded.load(|_| true).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get("alpha").is_some());
    }

    #[tokio::test]
    async fn test_load_drops_entries_with_missing_blob() {
        let fs = Arc::new(MemoryFilesystem::new());
        let path = PathBuf::from("/mem/app/index.bin");

        let index = CacheIndex::new(fs.clone(), path.clone());
        index.insert("alpha".to_string(), meta_at(SystemTime::UNIX_EPOCH));
        index.insert("beta".to_string(), meta_at(SystemTime::UNIX_EPOCH));
        index.flush().await.unwrap();

        let reloaded = CacheIndex::new(fs, path);
        reloaded.load(|key| key == "alpha").await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("alpha").is_some());
        assert!(reloaded.get("beta").is_none());
    }

    #[tokio::test]
    async fn test_load_with_no_file_is_empty() {
        let index = CacheIndex::new(Arc::new(MemoryFilesystem::new()), PathBuf::from("/mem/nope"));
        index.load(|_| true).await.unwrap();
        assert!(index.is_empty());
    }
}
