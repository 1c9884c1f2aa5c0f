//! [`BlobCacheConfig`] / [`BlobCacheBuilder`]: assembles the four logical
//! stores (`UserAccount`, `LocalMachine`, `Secure`, `InMemory`) that make up
//! one [`BlobCache`], wiring default directories, the `EncryptionFilter` for
//! the secure store, and a shared clock/metrics collaborator across all of
//! them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use akavache_core::{
    AesGcmProtector, CacheError, CacheMetrics, Clock, DataProtection, DefaultDirectoryKind,
    FilesystemProvider, ForcedDateTimeKind, MemoryFilesystem, NoopMetrics, Result, StoreKind,
    SystemClock, TokioFilesystem,
};
use akavache_storage::{BlobStore, DiskBlobStore, EncryptionFilter, MemoryBlobStore};

use crate::engine::BlobCacheEngine;
use crate::shutdown::ShutdownCoordinator;

/// Configuration surface shared by every store in a [`BlobCache`] (spec.md
/// §6): application name (feeds default directory names), an optional
/// absolute directory override, the `ForcedDateTimeKind` forwarded to the
/// typed layer's serializer, and the index/HTTP tuning knobs.
#[derive(Debug, Clone)]
pub struct BlobCacheConfig {
    pub application_name: String,
    pub cache_directory: Option<PathBuf>,
    pub forced_date_time_kind: ForcedDateTimeKind,
    pub index_flush_debounce: Duration,
    pub http_timeout: Duration,
    pub http_retries: u32,
}

impl BlobCacheConfig {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            cache_directory: None,
            forced_date_time_kind: ForcedDateTimeKind::Unspecified,
            index_flush_debounce: Duration::from_secs(2),
            http_timeout: Duration::from_secs(15),
            http_retries: 3,
        }
    }

    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(path.into());
        self
    }

    pub fn forced_date_time_kind(mut self, kind: ForcedDateTimeKind) -> Self {
        self.forced_date_time_kind = kind;
        self
    }

    pub fn index_flush_debounce(mut self, debounce: Duration) -> Self {
        self.index_flush_debounce = debounce;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn http_retries(mut self, retries: u32) -> Self {
        self.http_retries = retries;
        self
    }
}

/// Builds a [`BlobCache`]: the four stores, each an independent
/// `BlobCacheEngine`, sharing the same filesystem/clock/metrics
/// collaborators but differing in directory, encryption, and the
/// `CacheIndex`/`BlobStore` pair that backs them.
pub struct BlobCacheBuilder {
    config: BlobCacheConfig,
    fs: Arc<dyn FilesystemProvider>,
    clock: Arc<dyn Clock>,
    data_protection: Option<Arc<dyn DataProtection>>,
    metrics: Arc<dyn CacheMetrics>,
}

impl BlobCacheBuilder {
    pub fn new(config: BlobCacheConfig) -> Self {
        Self {
            config,
            fs: Arc::new(TokioFilesystem),
            clock: Arc::new(SystemClock),
            data_protection: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn filesystem(mut self, fs: Arc<dyn FilesystemProvider>) -> Self {
        self.fs = fs;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the `DataProtection` collaborator used by the Secure store.
    /// When unset, a key is generated on first use and persisted alongside
    /// the Secure store's other files.
    pub fn data_protection(mut self, data_protection: Arc<dyn DataProtection>) -> Self {
        self.data_protection = Some(data_protection);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Assemble all four stores. The Secure store's protection key is
    /// resolved (loaded or generated) here, before any engine exists, since
    /// `EncryptionFilter` is fixed at construction rather than lazily
    /// initialized like the index.
    pub async fn build(self) -> Result<BlobCache> {
        let user_account = self.build_store(StoreKind::UserAccount).await?;
        let local_machine = self.build_store(StoreKind::LocalMachine).await?;
        let secure = self.build_store(StoreKind::Secure).await?;
        let in_memory = self.build_store(StoreKind::InMemory).await?;

        Ok(BlobCache {
            user_account: Arc::new(user_account),
            local_machine: Arc::new(local_machine),
            secure: Arc::new(secure),
            in_memory: Arc::new(in_memory),
        })
    }

    /// Fully in-memory variant (spec.md §2 "Test/Mock"): every store backed
    /// by a `MemoryFilesystem`/`MemoryBlobStore` so tests get deterministic,
    /// disk-free behavior without special-casing `StoreKind`.
    pub fn build_in_memory_for_tests(application_name: impl Into<String>, clock: Arc<dyn Clock>) -> BlobCache {
        let config = BlobCacheConfig::new(application_name);
        let fs = Arc::new(MemoryFilesystem::new());
        let protector: Arc<dyn DataProtection> =
            Arc::new(AesGcmProtector::from_key_bytes(&AesGcmProtector::generate_key()));

        let make = |kind: StoreKind| {
            let base_dir = fs.default_directory(&config.application_name, directory_kind(kind)).unwrap();
            let index_path = base_dir.join("index.bin");
            let blob_store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
            let encryption = kind.is_encrypted().then(|| EncryptionFilter::new(protector.clone()));

            Arc::new(
                BlobCacheEngine::new(fs.clone(), index_path, blob_store, encryption, clock.clone(), config.index_flush_debounce),
            )
        };

        BlobCache {
            user_account: make(StoreKind::UserAccount),
            local_machine: make(StoreKind::LocalMachine),
            secure: make(StoreKind::Secure),
            in_memory: make(StoreKind::InMemory),
        }
    }

    async fn build_store(&self, kind: StoreKind) -> Result<BlobCacheEngine> {
        if kind == StoreKind::InMemory {
            let index_path = PathBuf::from(format!("/{}/in_memory/index.bin", self.config.application_name));
            let fs: Arc<dyn FilesystemProvider> = Arc::new(MemoryFilesystem::new());
            let blob_store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
            return Ok(BlobCacheEngine::new(
                fs,
                index_path,
                blob_store,
                None,
                self.clock.clone(),
                self.config.index_flush_debounce,
            )
            .with_metrics(self.metrics.clone()));
        }

        let base_dir = self.resolve_base_dir(kind)?;
        let blob_store: Arc<dyn BlobStore> = Arc::new(DiskBlobStore::new(self.fs.clone(), base_dir.join("blobs")));
        let index_path = base_dir.join("index.bin");

        let encryption = if kind.is_encrypted() {
            let protector = match &self.data_protection {
                Some(p) => p.clone(),
                None => Arc::new(AesGcmProtector::from_key_bytes(&self.load_or_create_key(&base_dir).await?)),
            };
            Some(EncryptionFilter::new(protector))
        } else {
            None
        };

        Ok(BlobCacheEngine::new(
            self.fs.clone(),
            index_path,
            blob_store,
            encryption,
            self.clock.clone(),
            self.config.index_flush_debounce,
        )
        .with_metrics(self.metrics.clone()))
    }

    fn resolve_base_dir(&self, kind: StoreKind) -> Result<PathBuf> {
        if let Some(dir) = &self.config.cache_directory {
            return Ok(match kind {
                StoreKind::Secure => dir.join("SecretCache"),
                _ => dir.join(kind.as_str()),
            });
        }
        self.fs.default_directory(&self.config.application_name, directory_kind(kind))
    }

    async fn load_or_create_key(&self, secure_dir: &Path) -> Result<[u8; 32]> {
        let key_path = secure_dir.join("protection.key");
        if self.fs.exists(&key_path).await {
            let bytes = self.fs.read(&key_path).await?;
            return <[u8; 32]>::try_from(bytes.as_slice())
                .map_err(|_| CacheError::Encryption("corrupt protection key file".to_string()));
        }

        self.fs.create_dir_all(secure_dir).await?;
        let key = AesGcmProtector::generate_key();
        self.fs.write(&key_path, &key).await?;
        Ok(key)
    }
}

fn directory_kind(kind: StoreKind) -> DefaultDirectoryKind {
    match kind {
        StoreKind::LocalMachine => DefaultDirectoryKind::LocalMachine,
        StoreKind::UserAccount => DefaultDirectoryKind::Roaming,
        StoreKind::Secure => DefaultDirectoryKind::Secret,
        StoreKind::InMemory => DefaultDirectoryKind::LocalMachine,
    }
}

/// The four logical stores for one application, built by [`BlobCacheBuilder`].
pub struct BlobCache {
    user_account: Arc<BlobCacheEngine>,
    local_machine: Arc<BlobCacheEngine>,
    secure: Arc<BlobCacheEngine>,
    in_memory: Arc<BlobCacheEngine>,
}

impl BlobCache {
    pub fn user_account(&self) -> &Arc<BlobCacheEngine> {
        &self.user_account
    }

    pub fn local_machine(&self) -> &Arc<BlobCacheEngine> {
        &self.local_machine
    }

    pub fn secure(&self) -> &Arc<BlobCacheEngine> {
        &self.secure
    }

    pub fn in_memory(&self) -> &Arc<BlobCacheEngine> {
        &self.in_memory
    }

    pub fn store(&self, kind: StoreKind) -> &Arc<BlobCacheEngine> {
        match kind {
            StoreKind::UserAccount => &self.user_account,
            StoreKind::LocalMachine => &self.local_machine,
            StoreKind::Secure => &self.secure,
            StoreKind::InMemory => &self.in_memory,
        }
    }

    /// Flush every store, then leave all four disposed so further operations
    /// are rejected (spec.md §4.9's `ShutdownCoordinator`).
    pub async fn dispose_all(&self) -> Result<()> {
        ShutdownCoordinator::new([&self.user_account, &self.local_machine, &self.secure, &self.in_memory])
            .shutdown()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akavache_core::{CacheError, ExpiresAt, TestClock};

    #[tokio::test]
    async fn test_in_memory_build_wires_all_four_stores() {
        let cache = BlobCacheBuilder::build_in_memory_for_tests("TestApp", Arc::new(TestClock::default()));

        cache.user_account().insert("k", b"ua".to_vec(), ExpiresAt::Never).await.unwrap();
        cache.local_machine().insert("k", b"lm".to_vec(), ExpiresAt::Never).await.unwrap();
        cache.secure().insert("k", b"se".to_vec(), ExpiresAt::Never).await.unwrap();
        cache.in_memory().insert("k", b"im".to_vec(), ExpiresAt::Never).await.unwrap();

        assert_eq!(cache.user_account().get("k").await.unwrap(), b"ua".to_vec());
        assert_eq!(cache.local_machine().get("k").await.unwrap(), b"lm".to_vec());
        assert_eq!(cache.secure().get("k").await.unwrap(), b"se".to_vec());
        assert_eq!(cache.in_memory().get("k").await.unwrap(), b"im".to_vec());
    }

    #[tokio::test]
    async fn test_store_accessor_matches_named_accessors() {
        let cache = BlobCacheBuilder::build_in_memory_for_tests("TestApp", Arc::new(TestClock::default()));
        assert!(Arc::ptr_eq(cache.store(StoreKind::Secure), cache.secure()));
        assert!(Arc::ptr_eq(cache.store(StoreKind::InMemory), cache.in_memory()));
    }

    #[tokio::test]
    async fn test_dispose_all_disposes_every_store() {
        let cache = BlobCacheBuilder::build_in_memory_for_tests("TestApp", Arc::new(TestClock::default()));
        cache.dispose_all().await.unwrap();

        assert!(matches!(cache.user_account().get("k").await, Err(CacheError::Disposed)));
        assert!(matches!(cache.secure().get("k").await, Err(CacheError::Disposed)));
    }

    #[tokio::test]
    async fn test_disk_build_creates_directory_and_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BlobCacheConfig::new("AppA").cache_directory(tmp.path());

        let first = BlobCacheBuilder::new(config.clone()).build().await.unwrap();
        first.local_machine().insert("greeting", b"hello".to_vec(), ExpiresAt::Never).await.unwrap();
        first.dispose_all().await.unwrap();

        let reopened = BlobCacheBuilder::new(config).build().await.unwrap();
        assert_eq!(reopened.local_machine().get("greeting").await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_secure_store_payload_on_disk_is_not_plaintext() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BlobCacheConfig::new("AppSecure").cache_directory(tmp.path());
        let cache = BlobCacheBuilder::new(config).build().await.unwrap();

        cache.secure().insert("login:default", b"super secret".to_vec(), ExpiresAt::Never).await.unwrap();
        cache.secure().flush().await.unwrap();

        let digest = akavache_storage::digest_of("login:default");
        let payload_path = tmp.path().join("SecretCache").join("blobs").join(&digest[..2]).join(&digest[2..]);
        let on_disk = tokio::fs::read(&payload_path).await.unwrap();
        assert_ne!(on_disk, b"super secret");

        assert_eq!(cache.secure().get("login:default").await.unwrap(), b"super secret".to_vec());
    }
}
