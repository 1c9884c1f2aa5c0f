//! Payload storage: maps a digest of a cache key to its raw bytes on disk or in memory.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

use akavache_core::{FilesystemProvider, Result};

/// Stores the raw payload bytes for a key, addressed by a digest of the key
/// rather than the key itself, so arbitrary key strings never need to survive
/// as filenames.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Read the payload for `key`, or `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write (create or overwrite) the payload for `key`.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the payload for `key`. Missing is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List every digest currently stored, used by vacuum to find orphans
    /// that have no matching index record.
    async fn list_digests(&self) -> Result<Vec<String>>;

    /// Remove a stored payload addressed directly by its digest, used by
    /// vacuum to delete orphaned files whose original key is no longer known.
    async fn delete_digest(&self, digest: &str) -> Result<()>;
}

/// Hex-encode the first 16 bytes (128 bits) of the BLAKE3 digest of `key`.
pub fn digest_of(key: &str) -> String {
    let hash = blake3::hash(key.as_bytes());
    hex_encode(&hash.as_bytes()[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Disk-backed `BlobStore`. Files are named by a two-level directory split of
/// the key's digest (first two hex chars as a subdirectory), matching the
/// content-addressed layout used by file-based caches elsewhere in the
/// ecosystem.
pub struct DiskBlobStore {
    fs: Arc<dyn FilesystemProvider>,
    base_dir: PathBuf,
}

impl DiskBlobStore {
    pub fn new(fs: Arc<dyn FilesystemProvider>, base_dir: PathBuf) -> Self {
        Self { fs, base_dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = digest_of(key);
        self.base_dir.join(&digest[..2]).join(&digest[2..])
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !self.fs.exists(&path).await {
            return Ok(None);
        }
        Ok(Some(self.fs.read(&path).await?))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.fs.write(&self.path_for(key), bytes).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.fs.delete(&self.path_for(key)).await
    }

    async fn list_digests(&self) -> Result<Vec<String>> {
        let mut digests = Vec::new();
        for subdir in self.fs.list(&self.base_dir).await? {
            let subdir_path = self.base_dir.join(&subdir);
            for file_name in self.fs.list(&subdir_path).await? {
                digests.push(format!("{subdir}{file_name}"));
            }
        }
        Ok(digests)
    }

    async fn delete_digest(&self, digest: &str) -> Result<()> {
        self.fs
            .delete(&self.base_dir.join(&digest[..2]).join(&digest[2..]))
            .await
    }
}

/// Process-lifetime `BlobStore` backing the `InMemory` store kind.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&digest_of(key)).map(|v| v.clone()))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.data.insert(digest_of(key), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(&digest_of(key));
        Ok(())
    }

    async fn list_digests(&self) -> Result<Vec<String>> {
        Ok(self.data.iter().map(|e| e.key().clone()).collect())
    }

    async fn delete_digest(&self, digest: &str) -> Result<()> {
        self.data.remove(digest);
        Ok(())
    }
}

impl std::fmt::Debug for DiskBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskBlobStore")
            .field("base_dir", &self.base_dir)
            .finish()
    }
}
