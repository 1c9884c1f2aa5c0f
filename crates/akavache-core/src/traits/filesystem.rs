//! The filesystem collaborator: open/read/write/delete/mkdir, default directory discovery.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{CacheError, Result};

/// Which well-known default directory to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultDirectoryKind {
    /// Local-only, per-machine application directory
    LocalMachine,
    /// Roaming, per-user application directory
    Roaming,
    /// Roaming per-user directory, "SecretCache" subfolder
    Secret,
}

/// Capability set a cache store needs from the filesystem.
///
/// Kept as a trait (not hardwired to `tokio::fs`) so tests can substitute an
/// in-memory provider and so the default directory convention stays pluggable.
#[async_trait]
pub trait FilesystemProvider: Send + Sync + 'static {
    /// Read the whole file into memory.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate, then write the full contents.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Remove a file or directory tree. Missing path is not an error.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Check whether a path exists (cheap stat, used by index recovery).
    async fn exists(&self, path: &Path) -> bool;

    /// List the file names directly inside `dir` (used by vacuum to find orphans).
    async fn list(&self, dir: &Path) -> Result<Vec<String>>;

    /// Resolve the default directory for `application_name` under `kind`.
    fn default_directory(&self, application_name: &str, kind: DefaultDirectoryKind) -> Result<PathBuf>;
}

/// Default filesystem provider, backed by `tokio::fs` and the `directories` crate.
#[derive(Debug, Clone, Default)]
pub struct TokioFilesystem;

#[async_trait]
impl FilesystemProvider for TokioFilesystem {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| CacheError::Io(format!("read {}: {e}", path.display())))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| CacheError::Io(format!("write {}: {e}", path.display())))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(format!("delete {}: {e}", path.display()))),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| CacheError::Io(format!("mkdir {}: {e}", path.display())))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Io(format!("readdir {}: {e}", dir.display()))),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(CacheError::Io(format!("readdir {}: {e}", dir.display()))),
            }
        }
        Ok(names)
    }

    fn default_directory(&self, application_name: &str, kind: DefaultDirectoryKind) -> Result<PathBuf> {
        let project = directories::ProjectDirs::from("com", application_name, application_name)
            .ok_or_else(|| CacheError::Io("could not determine home directory".to_string()))?;

        let base = match kind {
            DefaultDirectoryKind::LocalMachine => project.cache_dir().to_path_buf(),
            DefaultDirectoryKind::Roaming => project.data_dir().to_path_buf(),
            DefaultDirectoryKind::Secret => project.data_dir().join("SecretCache"),
        };
        Ok(base)
    }
}

/// In-memory filesystem used by the Test/Mock store kind and by unit tests
/// that need deterministic filesystem behavior without touching disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    files: Arc<DashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilesystemProvider for MemoryFilesystem {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|v| v.clone())
            .ok_or_else(|| CacheError::Io(format!("no such file: {}", path.display())))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    async fn list(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(self
            .files
            .iter()
            .filter_map(|entry| {
                let path = entry.key();
                if path.parent() == Some(dir) {
                    path.file_name()?.to_str().map(String::from)
                } else {
                    None
                }
            })
            .collect())
    }

    fn default_directory(&self, application_name: &str, kind: DefaultDirectoryKind) -> Result<PathBuf> {
        let suffix = match kind {
            DefaultDirectoryKind::LocalMachine => "local",
            DefaultDirectoryKind::Roaming => "roaming",
            DefaultDirectoryKind::Secret => "roaming/SecretCache",
        };
        Ok(PathBuf::from(format!("/mem/{application_name}/{suffix}")))
    }
}
