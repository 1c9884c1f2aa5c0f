//! Flushes every store in a [`crate::BlobCache`], then leaves them disposed
//! so further operations are rejected.

use std::sync::Arc;

use akavache_core::Result;

use crate::engine::BlobCacheEngine;

/// Drives `dispose()` across a set of stores. Used once, at shutdown: a
/// failure on one store does not stop the others from flushing, but the
/// first error encountered is the one returned to the caller.
pub struct ShutdownCoordinator<'a> {
    stores: Vec<&'a Arc<BlobCacheEngine>>,
}

impl<'a> ShutdownCoordinator<'a> {
    pub fn new(stores: impl IntoIterator<Item = &'a Arc<BlobCacheEngine>>) -> Self {
        Self { stores: stores.into_iter().collect() }
    }

    pub async fn shutdown(self) -> Result<()> {
        let mut first_err = None;
        for store in self.stores {
            if let Err(e) = store.dispose().await {
                tracing::warn!(error = %e, "store failed to flush during shutdown");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akavache_core::{CacheError, ExpiresAt, MemoryFilesystem, TestClock};
    use akavache_storage::MemoryBlobStore;
    use std::path::PathBuf;
    use std::time::Duration;

    fn engine(path: &str) -> Arc<BlobCacheEngine> {
        Arc::new(BlobCacheEngine::new(
            Arc::new(MemoryFilesystem::new()),
            PathBuf::from(path),
            Arc::new(MemoryBlobStore::new()),
            None,
            Arc::new(TestClock::default()),
            Duration::from_millis(10),
        ))
    }

    #[tokio::test]
    async fn test_shutdown_disposes_every_store() {
        let a = engine("/mem/a/index.bin");
        let b = engine("/mem/b/index.bin");
        a.insert("k", b"v".to_vec(), ExpiresAt::Never).await.unwrap();

        ShutdownCoordinator::new([&a, &b]).shutdown().await.unwrap();

        assert!(matches!(a.get("k").await, Err(CacheError::Disposed)));
        assert!(matches!(b.insert("k2", b"v".to_vec(), ExpiresAt::Never).await, Err(CacheError::Disposed)));
    }
}
