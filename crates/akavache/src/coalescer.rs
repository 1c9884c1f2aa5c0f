//! Single-flight request coalescing: concurrent callers for the same key
//! share one in-flight fetch instead of issuing it N times.

use akavache_core::{CacheError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coalesces concurrent fetches keyed by an arbitrary string. Used both by
/// `BlobCacheEngine::get` (keyed on the raw or type-tagged cache key) and by
/// `HttpMemoizer::download_url` (keyed on the download's cache key), so a
/// burst of callers for the same key triggers exactly one underlying fetch.
#[derive(Clone, Default)]
pub struct RequestCoalescer<T: Clone + Send + 'static> {
    inflight: Arc<DashMap<String, broadcast::Sender<Result<T>>>>,
}

impl<T: Clone + Send + 'static> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Run `fetch` for `key`, or join an already in-flight fetch for the same
    /// key. Exactly one of the concurrent callers executes `fetch`; the rest
    /// receive its broadcast result.
    pub async fn coalesce<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(o) => Err(o.get().subscribe()),
            Entry::Vacant(v) => {
                let (tx, _rx) = broadcast::channel(1);
                v.insert(tx.clone());
                Ok(tx)
            }
        };

        match role {
            Ok(tx) => {
                let result = fetch().await;
                self.inflight.remove(key);
                if tx.receiver_count() > 0 {
                    let _ = tx.send(result.clone());
                }
                result
            }
            Err(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Internal(
                    "leader of coalesced request was dropped before completing".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_caller_executes_fetch() {
        let coalescer: RequestCoalescer<i32> = RequestCoalescer::new();
        let result = coalescer.coalesce("k", || async { Ok(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let coalescer: RequestCoalescer<i32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .coalesce("shared", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer: RequestCoalescer<i32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let calls = calls.clone();
            coalescer.coalesce("a", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
        };
        let b = {
            let calls = calls.clone();
            coalescer.coalesce("b", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
