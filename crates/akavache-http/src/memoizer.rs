//! Memoizes HTTP downloads through a [`BlobCacheEngine`]: a repeat request
//! for the same URL is served from cache until it expires, and concurrent
//! requests for a URL that isn't cached yet are coalesced into one fetch.

use std::time::Duration;

use akavache::{BlobCacheConfig, BlobCacheEngine, RequestCoalescer};
use akavache_core::{CacheError, ExpiresAt, Result};
use reqwest::{Client, Method};

/// Per-call overrides for [`HttpMemoizer::download_url`].
pub struct DownloadOptions {
    /// Cache key to store the response under. Defaults to the URL itself.
    pub key: Option<String>,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// Bypass the cache and always issue the HTTP request, overwriting
    /// whatever is cached for this key with the new response.
    pub fetch_always: bool,
    pub expires_at: ExpiresAt,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            key: None,
            method: Method::GET,
            headers: Vec::new(),
            fetch_always: false,
            expires_at: ExpiresAt::Never,
        }
    }
}

/// Downloads and memoizes HTTP responses in a [`BlobCacheEngine`].
///
/// Retries apply only to transport failures (connection refused, timeout,
/// DNS) — a non-success HTTP status is returned to the caller immediately,
/// without retrying and without touching the cache.
pub struct HttpMemoizer {
    client: Client,
    coalescer: RequestCoalescer<Vec<u8>>,
    timeout: Duration,
    retries: u32,
}

impl HttpMemoizer {
    pub fn new(client: Client, timeout: Duration, retries: u32) -> Self {
        Self { client, coalescer: RequestCoalescer::new(), timeout, retries }
    }

    /// Build a memoizer from a [`BlobCacheConfig`]'s `http_timeout`/`http_retries`,
    /// so a `BlobCache` built with custom HTTP tuning carries it through to
    /// its downloads instead of leaving those fields unused.
    pub fn from_config(client: Client, config: &BlobCacheConfig) -> Self {
        Self::new(client, config.http_timeout, config.http_retries)
    }

    pub async fn download_url(&self, cache: &BlobCacheEngine, url: &str, options: DownloadOptions) -> Result<Vec<u8>> {
        let key = options.key.clone().unwrap_or_else(|| url.to_string());

        if !options.fetch_always {
            match cache.get(&key).await {
                Ok(bytes) => return Ok(bytes),
                Err(CacheError::NotFound(_)) => {}
                Err(other) => return Err(other),
            }
        }

        let client = self.client.clone();
        let method = options.method.clone();
        let headers = options.headers.clone();
        let url = url.to_string();
        let timeout = self.timeout;
        let retries = self.retries;

        let bytes = self
            .coalescer
            .coalesce(&key, move || fetch_with_retry(client, method, url, headers, timeout, retries))
            .await?;

        cache.insert(&key, bytes.clone(), options.expires_at).await?;
        Ok(bytes)
    }
}

async fn fetch_with_retry(
    client: Client,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    retries: u32,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        let mut request = client.request(method.clone(), &url).timeout(timeout);
        for (name, value) in &headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    return Err(CacheError::Http(format!("{} returned status {}", url, response.status())));
                }
                return response
                    .bytes()
                    .await
                    .map(|b| b.to_vec())
                    .map_err(|e| CacheError::Http(format!("{}: {}", url, e)));
            }
            Err(e) => {
                if attempt >= retries {
                    return Err(CacheError::Http(format!("{} failed after {} attempts: {}", url, attempt + 1, e)));
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akavache_core::{MemoryFilesystem, SystemClock};
    use akavache_storage::MemoryBlobStore;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn memoizer() -> HttpMemoizer {
        HttpMemoizer::new(Client::new(), Duration::from_secs(5), 3)
    }

    #[test]
    fn test_from_config_carries_timeout_and_retries() {
        let config = BlobCacheConfig::new("AppA").http_timeout(Duration::from_secs(7)).http_retries(5);
        let memoizer = HttpMemoizer::from_config(Client::new(), &config);
        assert_eq!(memoizer.timeout, Duration::from_secs(7));
        assert_eq!(memoizer.retries, 5);
    }

    fn engine() -> BlobCacheEngine {
        BlobCacheEngine::new(
            Arc::new(MemoryFilesystem::new()),
            PathBuf::from("/mem/http/index.bin"),
            Arc::new(MemoryBlobStore::new()),
            None,
            Arc::new(SystemClock),
            Duration::from_millis(10),
        )
    }

    /// Starts a minimal HTTP/1.1 server on `127.0.0.1:0` that counts the
    /// requests it serves and always answers with `body` and `status`.
    async fn spawn_server(status: &'static str, body: &'static [u8]) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                hits_clone.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/", addr), hits)
    }

    #[tokio::test]
    async fn test_download_caches_then_serves_from_cache() {
        let (url, hits) = spawn_server("200 OK", b"hello").await;
        let memoizer = memoizer();
        let cache = engine();

        let first = memoizer.download_url(&cache, &url, DownloadOptions::default()).await.unwrap();
        let second = memoizer.download_url(&cache, &url, DownloadOptions::default()).await.unwrap();

        assert_eq!(first, b"hello".to_vec());
        assert_eq!(second, b"hello".to_vec());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_downloads_of_same_url_coalesce_into_one_request() {
        let (url, hits) = spawn_server("200 OK", b"concurrent").await;
        let memoizer = Arc::new(memoizer());
        let cache = Arc::new(engine());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let memoizer = memoizer.clone();
            let cache = cache.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                memoizer.download_url(&cache, &url, DownloadOptions::default()).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"concurrent".to_vec());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_always_bypasses_cache_and_does_not_retry_on_error_status() {
        let (url, hits) = spawn_server("500 Internal Server Error", b"").await;
        let memoizer = memoizer();
        let cache = engine();

        let result = memoizer
            .download_url(&cache, &url, DownloadOptions { fetch_always: true, ..Default::default() })
            .await;

        assert!(matches!(result, Err(CacheError::Http(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(matches!(cache.get(&url).await, Err(CacheError::NotFound(_))));
    }
}
