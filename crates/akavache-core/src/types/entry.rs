//! Cache entry and its metadata

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Metadata the `CacheIndex` holds about a live key.
///
/// The payload itself is never stored here -- it lives in the `BlobStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    /// When the entry was accepted by the store's clock
    pub created_at: SystemTime,
    /// Absolute expiration; `None` means "never"
    pub expires_at: Option<SystemTime>,
    /// Fully-qualified type tag written by the typed layer; `None` for raw inserts
    pub type_tag: Option<String>,
}

impl CacheEntryMeta {
    /// Create metadata for a fresh insert
    pub fn new(created_at: SystemTime, expires_at: Option<SystemTime>, type_tag: Option<String>) -> Self {
        Self {
            created_at,
            expires_at,
            type_tag,
        }
    }

    /// Check expiration against the given `now`
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

/// A complete cache entry: metadata plus the payload bytes.
///
/// Returned from reads; owned by the caller on the way out (a defensive
/// copy of whatever the `BlobStore` handed back).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub meta: CacheEntryMeta,
    pub payload: Vec<u8>,
}

impl CacheEntry {
    pub fn new(meta: CacheEntryMeta, payload: Vec<u8>) -> Self {
        Self { meta, payload }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.meta.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_never_expires_without_expires_at() {
        let meta = CacheEntryMeta::new(SystemTime::now(), None, None);
        assert!(!meta.is_expired_at(SystemTime::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_expires_at_boundary() {
        let created = SystemTime::now();
        let expires = created + Duration::from_millis(10);
        let meta = CacheEntryMeta::new(created, Some(expires), None);

        assert!(!meta.is_expired_at(created));
        assert!(meta.is_expired_at(expires));
        assert!(meta.is_expired_at(expires + Duration::from_millis(1)));
    }
}
