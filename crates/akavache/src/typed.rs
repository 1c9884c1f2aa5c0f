//! Serializer-driven object<->bytes layer on top of `BlobCacheEngine`.
//!
//! Rewrites the caller's key to `"{fully-qualified-type-name}___{key}"` so
//! keys of different types never collide and `get_all_objects::<T>` can
//! enumerate by type tag without touching the payload.

use std::sync::Arc;
use std::time::SystemTime;

use akavache_core::{ExpiresAt, ForcedDateTimeKind, Result, Serializer};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::BlobCacheEngine;

/// Wraps a [`BlobCacheEngine`] with a [`Serializer`] to store and retrieve
/// typed objects instead of raw bytes.
pub struct TypedObjectLayer<S: Serializer> {
    engine: Arc<BlobCacheEngine>,
    serializer: S,
}

impl<S: Serializer> TypedObjectLayer<S> {
    pub fn new(engine: Arc<BlobCacheEngine>, serializer: S) -> Self {
        Self { engine, serializer }
    }

    /// Forward a `ForcedDateTimeKind` setting to the serializer. The core
    /// never interprets `DateTime` values itself.
    pub fn set_forced_date_time_kind(&mut self, kind: ForcedDateTimeKind) {
        self.serializer.set_forced_date_time_kind(kind);
    }

    fn type_tag<T: 'static>() -> String {
        std::any::type_name::<T>().to_string()
    }

    fn tagged_key<T: 'static>(key: &str) -> String {
        format!("{}___{}", Self::type_tag::<T>(), key)
    }

    pub async fn insert_object<T: Serialize + 'static>(
        &self,
        key: &str,
        value: &T,
        expires_at: ExpiresAt,
    ) -> Result<()> {
        let bytes = self.serializer.serialize(value)?;
        self.engine
            .insert_with_tag(&Self::tagged_key::<T>(key), bytes, expires_at, Some(Self::type_tag::<T>()))
            .await
    }

    /// Bulk variant: completes only once every pair has been accepted.
    pub async fn insert_objects<T: Serialize + 'static>(
        &self,
        pairs: Vec<(String, T)>,
        expires_at: ExpiresAt,
    ) -> Result<()> {
        for (key, value) in pairs {
            self.insert_object(&key, &value, expires_at).await?;
        }
        Ok(())
    }

    pub async fn get_object<T: DeserializeOwned + 'static>(&self, key: &str) -> Result<T> {
        let bytes = self.engine.get(&Self::tagged_key::<T>(key)).await?;
        self.serializer.deserialize(&bytes)
    }

    pub async fn get_object_created_at<T: 'static>(&self, key: &str) -> Result<Option<SystemTime>> {
        self.engine.get_created_at(&Self::tagged_key::<T>(key)).await
    }

    /// Enumerate every live, unexpired key of type `T`, skipping (not
    /// aborting on) individual deserialization failures.
    pub async fn get_all_objects<T: DeserializeOwned + 'static>(&self) -> Result<Vec<T>> {
        let keys = self.engine.get_all_keys_with_tag(&Self::type_tag::<T>()).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let Ok(bytes) = self.engine.get(&key).await else {
                continue;
            };
            if let Ok(value) = self.serializer.deserialize(&bytes) {
                out.push(value);
            }
        }
        Ok(out)
    }

    pub async fn invalidate_object<T: 'static>(&self, key: &str) -> Result<()> {
        self.engine.invalidate(&Self::tagged_key::<T>(key)).await
    }

    pub async fn invalidate_all_objects<T: 'static>(&self) -> Result<()> {
        self.engine.invalidate_all_by_tag(&Self::type_tag::<T>()).await
    }

    pub async fn update_object_expiration<T: 'static>(&self, key: &str, expires_at: ExpiresAt) -> Result<()> {
        self.engine.update_expiration(&Self::tagged_key::<T>(key), expires_at).await
    }
}
