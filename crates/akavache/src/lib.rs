//! akavache: an asynchronous, persistent, per-application key/value blob
//! cache with per-entry expiration, optional at-rest encryption, and a
//! typed-object layer.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use akavache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> akavache_core::Result<()> {
//!     let cache = BlobCacheBuilder::new(BlobCacheConfig::new("MyApp")).build().await?;
//!
//!     cache.local_machine().insert("greeting", b"hello".to_vec(), ExpiresAt::Never).await?;
//!     let bytes = cache.local_machine().get("greeting").await?;
//!     assert_eq!(bytes, b"hello");
//!
//!     cache.dispose_all().await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod coalescer;
mod engine;
mod ordered_executor;
mod shutdown;
mod state;
mod typed;

pub use builder::{BlobCache, BlobCacheBuilder, BlobCacheConfig};
pub use coalescer::RequestCoalescer;
pub use engine::{BlobCacheEngine, VacuumReport};
pub use ordered_executor::OrderedExecutor;
pub use shutdown::ShutdownCoordinator;
pub use state::CacheState;
pub use typed::TypedObjectLayer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{BlobCache, BlobCacheBuilder, BlobCacheConfig, BlobCacheEngine, TypedObjectLayer, VacuumReport};
    pub use akavache_core::{
        CacheError, Clock, ExpiresAt, ForcedDateTimeKind, JsonSerializer, Result, Serializer, StoreKind, SystemClock,
        TestClock,
    };

    #[cfg(feature = "msgpack")]
    pub use akavache_core::MsgPackSerializer;

    #[cfg(feature = "bincode")]
    pub use akavache_core::BincodeSerializer;
}
