//! Core traits for cache operations

mod data_protection;
mod filesystem;
mod metrics;
mod serializer;

pub use data_protection::{AesGcmProtector, DataProtection, ProtectionScope};
pub use filesystem::{DefaultDirectoryKind, FilesystemProvider, MemoryFilesystem, TokioFilesystem};
pub use metrics::{CacheMetrics, CacheOperation, CacheTier, EvictionReason, NoopMetrics};
pub use serializer::{JsonSerializer, Serializer};

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "bincode")]
pub use serializer::BincodeSerializer;

#[cfg(feature = "tracing")]
mod tracing;
#[cfg(feature = "tracing")]
pub use tracing::TracingMetrics;
