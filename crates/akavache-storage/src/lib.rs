//! akavache-storage: the index and blob storage layer for akavache-rs

mod blob_store;
mod encryption;
mod index;

pub use blob_store::{digest_of, BlobStore, DiskBlobStore, MemoryBlobStore};
pub use encryption::EncryptionFilter;
pub use index::CacheIndex;
