//! akavache-core: core traits and types for the akavache-rs library
//!
//! This crate provides the foundational types and collaborator traits used
//! throughout the akavache-rs ecosystem: the error type, the pluggable
//! serializer, the injectable clock, and the filesystem/data-protection
//! collaborators that `akavache-storage` and `akavache` build on.

mod clock;
mod error;
mod store_kind;
mod traits;
mod types;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::{CacheError, Result};
pub use store_kind::{ForcedDateTimeKind, StoreKind};
pub use traits::*;
pub use types::*;
