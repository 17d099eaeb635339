//! Disk-backed cache for raw upstream response bodies.
//!
//! Entries are keyed by [`CacheKey`] and stored one file per key. The cache
//! reports an entry's age but never decides freshness; callers compare the
//! age against their own threshold.

mod disk;
mod error;
mod key;

pub use disk::{CacheEntry, DiskCache};
pub use error::CacheError;
pub use key::CacheKey;

pub type Result<T> = std::result::Result<T, CacheError>;
