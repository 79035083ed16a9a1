//! Response caching for list and detail reads.

pub mod backend;
pub mod keys;

pub use backend::{CacheBackend, CachedEntry};
pub use keys::{CacheKey, DETAIL_TTL, LIST_TTL};
