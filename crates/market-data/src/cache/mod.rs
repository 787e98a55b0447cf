//! In-memory TTL cache.
//!
//! Expired entries are removed lazily: a lookup that finds an entry at or
//! past its expiry treats it as a miss and drops it. A periodic sweep
//! ([`CacheStore::purge_expired`]) reclaims entries nobody asks for again.
//! Stores may be bounded, in which case the least recently used entry is
//! evicted to make room.

mod stats;
mod store;

pub use stats::CacheStats;
pub use store::CacheStore;
