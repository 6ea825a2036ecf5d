//! Caching: key-value store capability, persisted config cache, and the
//! in-memory cache behind `OnboardingQuery`.
//!
//! Caches are plain values constructed once by the host and passed to each
//! consumer; nothing here is a process-wide singleton.

pub mod clock;
pub mod config_cache;
pub mod query_cache;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_cache::{ConfigCache, cache_key};
pub use query_cache::{CacheEntry, OnboardingCache};
pub use store::{FileStore, KeyValueStore, MemoryStore, select_store};
