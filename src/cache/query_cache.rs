//! In-memory, time-boxed cache used by [`crate::query::OnboardingQuery`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::onboarding::model::OnboardingConfig;

use super::clock::{Clock, SystemClock, expiry_after};

/// Default lifetime of an entry when the caller gives none.
pub const DEFAULT_QUERY_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: OnboardingConfig,
    pub expiry: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

pub struct OnboardingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl OnboardingCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl: DEFAULT_QUERY_CACHE_TIME,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn set(&self, key: &str, data: OnboardingConfig, ttl: Option<Duration>) {
        let now = self.clock.now();
        let entry = CacheEntry {
            data,
            expiry: expiry_after(now, ttl.unwrap_or(self.default_ttl)),
            stored_at: now,
        };
        self.lock().insert(key.to_string(), entry);
    }

    /// Live entry for `key`; an expired entry is evicted and `None` returned.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = now > entries.get(key)?.expiry;
        if expired {
            entries.remove(key);
            tracing::debug!(key = %key, "Query cache entry expired");
            return None;
        }
        entries.get(key).cloned()
    }

    pub fn get(&self, key: &str) -> Option<OnboardingConfig> {
        self.entry(key).map(|entry| entry.data)
    }

    /// Missing and expired entries are stale.
    pub fn is_stale(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock().get(key).is_none_or(|entry| now > entry.expiry)
    }

    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for OnboardingCache {
    fn default() -> Self {
        Self::new()
    }
}
