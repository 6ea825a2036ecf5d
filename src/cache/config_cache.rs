//! Persisted read-through cache for fetched onboarding documents.
//!
//! Each logical entry is two physical keys: `key` holds the serialized
//! config and `key::exp` its RFC 3339 expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::DEFAULT_CACHE_TTL;
use crate::error::CacheError;
use crate::onboarding::model::OnboardingConfig;

use super::clock::{Clock, SystemClock, expiry_after};
use super::store::KeyValueStore;

/// Cache key for a document fetched from `base_url` for `app_id`.
pub fn cache_key(base_url: &str, app_id: &str) -> String {
    format!("{base_url}::{app_id}")
}

fn expiry_key(key: &str) -> String {
    format!("{key}::exp")
}

pub struct ConfigCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached config if present and not expired. Expired or
    /// unreadable entries are removed.
    pub async fn get(&self, key: &str) -> Result<Option<OnboardingConfig>, CacheError> {
        let Some(expiry) = self.expiry(key).await? else {
            return Ok(None);
        };
        if self.clock.now() > expiry {
            tracing::debug!(key = %key, "Config cache entry expired");
            self.remove(key).await?;
            return Ok(None);
        }

        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping unreadable config cache entry");
                self.remove(key).await?;
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, config: &OnboardingConfig) -> Result<(), CacheError> {
        let raw = serde_json::to_string(config)?;
        let expiry = expiry_after(self.clock.now(), self.ttl);
        self.store.set(key, &raw).await?;
        self.store
            .set(&expiry_key(key), &expiry.to_rfc3339())
            .await?;
        tracing::debug!(key = %key, store = self.store.name(), %expiry, "Config cached");
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key).await?;
        self.store.remove(&expiry_key(key)).await
    }

    async fn expiry(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let exp_key = expiry_key(key);
        let Some(raw) = self.store.get(&exp_key).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(expiry) => Ok(Some(expiry.with_timezone(&Utc))),
            Err(_) => {
                self.remove(key).await?;
                Err(CacheError::InvalidExpiry { key: exp_key, value: raw })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryStore};

    fn config() -> OnboardingConfig {
        serde_json::from_value(serde_json::json!({
            "appId": "demo",
            "screens": [{ "id": "s1", "elements": [
                { "id": "t", "type": "text", "props": { "text": "Hello" } }
            ] }]
        }))
        .unwrap()
    }

    fn cache(clock: Arc<ManualClock>) -> (ConfigCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = ConfigCache::new(store.clone())
            .with_clock(clock)
            .with_ttl(Duration::from_secs(60));
        (cache, store)
    }

    #[tokio::test]
    async fn set_then_get_returns_same_config() {
        let clock = Arc::new(ManualClock::default());
        let (cache, _) = cache(clock);
        let key = cache_key("https://api.test", "demo");
        cache.set(&key, &config()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(config()));
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let (cache, store) = cache(clock.clone());
        let key = cache_key("https://api.test", "demo");
        cache.set(&key, &config()).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get(&key).await.unwrap(), Some(config()), "expiry is strict");

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&key).await.unwrap(), None);
        // Lazily evicted on read.
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.get(&expiry_key(&key)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_two_physical_entries() {
        let clock = Arc::new(ManualClock::default());
        let (cache, store) = cache(clock);
        cache.set("k", &config()).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());
        let exp = store.get("k::exp").await.unwrap().unwrap();
        assert!(DateTime::parse_from_rfc3339(&exp).is_ok());
    }

    #[tokio::test]
    async fn corrupt_expiry_is_reported_and_cleared() {
        let clock = Arc::new(ManualClock::default());
        let (cache, store) = cache(clock);
        cache.set("k", &config()).await.unwrap();
        store.set("k::exp", "tomorrow").await.unwrap();

        let err = cache.get("k").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidExpiry { .. }));
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_entry_is_a_miss() {
        let clock = Arc::new(ManualClock::default());
        let (cache, _) = cache(clock);
        assert_eq!(cache.get("nope").await.unwrap(), None);
    }
}
