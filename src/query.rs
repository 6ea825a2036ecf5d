//! Cache-first onboarding query with stale tracking.
//!
//! State lives behind `Arc<Mutex<..>>` because a fetch may outlive the
//! consumer that started it. Each fetch captures a generation number;
//! results are applied only if the query is still mounted and no newer
//! fetch or `unmount` happened in between.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::OnboardingCache;
use crate::client::{OnboardingClient, validate_app_id};
use crate::error::OnboardingError;
use crate::onboarding::model::OnboardingConfig;

/// Source of onboarding documents for [`OnboardingQuery`].
#[async_trait]
pub trait OnboardingFetcher: Send + Sync {
    async fn fetch(&self, app_id: &str) -> Result<OnboardingConfig, OnboardingError>;
}

#[async_trait]
impl OnboardingFetcher for OnboardingClient {
    async fn fetch(&self, app_id: &str) -> Result<OnboardingConfig, OnboardingError> {
        self.get_onboarding_data(app_id).await.into_result()
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub enabled: bool,
    pub refetch_on_mount: bool,
    /// Accepted for API parity. Staleness follows the cache entry's own
    /// expiry, which `cache_time` sets.
    pub stale_time: Duration,
    /// Lifetime of the cache entry written after a successful fetch.
    pub cache_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            refetch_on_mount: true,
            stale_time: Duration::from_secs(5 * 60),
            cache_time: Duration::from_secs(10 * 60),
        }
    }
}

/// Snapshot handed to consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub data: Option<OnboardingConfig>,
    pub loading: bool,
    pub error: Option<OnboardingError>,
    pub is_stale: bool,
}

#[derive(Default)]
struct Shared {
    state: QueryState,
    generation: u64,
    mounted: bool,
}

#[derive(Clone)]
pub struct OnboardingQuery {
    app_id: String,
    options: QueryOptions,
    fetcher: Arc<dyn OnboardingFetcher>,
    cache: Arc<OnboardingCache>,
    shared: Arc<Mutex<Shared>>,
}

impl OnboardingQuery {
    pub fn new(
        app_id: impl Into<String>,
        options: QueryOptions,
        fetcher: Arc<dyn OnboardingFetcher>,
        cache: Arc<OnboardingCache>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            options,
            fetcher,
            cache,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn state(&self) -> QueryState {
        self.lock().state.clone()
    }

    /// Serve a live cache entry when refetching on mount is off, otherwise
    /// fetch. Disabled queries and empty app ids do nothing.
    pub async fn mount(&self) {
        self.lock().mounted = true;
        if !self.is_active() {
            return;
        }

        if !self.options.refetch_on_mount
            && let Some(data) = self.cache.get(&self.app_id)
        {
            let is_stale = self.cache.is_stale(&self.app_id);
            tracing::debug!(app_id = %self.app_id, is_stale, "Serving onboarding data from cache");
            let mut shared = self.lock();
            shared.state.data = Some(data);
            shared.state.error = None;
            shared.state.is_stale = is_stale;
            return;
        }

        self.fetch().await;
    }

    /// Fetch regardless of cache state. Does nothing while unmounted.
    pub async fn refetch(&self) {
        if !self.lock().mounted {
            tracing::debug!(app_id = %self.app_id, "Refetch ignored while unmounted");
            return;
        }
        self.fetch().await;
    }

    /// Detach the consumer. In-flight fetches complete but their results
    /// are dropped.
    pub fn unmount(&self) {
        let mut shared = self.lock();
        shared.mounted = false;
        shared.generation += 1;
        shared.state.loading = false;
    }

    fn is_active(&self) -> bool {
        self.options.enabled && validate_app_id(&self.app_id).is_ok()
    }

    async fn fetch(&self) {
        if !self.is_active() {
            return;
        }

        let generation = {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.state.loading = true;
            shared.state.error = None;
            shared.generation
        };

        let result = self.fetcher.fetch(&self.app_id).await;

        let mut shared = self.lock();
        if shared.generation != generation {
            tracing::debug!(app_id = %self.app_id, "Discarding superseded onboarding fetch");
            return;
        }
        if !shared.mounted {
            shared.state.loading = false;
            return;
        }
        match result {
            Ok(data) => {
                self.cache
                    .set(&self.app_id, data.clone(), Some(self.options.cache_time));
                shared.state.data = Some(data);
                shared.state.error = None;
                shared.state.is_stale = false;
            }
            Err(e) => {
                tracing::warn!(app_id = %self.app_id, code = %e.code, error = %e.message, "Onboarding query failed");
                shared.state.error = Some(e);
                shared.state.data = None;
            }
        }
        shared.state.loading = false;
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}
