//! Config loader: fetch the onboarding document for an app, falling back to
//! the bundled default whenever the remote copy is unavailable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::cache::{ConfigCache, cache_key};
use crate::client::{escape_app_id, parse_config, status_error, transport_error, validate_app_id};
use crate::config::SdkConfig;
use crate::error::{ErrorCode, OnboardingError};
use crate::onboarding::model::OnboardingConfig;
use crate::query::OnboardingFetcher;

const BUNDLED_CONFIG: &str = include_str!("../assets/default_config.json");

/// Document id given to the bundled fallback.
pub const FALLBACK_DOCUMENT_ID: &str = "local-fake";

/// Where a loaded config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Remote,
    Cache,
    /// The bundled default, used because the remote fetch failed.
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: OnboardingConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ConfigSource::Fallback { .. })
    }
}

/// Join `app_id` onto `base_url`. Trailing slashes are trimmed and a base
/// that already ends in the app id is left as-is.
pub fn build_url(base_url: &str, app_id: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let encoded = escape_app_id(app_id);
    if trimmed.ends_with(&format!("/{encoded}")) {
        return trimmed.to_string();
    }
    format!("{trimmed}/{encoded}")
}

/// The compiled-in default document, stamped for `app_id`.
pub fn bundled_config(app_id: &str) -> Result<OnboardingConfig, OnboardingError> {
    let mut config: OnboardingConfig = serde_json::from_str(BUNDLED_CONFIG).map_err(|e| {
        OnboardingError::new(ErrorCode::Unknown, "Bundled onboarding config is invalid")
            .with_details(Value::String(e.to_string()))
    })?;
    let now = Utc::now().to_rfc3339();
    config.document_id = Some(FALLBACK_DOCUMENT_ID.to_string());
    config.app_id = app_id.to_string();
    config.created_at = Some(now.clone());
    config.updated_at = Some(now);
    config.revision = Some(0);
    Ok(config)
}

pub struct ConfigLoader {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: Option<Arc<ConfigCache>>,
}

impl ConfigLoader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
            cache: None,
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(config.base_url.clone(), config.timeout)
    }

    /// Read through `cache` before the network and fill it after a
    /// successful fetch.
    pub fn with_cache(mut self, cache: Arc<ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, app_id: &str) -> String {
        build_url(&self.base_url, app_id)
    }

    /// Load the config for `app_id`. Only an empty app id (or a broken
    /// bundled default) is an error; every other failure falls back.
    pub async fn load(&self, app_id: &str) -> Result<LoadedConfig, OnboardingError> {
        validate_app_id(app_id)?;
        match self.load_remote(app_id).await {
            Ok(loaded) => Ok(loaded),
            Err(e) => {
                tracing::warn!(
                    app_id = %app_id,
                    url = %self.url_for(app_id),
                    error = %e,
                    "Falling back to bundled onboarding config"
                );
                Ok(LoadedConfig {
                    config: bundled_config(app_id)?,
                    source: ConfigSource::Fallback { reason: e.message },
                })
            }
        }
    }

    /// Cache, then network. Failures are returned as-is and nothing is
    /// substituted.
    pub async fn load_remote(&self, app_id: &str) -> Result<LoadedConfig, OnboardingError> {
        validate_app_id(app_id)?;
        let key = cache_key(&self.base_url, app_id);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(config)) => {
                    tracing::debug!(app_id = %app_id, "Onboarding config served from cache");
                    return Ok(LoadedConfig {
                        config,
                        source: ConfigSource::Cache,
                    });
                }
                Ok(None) => tracing::debug!(app_id = %app_id, "Onboarding config cache miss"),
                Err(e) => tracing::warn!(app_id = %app_id, error = %e, "Onboarding config cache read failed"),
            }
        }

        let config = self.fetch_remote(&self.url_for(app_id), app_id).await?;
        report_issues(&config);
        if let Some(cache) = &self.cache
            && let Err(e) = cache.set(&key, &config).await
        {
            tracing::warn!(app_id = %app_id, error = %e, "Failed to cache onboarding config");
        }
        tracing::info!(app_id = %app_id, screens = config.screens.len(), "Onboarding config loaded");
        Ok(LoadedConfig {
            config,
            source: ConfigSource::Remote,
        })
    }

    async fn fetch_remote(&self, url: &str, app_id: &str) -> Result<OnboardingConfig, OnboardingError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), app_id));
        }

        let envelope: Value = response.json().await.map_err(|e| transport_error(&e))?;
        if envelope.get("success") != Some(&Value::Bool(true)) {
            return Err(OnboardingError::new(ErrorCode::Unknown, "Invalid response"));
        }
        let data = envelope
            .get("data")
            .cloned()
            .ok_or_else(|| OnboardingError::new(ErrorCode::Unknown, "Invalid response"))?;
        parse_config(data, app_id)
    }
}

fn report_issues(config: &OnboardingConfig) {
    for issue in config.validate() {
        tracing::warn!(app_id = %config.app_id, issue = %issue, "Onboarding config problem");
    }
}

/// Failures are reported as-is; only `load` serves the bundled default.
#[async_trait]
impl OnboardingFetcher for ConfigLoader {
    async fn fetch(&self, app_id: &str) -> Result<OnboardingConfig, OnboardingError> {
        self.load_remote(app_id).await.map(|loaded| loaded.config)
    }
}
