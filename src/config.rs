//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default config endpoint for the loader (`{base}/{appId}`).
pub const DEFAULT_LOADER_BASE_URL: &str = "http://192.168.0.105:3000/onboarding";

/// Default host for the legacy client (`{base}/api/onboarding/{appId}`).
pub const DEFAULT_CLIENT_BASE_URL: &str = "http://192.168.0.105:3000";

/// Default request timeout for config fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TTL for persisted config cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// SDK configuration shared by the loader, client and CLI host.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL the loader joins the app id onto.
    pub base_url: String,
    /// Request timeout for config fetches.
    pub timeout: Duration,
    /// TTL for persisted config cache entries.
    pub cache_ttl: Duration,
    /// Directory for the file-backed store. `None` keeps everything in memory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOADER_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_dir: None,
        }
    }
}

impl SdkConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = std::env::var("ONBOARDING_BASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.base_url);

        let timeout = match std::env::var("ONBOARDING_TIMEOUT_MS") {
            Ok(raw) => Duration::from_millis(parse_number("ONBOARDING_TIMEOUT_MS", &raw)?),
            Err(_) => defaults.timeout,
        };

        let cache_ttl = match std::env::var("ONBOARDING_CACHE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(parse_number("ONBOARDING_CACHE_TTL_SECS", &raw)?),
            Err(_) => defaults.cache_ttl,
        };

        let cache_dir = std::env::var("ONBOARDING_CACHE_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            base_url,
            timeout,
            cache_ttl,
            cache_dir,
        })
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a non-negative integer, got {raw:?}"),
    })
}
