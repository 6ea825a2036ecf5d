//! Onboarding kit: configuration-driven onboarding flows.
//!
//! Load a JSON onboarding document ([`loader`], [`client`], [`query`]),
//! run it as a [`onboarding::Flow`], and hand the collected data back to
//! the host when it finishes.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod onboarding;
pub mod query;
pub mod template;

pub use client::{ClientOptions, OnboardingClient, OnboardingResponse};
pub use config::SdkConfig;
pub use error::{ErrorCode, OnboardingError};
pub use loader::{ConfigLoader, ConfigSource, LoadedConfig};
pub use query::{OnboardingFetcher, OnboardingQuery, QueryOptions, QueryState};
