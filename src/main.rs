use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;

use onboarding_kit::cache::{ConfigCache, select_store};
use onboarding_kit::host::cli::{self, CliHost, PathFilePicker};
use onboarding_kit::loader::{ConfigLoader, ConfigSource};
use onboarding_kit::onboarding::Flow;
use onboarding_kit::SdkConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let app_id = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: onboarding-kit <app-id>");
        eprintln!("  ONBOARDING_BASE_URL, ONBOARDING_TIMEOUT_MS, ONBOARDING_CACHE_TTL_SECS,");
        eprintln!("  ONBOARDING_CACHE_DIR and ONBOARDING_VARIANT are read from the environment.");
        std::process::exit(2);
    });

    let config = SdkConfig::from_env().context("invalid onboarding configuration")?;

    eprintln!("🧭 Onboarding Kit v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   App: {}", app_id);
    eprintln!("   Source: {}", config.base_url);

    let store = select_store(config.cache_dir.as_deref()).await;
    let cache = Arc::new(ConfigCache::new(store).with_ttl(config.cache_ttl));
    let loader = ConfigLoader::from_config(&config).with_cache(cache);
    let loaded = loader.load(&app_id).await?;

    match &loaded.source {
        ConfigSource::Remote => eprintln!("   Config: remote"),
        ConfigSource::Cache => eprintln!("   Config: cached"),
        ConfigSource::Fallback { reason } => {
            eprintln!("   Config: bundled default ({})", reason)
        }
    }
    eprintln!("   Type `help` for commands.\n");

    let host = Arc::new(CliHost::new());
    let picker = Arc::new(PathFilePicker::new());
    let mut builder = Flow::builder(loaded.config, host.clone())
        .base_url(config.base_url.clone())
        .file_picker(picker.clone());
    if let Ok(variant) = std::env::var("ONBOARDING_VARIANT") {
        builder = builder.variant(variant);
    }
    let mut flow = builder.start()?;

    cli::run(&mut flow, &picker, BufReader::new(tokio::io::stdin())).await?;

    match host.take().await {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => eprintln!("Onboarding not finished."),
    }
    Ok(())
}
