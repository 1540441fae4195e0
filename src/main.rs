//! Screenshot Cache - configuration check
//!
//! Builds the cache driver described by the `CACHE_*` environment variables
//! exactly as a serving process would, prints its description and exits.
//! A non-zero exit status means the process must not start serving.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screenshot_cache::{CacheConfig, CacheFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screenshot_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    info!("Configuration loaded: driver={:?}", config.driver);

    let cache = CacheFactory::create(&config)
        .await
        .context("failed to initialize cache")?;

    let Some(cache) = cache else {
        warn!("No cache driver configured, results will not be cached");
        return Ok(());
    };

    let description = serde_json::to_string_pretty(&cache.describe())
        .context("failed to render cache description")?;
    println!("{}", description);

    cache.close().await.context("failed to close cache")?;
    info!("Cache check complete");

    Ok(())
}
