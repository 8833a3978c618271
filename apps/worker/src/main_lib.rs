use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricecache_core::{CacheBackend, MemoryBackend, PriceContext};
use pricecache_market_data::build_default_sources;

use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("PC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Builds the engine context: cache backend, registered sources, registry.
pub async fn build_context(config: &Config) -> anyhow::Result<Arc<PriceContext>> {
    let backend: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Using Redis price cache");
            Arc::new(pricecache_core::RedisBackend::connect(url).await?)
        }
        None => {
            tracing::info!("PC_REDIS_URL not set, using in-memory price cache");
            Arc::new(MemoryBackend::new())
        }
    };

    let sources = build_default_sources(config.alpha_vantage_key.clone());
    tracing::info!(
        "Registered price sources: {:?}",
        sources.iter().map(|s| s.id()).collect::<Vec<_>>()
    );

    Ok(Arc::new(PriceContext::new(
        config.price.clone(),
        backend,
        &sources,
    )))
}
