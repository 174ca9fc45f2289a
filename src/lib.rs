// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod enrich;
pub mod ingest;
pub mod metrics;
pub mod news;
pub mod pipeline;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::AppConfig;
use crate::enrich::{AnalysisCache, Enricher, ProviderSlot};
use crate::ingest::providers::google_news::GoogleNewsProvider;
use crate::pipeline::Pipeline;

pub use crate::api::{router, AppState};
pub use crate::news::{NewsRecord, NewsStats};

/// Wire cache, provider, feed source and pipeline from config.
pub fn build_pipeline(cfg: &AppConfig) -> Result<Arc<Pipeline>> {
    let cache = Arc::new(AnalysisCache::load(&cfg.cache.path));
    let provider = ProviderSlot::from_config(&cfg.enrich);
    // Safe diagnostics: provider + enabled + key presence only
    info!(
        provider = provider.name(),
        enabled = cfg.enrich.enabled,
        has_key = cfg.enrich.api_key.is_some(),
        timeout_ms = cfg.enrich.timeout_ms,
        single_flight = cfg.enrich.single_flight,
        cached = cache.len(),
        "enrichment configured"
    );
    let enricher = Enricher::new(cache, provider, cfg.enrich.timeout())
        .with_single_flight(cfg.enrich.single_flight);

    let source = GoogleNewsProvider::from_url(cfg.feeds.base_url.clone())?;
    let pipeline = Pipeline::new(Arc::new(source), cfg.feeds.queries(), Arc::new(enricher))
        .with_eager_enrichment(cfg.feeds.eager_enrichment);
    Ok(Arc::new(pipeline))
}
