// src/enrich/mod.rs
pub mod cache;
pub mod fallback;
pub mod orchestrator;
pub mod provider;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use cache::AnalysisCache;
pub use orchestrator::Enricher;
pub use provider::{AnalysisProvider, ProviderError, ProviderSlot};
pub use types::{AnalysisResult, Outcome, VisualKind, VisualSuggestion};

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("enrich_cache_hits_total", "Analyses served from the cache.");
        describe_counter!(
            "enrich_provider_success_total",
            "Analyses produced by the text-generation provider in time."
        );
        describe_counter!(
            "enrich_fallback_total",
            "Synthetic analyses, labelled by reason (unconfigured/timeout/provider_error)."
        );
        describe_counter!(
            "cache_flush_errors_total",
            "Failed writes of the persisted analysis cache."
        );
        describe_histogram!("enrich_latency_ms", "Time to produce a non-cached analysis.");
        describe_gauge!(
            "enrich_timeout_ms",
            "Configured provider budget in milliseconds."
        );
    });
}
