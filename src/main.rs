//! Guardian Post news service: binary entrypoint.
//! Boots config, the enrichment cache, the refresh scheduler and the Axum router.

use guardian_post::config::AppConfig;
use guardian_post::ingest::scheduler::{spawn_refresh_scheduler, RefreshSchedulerCfg};
use guardian_post::metrics::Metrics;
use guardian_post::{build_pipeline, router, AppState};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
/// Filter from `RUST_LOG`, falling back to `guardian_post=info,warn`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guardian_post=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    // The hosting runtime may already have installed a subscriber.
    let _ = res;
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let metrics = Metrics::init(cfg.enrich.timeout_ms)?;
    let pipeline = build_pipeline(&cfg)?;

    spawn_refresh_scheduler(
        RefreshSchedulerCfg {
            interval_secs: cfg.feeds.refresh_secs,
        },
        pipeline.clone(),
    );

    let app = router(AppState { pipeline }).merge(metrics.router());
    Ok(app.into())
}
