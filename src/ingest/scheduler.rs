// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;

#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn a background task that re-runs the full pipeline every `interval_secs`.
/// The first tick fires immediately, so the list is warm shortly after boot.
pub fn spawn_refresh_scheduler(cfg: RefreshSchedulerCfg, pipeline: Arc<Pipeline>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let kept = pipeline.collect_and_enrich_all().await;
            counter!("ingest_runs_total").increment(1);
            tracing::info!(target: "ingest", kept = kept.len(), "scheduled refresh tick");
        }
    })
}
