// src/pipeline.rs
//! Collector -> Normalizer -> eager enrichment, plus the consumer-facing
//! `list_news` / `analyze_one` operations. None of these fail: the worst case is
//! an empty list or a synthetic analysis.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, gauge};
use tokio::sync::Mutex as AsyncMutex;

use crate::enrich::types::{AnalysisResult, Outcome};
use crate::enrich::Enricher;
use crate::ingest::types::{FeedQuery, FeedSource};
use crate::ingest::{collect, normalize_all};
use crate::news::{NewsRecord, NewsStats};

pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    queries: Vec<FeedQuery>,
    enricher: Arc<Enricher>,
    eager_enrichment: bool,
    latest: RwLock<Option<Vec<NewsRecord>>>,
    // One collection at a time, so the snapshot always comes from the newest run.
    run_lock: AsyncMutex<()>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn FeedSource>, queries: Vec<FeedQuery>, enricher: Arc<Enricher>) -> Self {
        Self {
            source,
            queries,
            enricher,
            eager_enrichment: true,
            latest: RwLock::new(None),
            run_lock: AsyncMutex::new(()),
        }
    }

    pub fn with_eager_enrichment(mut self, on: bool) -> Self {
        self.eager_enrichment = on;
        self
    }

    pub fn enricher(&self) -> &Arc<Enricher> {
        &self.enricher
    }

    /// Collect, normalize, and (if enabled) warm the analysis cache for every record.
    /// Overlapping calls (scheduler tick, manual refresh, cold `list_news`) run
    /// one after another.
    pub async fn collect_and_enrich_all(&self) -> Vec<NewsRecord> {
        let _run = self.run_lock.lock().await;
        self.run_collection().await
    }

    async fn run_collection(&self) -> Vec<NewsRecord> {
        let now = Utc::now();
        let raw = collect(Arc::clone(&self.source), &self.queries).await;
        let raw_count = raw.len();
        let (mut records, dedup) = normalize_all(now, raw);
        counter!("ingest_dedup_total").increment(dedup as u64);

        if self.eager_enrichment && !records.is_empty() {
            let reliability = self.enrich_batch(&records).await;
            for r in records.iter_mut() {
                if let Some(score) = reliability.get(&r.id) {
                    r.reliability = *score;
                }
            }
        }

        gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            target: "ingest",
            queries = self.queries.len(),
            raw = raw_count,
            kept = records.len(),
            dedup,
            "collection run finished"
        );

        *self.latest.write().unwrap_or_else(|p| p.into_inner()) = Some(records.clone());
        records
    }

    /// One task per record, all awaited together. Returns id -> reliability for
    /// the calls that completed.
    async fn enrich_batch(&self, records: &[NewsRecord]) -> HashMap<String, u8> {
        let handles = records.iter().map(|r| {
            let enricher = Arc::clone(&self.enricher);
            let id = r.id.clone();
            let seed = r.seed_text();
            tokio::spawn(async move {
                let result = enricher.analyze(&id, &seed).await;
                (id, result.reliability)
            })
        });

        let mut out = HashMap::with_capacity(records.len());
        for (joined, rec) in join_all(handles).await.into_iter().zip(records) {
            match joined {
                Ok((id, score)) => {
                    out.insert(id, score);
                }
                Err(e) => {
                    tracing::error!(target: "enrich", id = %rec.id, error = %e, "eager enrichment task failed");
                }
            }
        }
        out
    }

    /// Latest collected list; runs a collection if nothing has been collected yet.
    pub async fn list_news(&self) -> Vec<NewsRecord> {
        if let Some(rows) = self.snapshot() {
            return rows;
        }
        let _run = self.run_lock.lock().await;
        // A run that finished while we waited is good enough.
        if let Some(rows) = self.snapshot() {
            return rows;
        }
        self.run_collection().await
    }

    pub fn snapshot(&self) -> Option<Vec<NewsRecord>> {
        self.latest.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub async fn analyze_one(&self, id: &str, seed_text: &str) -> AnalysisResult {
        self.analyze_one_with_outcome(id, seed_text, false).await.0
    }

    /// `force` re-analyzes even when a cached analysis exists.
    pub async fn analyze_one_with_outcome(
        &self,
        id: &str,
        seed_text: &str,
        force: bool,
    ) -> (AnalysisResult, Outcome) {
        if force {
            self.enricher.reanalyze(id, seed_text).await
        } else {
            self.enricher.analyze_with_outcome(id, seed_text).await
        }
    }

    pub fn stats(&self) -> NewsStats {
        let rows = self.snapshot().unwrap_or_default();
        NewsStats::from_records(&rows, Utc::now())
    }
}
