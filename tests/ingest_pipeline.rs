// tests/ingest_pipeline.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use guardian_post::enrich::fallback::FALLBACK_RELIABILITY;
use guardian_post::enrich::{AnalysisCache, Enricher, ProviderSlot};
use guardian_post::ingest::types::{FeedEntry, FeedQuery, FeedSource, Locale};
use guardian_post::pipeline::Pipeline;

/// Serves canned entries per keyword; keywords starting with `fail` error out.
struct MockSource;

#[async_trait]
impl FeedSource for MockSource {
    async fn search(&self, q: &FeedQuery) -> Result<Vec<FeedEntry>> {
        if q.keyword.starts_with("fail") {
            return Err(anyhow!("upstream 503 for {}", q.keyword));
        }
        let base = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
        Ok(vec![
            FeedEntry {
                title: Some(format!("{} headline", q.keyword)),
                link: Some(format!("https://news.example.test/{}", q.keyword)),
                published_at: Some(base),
                content_html: Some("<p>body</p>".into()),
                ..Default::default()
            },
            // Same headline under every keyword: collapses to one record.
            FeedEntry {
                title: Some("Shared wire story".into()),
                link: Some(format!("https://wire.example.test/{}", q.keyword)),
                published_at: Some(base - chrono::Duration::hours(1)),
                ..Default::default()
            },
        ])
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn queries(keywords: &[&str]) -> Vec<FeedQuery> {
    keywords
        .iter()
        .map(|k| FeedQuery {
            keyword: (*k).into(),
            locale: Locale {
                hl: "ko".into(),
                gl: "KR".into(),
                ceid: "KR:ko".into(),
                region: "KR".into(),
            },
        })
        .collect()
}

fn pipeline(keywords: &[&str]) -> Pipeline {
    let enricher = Enricher::new(
        Arc::new(AnalysisCache::ephemeral()),
        ProviderSlot::Unconfigured,
        Duration::from_secs(1),
    );
    Pipeline::new(Arc::new(MockSource), queries(keywords), Arc::new(enricher))
}

#[tokio::test]
async fn failed_queries_are_isolated_and_cache_is_warmed() {
    let p = pipeline(&["drone", "fail-1", "robot"]);
    let rows = p.collect_and_enrich_all().await;

    // drone + robot headlines, plus the shared story once
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.title == "Shared wire story").count(), 1);

    let cache = p.enricher().cache();
    assert_eq!(cache.len(), rows.len());
    for r in &rows {
        assert!(cache.get(&r.id).is_some(), "missing analysis for {}", r.id);
        assert_eq!(r.reliability, FALLBACK_RELIABILITY);
    }

    // merged keyword from the dropped duplicate
    let shared = rows.iter().find(|r| r.title == "Shared wire story").unwrap();
    assert!(shared.keywords.contains(&"drone".to_string()));
    assert!(shared.keywords.contains(&"robot".to_string()));
}

#[tokio::test]
async fn list_news_serves_snapshot_after_first_run() {
    let p = pipeline(&["drone"]);
    assert!(p.snapshot().is_none());

    let first = p.list_news().await;
    assert!(!first.is_empty());
    let second = p.list_news().await;
    assert_eq!(first, second);

    let stats = p.stats();
    assert_eq!(stats.total_collected, first.len());
}

#[tokio::test]
async fn total_feed_failure_yields_empty_list() {
    let p = pipeline(&["fail-a", "fail-b"]);
    let rows = p.collect_and_enrich_all().await;
    assert!(rows.is_empty());
    assert!(p.enricher().cache().is_empty());
    assert_eq!(p.stats().total_collected, 0);
}

#[tokio::test]
async fn analyze_one_after_collection_is_a_cache_hit() {
    let p = pipeline(&["drone"]);
    let rows = p.collect_and_enrich_all().await;
    let rec = &rows[0];

    let (r, outcome) = p.analyze_one_with_outcome(&rec.id, &rec.seed_text(), false).await;
    assert!(outcome.is_cache_hit());
    assert_eq!(r.reliability, rec.reliability);

    let (_, forced) = p.analyze_one_with_outcome(&rec.id, &rec.seed_text(), true).await;
    assert!(!forced.is_cache_hit());
}

#[tokio::test]
async fn lazy_mode_leaves_cache_cold() {
    let enricher = Enricher::new(
        Arc::new(AnalysisCache::ephemeral()),
        ProviderSlot::Unconfigured,
        Duration::from_secs(1),
    );
    let p = Pipeline::new(Arc::new(MockSource), queries(&["drone"]), Arc::new(enricher))
        .with_eager_enrichment(false);

    let rows = p.collect_and_enrich_all().await;
    assert!(!rows.is_empty());
    assert!(p.enricher().cache().is_empty());
    assert!(rows.iter().all(|r| r.reliability == 0));
}

/// One query, `n` distinct stories.
struct BulkSource(usize);

#[async_trait]
impl FeedSource for BulkSource {
    async fn search(&self, _q: &FeedQuery) -> Result<Vec<FeedEntry>> {
        let base = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
        Ok((0..self.0)
            .map(|i| FeedEntry {
                title: Some(format!("Story {i}")),
                link: Some(format!("https://bulk.example.test/{i}")),
                published_at: Some(base - chrono::Duration::minutes(i as i64)),
                content_html: Some(format!("<p>Story {i} body</p>")),
                ..Default::default()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "bulk"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_backed_warm_up_keeps_runtime_responsive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    let enricher = Enricher::new(
        Arc::new(AnalysisCache::load(&path)),
        ProviderSlot::Unconfigured,
        Duration::from_secs(1),
    );
    let p = Pipeline::new(Arc::new(BulkSource(1500)), queries(&["bulk"]), Arc::new(enricher));

    let max_gap_ms = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let max_gap_ms = Arc::clone(&max_gap_ms);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                let t0 = Instant::now();
                tokio::time::sleep(Duration::from_millis(5)).await;
                max_gap_ms.fetch_max(t0.elapsed().as_millis() as u64, Ordering::Relaxed);
            }
        })
    };

    let rows = p.collect_and_enrich_all().await;
    stop.store(true, Ordering::Relaxed);
    ticker.await.unwrap();

    assert_eq!(rows.len(), 1500);
    assert!(rows.iter().all(|r| r.reliability == FALLBACK_RELIABILITY));
    assert_eq!(AnalysisCache::load(&path).len(), 1500);

    let gap = max_gap_ms.load(Ordering::Relaxed);
    assert!(gap < 500, "runtime stalled for {gap} ms during warm-up");
}

/// First search is slow, later ones are instant.
struct SlowFirstSource {
    calls: AtomicU64,
}

#[async_trait]
impl FeedSource for SlowFirstSource {
    async fn search(&self, q: &FeedQuery) -> Result<Vec<FeedEntry>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(vec![FeedEntry {
            title: Some(format!("{} headline", q.keyword)),
            link: Some(format!("https://news.example.test/{}", q.keyword)),
            ..Default::default()
        }])
    }

    fn name(&self) -> &'static str {
        "slow-first"
    }
}

#[tokio::test]
async fn overlapping_runs_keep_the_newest_snapshot() {
    let enricher = Enricher::new(
        Arc::new(AnalysisCache::ephemeral()),
        ProviderSlot::Unconfigured,
        Duration::from_secs(1),
    );
    let p = Pipeline::new(
        Arc::new(SlowFirstSource {
            calls: AtomicU64::new(0),
        }),
        queries(&["drone"]),
        Arc::new(enricher),
    );

    let (older, newer) = tokio::join!(p.collect_and_enrich_all(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        p.collect_and_enrich_all().await
    });

    assert!(newer[0].collected_at > older[0].collected_at);
    assert_eq!(p.snapshot().unwrap()[0].collected_at, newer[0].collected_at);
}
