// src/enrich/orchestrator.rs
//! `analyze(id, seed)`: cache -> provider raced against a timeout -> fallback.
//! Always returns a usable result; provider trouble is resolved here and never
//! reaches the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::enrich::cache::AnalysisCache;
use crate::enrich::fallback;
use crate::enrich::provider::{ProviderError, ProviderSlot};
use crate::enrich::types::{AnalysisResult, FallbackReason, Outcome};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4_000);

pub struct Enricher {
    cache: Arc<AnalysisCache>,
    provider: ProviderSlot,
    timeout: Duration,
    flights: Option<InFlight>,
}

impl Enricher {
    pub fn new(cache: Arc<AnalysisCache>, provider: ProviderSlot, timeout: Duration) -> Self {
        crate::enrich::ensure_metrics_described();
        Self {
            cache,
            provider,
            timeout,
            flights: None,
        }
    }

    /// Serialize concurrent misses for the same id so only one of them does
    /// provider work; the others pick the result up from the cache.
    pub fn with_single_flight(mut self, on: bool) -> Self {
        self.flights = on.then(InFlight::default);
        self
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn analyze(&self, id: &str, seed_text: &str) -> AnalysisResult {
        self.analyze_with_outcome(id, seed_text).await.0
    }

    pub async fn analyze_with_outcome(&self, id: &str, seed_text: &str) -> (AnalysisResult, Outcome) {
        if let Some(hit) = self.cache_hit(id) {
            return (hit, Outcome::CacheHit);
        }

        let _flight = match &self.flights {
            Some(f) => {
                let guard = f.enter(id).await;
                // Someone else may have finished while we waited.
                if let Some(hit) = self.cache_hit(id) {
                    return (hit, Outcome::CacheHit);
                }
                Some(guard)
            }
            None => None,
        };

        self.compute_and_store(id, seed_text).await
    }

    /// Skip the cache lookup and replace whatever is stored under `id`.
    pub async fn reanalyze(&self, id: &str, seed_text: &str) -> (AnalysisResult, Outcome) {
        let _flight = match &self.flights {
            Some(f) => Some(f.enter(id).await),
            None => None,
        };
        self.compute_and_store(id, seed_text).await
    }

    fn cache_hit(&self, id: &str) -> Option<AnalysisResult> {
        let hit = self.cache.get(id)?;
        counter!("enrich_cache_hits_total").increment(1);
        tracing::debug!(target: "enrich", id, "analysis cache hit");
        Some(hit)
    }

    async fn compute_and_store(&self, id: &str, seed_text: &str) -> (AnalysisResult, Outcome) {
        let t0 = Instant::now();
        let (result, outcome) = self.compute(id, seed_text).await;
        self.cache.set(id, result.clone()).await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("enrich_latency_ms").record(ms);
        match outcome {
            Outcome::Provider => counter!("enrich_provider_success_total").increment(1),
            Outcome::Fallback(reason) => {
                counter!("enrich_fallback_total", "reason" => reason.as_str()).increment(1)
            }
            Outcome::CacheHit => {}
        }
        tracing::info!(
            target: "enrich",
            id,
            source = outcome.source_label(),
            provider = self.provider.name(),
            elapsed_ms = ms as u64,
            "analysis stored"
        );
        (result, outcome)
    }

    async fn compute(&self, id: &str, seed_text: &str) -> (AnalysisResult, Outcome) {
        let provider = match &self.provider {
            ProviderSlot::Unconfigured => {
                return self.fallback(seed_text, FallbackReason::Unconfigured);
            }
            ProviderSlot::Configured(p) => Arc::clone(p),
        };

        // Own task so a panicking provider is contained and a late one can be aborted.
        let seed = seed_text.to_string();
        let mut task = tokio::spawn(async move { provider.generate(&seed).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(draft))) => (draft.stamp(Utc::now()), Outcome::Provider),
            Ok(Ok(Err(e))) => {
                tracing::warn!(target: "enrich", id, error = %e, "provider failed; using fallback");
                self.fallback(seed_text, FallbackReason::ProviderError)
            }
            Ok(Err(join_err)) => {
                let e = ProviderError::Malformed(format!("provider task failed: {join_err}"));
                tracing::error!(target: "enrich", id, error = %e, "provider task died; using fallback");
                self.fallback(seed_text, FallbackReason::ProviderError)
            }
            Err(_) => {
                // The late response is never awaited, so it cannot overwrite the fallback.
                task.abort();
                tracing::warn!(
                    target: "enrich",
                    id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "provider timed out; using fallback"
                );
                self.fallback(seed_text, FallbackReason::Timeout)
            }
        }
    }

    fn fallback(&self, seed_text: &str, reason: FallbackReason) -> (AnalysisResult, Outcome) {
        (fallback::generate(seed_text, Utc::now()), Outcome::Fallback(reason))
    }
}

/// Per-id async locks for the optional single-flight mode.
#[derive(Default)]
struct InFlight {
    locks: Mutex<HashMap<String, Slot>>,
}

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    /// Holder plus waiters; the slot goes away when this reaches zero.
    users: usize,
}

impl InFlight {
    async fn enter(&self, id: &str) -> FlightGuard<'_> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            let slot = map.entry(id.to_string()).or_insert_with(|| Slot {
                lock: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // Registered before waiting: a waiter cancelled mid-`await` still
        // deregisters through `Drop`.
        let mut guard = FlightGuard {
            flights: self,
            id: id.to_string(),
            _held: None,
        };
        guard._held = Some(lock.lock_owned().await);
        guard
    }
}

struct FlightGuard<'a> {
    flights: &'a InFlight,
    id: String,
    _held: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.flights.locks.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = map.get_mut(&self.id) {
            slot.users -= 1;
            if slot.users == 0 {
                map.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::provider::{AnalysisProvider, ProviderFuture};
    use crate::enrich::types::AnalysisDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl AnalysisProvider for Counting {
        fn generate<'a>(&'a self, seed_text: &'a str) -> ProviderFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(AnalysisDraft {
                    title: format!("Real: {}", seed_text.lines().next().unwrap_or_default()),
                    summary: "s".into(),
                    content: "## c".into(),
                    implications: vec![],
                    suggested_visuals: vec![],
                    reliability: 98,
                })
            })
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn enricher(calls: &Arc<AtomicUsize>, delay: Duration, single_flight: bool) -> Arc<Enricher> {
        let p = Counting {
            calls: Arc::clone(calls),
            delay,
        };
        Arc::new(
            Enricher::new(
                Arc::new(AnalysisCache::ephemeral()),
                ProviderSlot::configured(p),
                Duration::from_secs(2),
            )
            .with_single_flight(single_flight),
        )
    }

    #[tokio::test]
    async fn reanalyze_bypasses_cache_and_overwrites() {
        let calls = Arc::new(AtomicUsize::new(0));
        let e = enricher(&calls, Duration::ZERO, false);

        let (_, o1) = e.analyze_with_outcome("id", "A\nx").await;
        assert_eq!(o1, Outcome::Provider);
        let (r2, o2) = e.reanalyze("id", "B\nx").await;
        assert_eq!(o2, Outcome::Provider);
        assert_eq!(r2.title, "Real: B");
        assert_eq!(e.cache().get("id").unwrap().title, "Real: B");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_flight_collapses_concurrent_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let e = enricher(&calls, Duration::from_millis(100), true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                tokio::spawn(async move { e.analyze_with_outcome("same", "T\nS").await })
            })
            .collect();
        let outcomes: Vec<Outcome> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().1)
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.iter().filter(|o| **o == Outcome::Provider).count(), 1);
        assert!(e.flights.as_ref().unwrap().locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn without_single_flight_duplicates_are_possible() {
        let calls = Arc::new(AtomicUsize::new(0));
        let e = enricher(&calls, Duration::from_millis(100), false);

        let (a, b) = tokio::join!(e.analyze("same", "T\nS"), e.analyze("same", "T\nS"));
        assert_eq!(a.title, b.title);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_waiters_do_not_leak_slots() {
        use futures::FutureExt;

        let flights = InFlight::default();

        // Waiter dropped while the holder still runs.
        let holder = flights.enter("a").await;
        assert!(flights.enter("a").now_or_never().is_none());
        drop(holder);
        assert!(flights.locks.lock().unwrap().is_empty());

        // Holder finishes first, then the pending waiter is dropped.
        let holder = flights.enter("b").await;
        let mut waiter = Box::pin(flights.enter("b"));
        assert!(futures::poll!(&mut waiter).is_pending());
        drop(holder);
        assert_eq!(flights.locks.lock().unwrap().len(), 1);
        drop(waiter);
        assert!(flights.locks.lock().unwrap().is_empty());

        // Still usable afterwards.
        let again = flights.enter("b").await;
        drop(again);
        assert!(flights.locks.lock().unwrap().is_empty());
    }
}
