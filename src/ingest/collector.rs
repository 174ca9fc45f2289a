// src/ingest/collector.rs
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;

use crate::ingest::types::{FeedQuery, FeedSource, RawEntry};

/// Fetch every query concurrently and return the union of parsed entries.
///
/// Each query runs in its own task. A fetch error or a panicking task is logged
/// and contributes nothing; collection as a whole never fails. No ordering is
/// guaranteed between queries.
pub async fn collect(source: Arc<dyn FeedSource>, queries: &[FeedQuery]) -> Vec<RawEntry> {
    crate::ingest::ensure_metrics_described();

    let handles = queries.iter().cloned().map(|query| {
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            counter!("ingest_feed_requests_total").increment(1);
            let res = source.search(&query).await;
            (query, res)
        })
    });

    let mut out = Vec::new();
    for joined in join_all(handles).await {
        match joined {
            Ok((query, Ok(entries))) => {
                tracing::debug!(
                    target: "ingest",
                    keyword = %query.keyword,
                    region = %query.locale.region,
                    count = entries.len(),
                    "feed fetched"
                );
                out.extend(entries.into_iter().map(|entry| RawEntry {
                    entry,
                    keyword: query.keyword.clone(),
                    region: query.locale.region.clone(),
                }));
            }
            Ok((query, Err(e))) => {
                tracing::warn!(
                    target: "ingest",
                    error = ?e,
                    provider = source.name(),
                    keyword = %query.keyword,
                    region = %query.locale.region,
                    "feed error"
                );
                counter!("ingest_feed_errors_total").increment(1);
            }
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, provider = source.name(), "feed task failed");
                counter!("ingest_feed_errors_total").increment(1);
            }
        }
    }
    out
}
