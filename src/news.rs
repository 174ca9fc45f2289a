//! Canonical news record shared by ingest, the pipeline and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    #[default]
    Pending,
    Analyzing,
    Approved,
    Rejected,
    Published,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Defense,
    Economy,
    Society,
    Tech,
}

/// One article after normalization.
///
/// `id` is derived from `source_url` (see `ingest::normalize::record_id`), so the
/// same link always maps to the same enrichment cache entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub publisher: String,
    pub published_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub status: NewsStatus,
    pub reliability: u8,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub category: Category,
}

impl NewsRecord {
    /// Seed text handed to the enrichment orchestrator.
    pub fn seed_text(&self) -> String {
        format!("{}\n{}", self.title, self.summary)
    }
}

/// Dashboard counters over the latest collected list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsStats {
    pub total_collected: usize,
    pub analyzing: usize,
    pub approved: usize,
    pub today_count: usize,
}

impl NewsStats {
    pub fn from_records(records: &[NewsRecord], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let mut stats = NewsStats {
            total_collected: records.len(),
            ..Default::default()
        };
        for r in records {
            match r.status {
                NewsStatus::Analyzing => stats.analyzing += 1,
                NewsStatus::Approved => stats.approved += 1,
                _ => {}
            }
            if r.published_at.date_naive() == today {
                stats.today_count += 1;
            }
        }
        stats
    }
}
