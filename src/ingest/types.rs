// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Search locale for one feed request, e.g. `hl=ko`, `gl=KR`, `ceid=KR:ko`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Locale {
    pub hl: String,
    pub gl: String,
    pub ceid: String,
    /// Short tag shown in the publisher label, e.g. "KR".
    pub region: String,
}

/// One (keyword, locale) pair; the collector issues exactly one request per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub keyword: String,
    pub locale: Locale,
}

/// A single item as it came off the wire, before normalization.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Embedded HTML content (RSS `description`).
    pub content_html: Option<String>,
    pub source_name: Option<String>,
}

/// A feed entry tagged with the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub entry: FeedEntry,
    pub keyword: String,
    pub region: String,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn search(&self, query: &FeedQuery) -> Result<Vec<FeedEntry>>;
    fn name(&self) -> &'static str;
}
