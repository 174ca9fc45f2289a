// src/ingest/providers/google_news.rs
//! Google News RSS search provider: one HTTP GET per (keyword, locale).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{FeedEntry, FeedQuery, FeedSource};

pub const DEFAULT_BASE_URL: &str = "https://news.google.com/rss/search";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<SourceTag>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

pub(crate) fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct GoogleNewsProvider {
    mode: Mode,
}

enum Mode {
    /// Serves the same document for every query.
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl GoogleNewsProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("guardian-post/0.1 (news collector)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
        })
    }

    pub fn search_url(base_url: &str, query: &FeedQuery) -> String {
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            base_url,
            urlencoding::encode(&query.keyword),
            urlencoding::encode(&query.locale.hl),
            urlencoding::encode(&query.locale.gl),
            urlencoding::encode(&query.locale.ceid),
        )
    }

    pub fn parse_items_from_str(s: &str) -> Result<Vec<FeedEntry>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing google news rss xml")?;

        let out: Vec<FeedEntry> = rss
            .channel
            .item
            .into_iter()
            .map(|it| FeedEntry {
                title: non_empty(it.title),
                link: non_empty(it.link),
                guid: non_empty(it.guid.and_then(|g| g.value)),
                published_at: it.pub_date.as_deref().and_then(parse_pub_date),
                content_html: non_empty(it.description),
                source_name: non_empty(it.source.and_then(|s| s.name)),
            })
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for GoogleNewsProvider {
    async fn search(&self, query: &FeedQuery) -> Result<Vec<FeedEntry>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { base_url, client } => {
                let url = Self::search_url(base_url, query);
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("google news get() for '{}'", query.keyword))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("google news returned {status} for '{}'", query.keyword);
                }
                let body = resp.text().await.context("google news .text()")?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "google_news"
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
