// src/ingest/normalize.rs
//! Raw feed entries -> canonical `NewsRecord`s: stable ids, summaries,
//! thumbnail/category inference, title dedup and recency sort.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::ingest::types::RawEntry;
use crate::ingest::{normalize_text, truncate_with_ellipsis};
use crate::news::{Category, NewsRecord, NewsStatus};

pub const SUMMARY_MAX_CHARS: usize = 150;
/// Hex chars kept from the SHA-256 digest (64 bits).
pub const ID_HEX_LEN: usize = 16;

pub const THUMB_ROBOTICS: &str =
    "https://images.unsplash.com/photo-1485827404703-89b55fcc595e?q=80&w=2070&auto=format&fit=crop";
pub const THUMB_DEFENSE: &str =
    "https://images.unsplash.com/photo-1517048676732-d65bc937f952?q=80&w=2070&auto=format&fit=crop";
pub const THUMB_AI: &str =
    "https://images.unsplash.com/photo-1626435307521-7b0b2f567086?q=80&w=2070&auto=format&fit=crop";
pub const THUMB_FOOD_CLUSTER: &str =
    "https://images.unsplash.com/photo-1565793298595-6a879b1d9492?q=80&w=2070&auto=format&fit=crop";
pub const THUMB_REGIONAL: &str =
    "https://images.unsplash.com/photo-1480714378408-67cf0d13bc1b?q=80&w=2070&auto=format&fit=crop";
pub const THUMB_DEFAULT: &str =
    "https://images.unsplash.com/photo-1504711434969-e33886168f5c?q=80&w=2070&auto=format&fit=crop";

const ROBOTICS_TERMS: &[&str] = &[
    "자율주행", "로봇", "무인", "드론", "autonomous", "robot", "unmanned", "drone",
];
const DEFENSE_TERMS: &[&str] = &[
    "국방", "방위", "방산", "육군", "해군", "공군", "군사", "부사관", "defense", "defence",
    "military", "army", "navy",
];
const AI_TERMS: &[&str] = &["인공지능", "artificial intelligence"];
const FOOD_CLUSTER_TERMS: &[&str] = &["식품", "푸드", "클러스터", "food", "cluster", "industrial"];
const REGIONAL_TERMS: &[&str] = &["익산", "지자체", "시청", "city", "regional", "municipal"];

fn matches_any(keyword: &str, terms: &[&str]) -> bool {
    let lower = keyword.to_lowercase();
    terms.iter().any(|t| lower.contains(t))
}

fn is_ai_keyword(keyword: &str) -> bool {
    keyword
        .split(|c: char| !c.is_alphanumeric())
        .any(|tok| tok.eq_ignore_ascii_case("ai"))
        || matches_any(keyword, AI_TERMS)
}

/// Korean city names end in 시 ("익산시", "전주시").
fn is_city_keyword(keyword: &str) -> bool {
    keyword
        .split_whitespace()
        .any(|tok| tok.chars().count() >= 2 && tok.ends_with('시'))
}

pub fn infer_category(keyword: &str) -> Category {
    if matches_any(keyword, DEFENSE_TERMS) {
        Category::Defense
    } else {
        Category::Tech
    }
}

/// Curated category images win over anything embedded in the feed content.
pub fn select_thumbnail(keyword: &str, content_html: Option<&str>) -> String {
    if matches_any(keyword, ROBOTICS_TERMS) {
        return THUMB_ROBOTICS.to_string();
    }
    if matches_any(keyword, DEFENSE_TERMS) {
        return THUMB_DEFENSE.to_string();
    }
    if is_ai_keyword(keyword) {
        return THUMB_AI.to_string();
    }
    if matches_any(keyword, FOOD_CLUSTER_TERMS) {
        return THUMB_FOOD_CLUSTER.to_string();
    }
    if matches_any(keyword, REGIONAL_TERMS) || is_city_keyword(keyword) {
        return THUMB_REGIONAL.to_string();
    }
    content_html
        .and_then(embedded_image)
        .unwrap_or_else(|| THUMB_DEFAULT.to_string())
}

fn embedded_image(html: &str) -> Option<String> {
    static RE_IMG: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| {
        regex::Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
    });
    re.captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
        .find(|src| src.starts_with("https://") || src.starts_with("http://"))
}

/// Deterministic id: first 64 bits of SHA-256 over the canonical key, as hex.
pub fn record_id(canonical_key: &str) -> String {
    let digest = Sha256::digest(canonical_key.as_bytes());
    let mut out = String::with_capacity(ID_HEX_LEN);
    for b in digest.iter().take(ID_HEX_LEN / 2) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn detect_source_name(source_name: Option<&str>, title: &str) -> String {
    if let Some(s) = source_name {
        return s.to_string();
    }
    match title.rsplit_once(" - ") {
        Some((_, suffix)) if !suffix.trim().is_empty() => suffix.trim().to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Map one raw entry to a record. Missing optional fields degrade to defaults.
pub fn normalize_entry(raw: &RawEntry, collected_at: DateTime<Utc>) -> NewsRecord {
    let e = &raw.entry;
    let title = e
        .title
        .as_deref()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let canonical_key = e
        .link
        .as_deref()
        .or(e.guid.as_deref())
        .unwrap_or(title.as_str());

    let snippet = e.content_html.as_deref().map(normalize_text).unwrap_or_default();

    NewsRecord {
        id: record_id(canonical_key),
        summary: truncate_with_ellipsis(&snippet, SUMMARY_MAX_CHARS),
        source_url: e.link.clone().unwrap_or_default(),
        publisher: format!(
            "[{}] {}",
            raw.region,
            detect_source_name(e.source_name.as_deref(), &title)
        ),
        published_at: e.published_at.unwrap_or(collected_at),
        collected_at,
        status: NewsStatus::Pending,
        reliability: 0,
        keywords: vec![raw.keyword.clone()],
        thumbnail_url: Some(select_thumbnail(&raw.keyword, e.content_html.as_deref())),
        category: infer_category(&raw.keyword),
        title,
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum DedupKey {
    Title(String),
    /// Entries without a usable title only collapse when they share a link.
    Id(String),
}

fn has_title(raw: &RawEntry) -> bool {
    raw.entry
        .title
        .as_deref()
        .is_some_and(|t| !normalize_text(t).is_empty())
}

/// Normalize, drop repeated titles (first seen wins, its keyword set absorbs the
/// duplicate's keyword), then sort newest first. Returns (records, dedup_count).
pub fn normalize_all(now: DateTime<Utc>, raw: Vec<RawEntry>) -> (Vec<NewsRecord>, usize) {
    let mut seen: HashMap<DedupKey, usize> = HashMap::with_capacity(raw.len());
    let mut out: Vec<NewsRecord> = Vec::with_capacity(raw.len());
    let mut dedup = 0usize;

    for entry in &raw {
        let rec = normalize_entry(entry, now);
        let key = if has_title(entry) {
            DedupKey::Title(rec.title.clone())
        } else {
            DedupKey::Id(rec.id.clone())
        };
        match seen.get(&key).copied() {
            Some(idx) => {
                dedup += 1;
                let kept = &mut out[idx];
                if !kept.keywords.contains(&entry.keyword) {
                    kept.keywords.push(entry.keyword.clone());
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(rec);
            }
        }
    }

    // Stable: equal timestamps keep first-seen order.
    out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    (out, dedup)
}
