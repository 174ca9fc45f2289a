// src/config/mod.rs
//! Service configuration from `config/guardian.toml` (or `$GUARDIAN_CONFIG_PATH`),
//! with env overrides. A missing file means built-in defaults.

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::enrich::cache::DEFAULT_CACHE_PATH;
use crate::enrich::provider::{DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL};
use crate::ingest::providers::google_news::DEFAULT_BASE_URL as DEFAULT_FEED_BASE_URL;
use crate::ingest::types::{FeedQuery, Locale};

pub const DEFAULT_CONFIG_PATH: &str = "config/guardian.toml";
pub const ENV_CONFIG_PATH: &str = "GUARDIAN_CONFIG_PATH";
pub const ENV_ENRICH_ENABLED: &str = "ENRICH_ENABLED";
pub const ENV_ENRICH_TIMEOUT_MS: &str = "ENRICH_TIMEOUT_MS";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_REFRESH_SECS: u64 = 900;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feeds: FeedsConfig,
    pub enrich: EnrichConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub base_url: String,
    pub keywords: Vec<String>,
    pub locales: Vec<Locale>,
    pub refresh_secs: u64,
    /// Warm the analysis cache for every collected record.
    pub eager_enrichment: bool,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            keywords: default_keywords(),
            locales: vec![Locale {
                hl: "ko".into(),
                gl: "KR".into(),
                ceid: "KR:ko".into(),
                region: "KR".into(),
            }],
            refresh_secs: DEFAULT_REFRESH_SECS,
            eager_enrichment: true,
        }
    }
}

fn default_keywords() -> Vec<String> {
    ["국방 AI", "익산시", "육군부사관학교", "국가식품클러스터", "자율주행 로봇"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl FeedsConfig {
    /// One query per keyword x locale.
    pub fn queries(&self) -> Vec<FeedQuery> {
        self.keywords
            .iter()
            .flat_map(|k| {
                self.locales.iter().map(move |l| FeedQuery {
                    keyword: k.clone(),
                    locale: l.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub enabled: bool,
    /// "openai" | "disabled" (case-insensitive)
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub single_flight: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "openai".into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            api_key: Some("ENV".into()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            single_flight: false,
        }
    }
}

impl EnrichConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.finalize())
    }

    /// 1) $GUARDIAN_CONFIG_PATH  2) config/guardian.toml  3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(&p);
        }
        Ok(AppConfig::default().finalize())
    }

    /// Resolve env indirections and sanitize out-of-range values.
    fn finalize(mut self) -> Self {
        let e = &mut self.enrich;
        e.provider = e.provider.trim().to_lowercase();

        if e
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().eq_ignore_ascii_case("env"))
        {
            e.api_key = env::var(ENV_OPENAI_API_KEY).ok().filter(|k| !k.trim().is_empty());
        }

        if let Ok(v) = env::var(ENV_ENRICH_ENABLED) {
            e.enabled = !matches!(v.trim(), "0" | "false" | "off");
        }
        if let Some(ms) = env::var(ENV_ENRICH_TIMEOUT_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            e.timeout_ms = ms;
        }
        if e.timeout_ms == 0 {
            e.timeout_ms = DEFAULT_TIMEOUT_MS;
        }

        let f = &mut self.feeds;
        f.keywords = clean_list(std::mem::take(&mut f.keywords));
        if f.keywords.is_empty() {
            f.keywords = default_keywords();
        }
        if f.locales.is_empty() {
            f.locales = FeedsConfig::default().locales;
        }
        if f.refresh_secs == 0 {
            f.refresh_secs = DEFAULT_REFRESH_SECS;
        }
        self
    }
}

/// Trim, drop empties and repeats; keeps first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
