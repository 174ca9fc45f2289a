// src/enrich/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Chart,
    Image,
    Infographic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisualSuggestion {
    #[serde(rename = "type")]
    pub kind: VisualKind,
    pub description: String,
    /// Prompt for an image-generation model.
    pub prompt: String,
}

/// The analysis body as the provider returns it (no timestamp yet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDraft {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub implications: Vec<String>,
    pub suggested_visuals: Vec<VisualSuggestion>,
    pub reliability: u8,
}

impl AnalysisDraft {
    pub fn stamp(self, analyzed_at: DateTime<Utc>) -> AnalysisResult {
        AnalysisResult {
            title: self.title,
            summary: self.summary,
            content: self.content,
            implications: self.implications,
            suggested_visuals: self.suggested_visuals,
            reliability: self.reliability,
            analyzed_at,
        }
    }
}

/// One enrichment outcome, keyed by `NewsRecord::id` in the cache.
/// Replaced wholesale on re-analysis, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    /// Markdown.
    pub content: String,
    pub implications: Vec<String>,
    pub suggested_visuals: Vec<VisualSuggestion>,
    pub reliability: u8,
    pub analyzed_at: DateTime<Utc>,
}

/// Which path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    CacheHit,
    Provider,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Unconfigured,
    Timeout,
    ProviderError,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Unconfigured => "unconfigured",
            FallbackReason::Timeout => "timeout",
            FallbackReason::ProviderError => "provider_error",
        }
    }
}

impl Outcome {
    pub fn is_cache_hit(self) -> bool {
        matches!(self, Outcome::CacheHit)
    }

    pub fn source_label(self) -> &'static str {
        match self {
            Outcome::CacheHit => "cache",
            Outcome::Provider => "provider",
            Outcome::Fallback(_) => "fallback",
        }
    }
}
