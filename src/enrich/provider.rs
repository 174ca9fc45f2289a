// src/enrich/provider.rs
//! Text-generation provider boundary: (model, system instructions, seed text) in,
//! a structured `AnalysisDraft` or a `ProviderError` out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EnrichConfig;
use crate::enrich::types::AnalysisDraft;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const SYSTEM_PROMPT: &str = "You are an analytical news journalist covering defense, AI and \
regional industry. Given a headline and summary, write an in-depth analysis. Respond with ONE JSON \
object only, with keys: title (string), summary (string, 2-3 sentences), content (markdown string \
with sections), implications (array of short strings), suggestedVisuals (array of objects with \
type in [chart, image, infographic], description, prompt), reliability (integer 0-100).";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider api key is missing")]
    MissingApiKey,
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response malformed: {0}")]
    Malformed(String),
}

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AnalysisDraft, ProviderError>> + Send + 'a>>;

/// Low-level provider: does the remote call only. Caching, timeouts and
/// fallback live in the orchestrator.
pub trait AnalysisProvider: Send + Sync + 'static {
    fn generate<'a>(&'a self, seed_text: &'a str) -> ProviderFuture<'a>;
    fn name(&self) -> &'static str;
}

/// Provider capability, branched on explicitly by the orchestrator.
#[derive(Clone)]
pub enum ProviderSlot {
    Configured(Arc<dyn AnalysisProvider>),
    Unconfigured,
}

impl ProviderSlot {
    pub fn configured<P: AnalysisProvider>(p: P) -> Self {
        ProviderSlot::Configured(Arc::new(p))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderSlot::Configured(p) => p.name(),
            ProviderSlot::Unconfigured => "unconfigured",
        }
    }

    /// `enabled == false`, an unknown provider, or no api key => `Unconfigured`.
    pub fn from_config(cfg: &EnrichConfig) -> Self {
        if !cfg.enabled {
            return ProviderSlot::Unconfigured;
        }
        match cfg.provider.as_str() {
            "openai" => match cfg.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
                Some(key) => match OpenAiProvider::new(&cfg.base_url, &cfg.model, key) {
                    Ok(p) => ProviderSlot::configured(p),
                    Err(e) => {
                        tracing::warn!(target: "enrich", error = %e, "provider client build failed; using fallback only");
                        ProviderSlot::Unconfigured
                    }
                },
                None => {
                    tracing::warn!(target: "enrich", "OPENAI_API_KEY not set; using fallback only");
                    ProviderSlot::Unconfigured
                }
            },
            other => {
                tracing::info!(target: "enrich", provider = other, "provider disabled");
                ProviderSlot::Unconfigured
            }
        }
    }
}

/// OpenAI-compatible Chat Completions provider in JSON mode.
pub struct OpenAiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .user_agent("guardian-post/0.1 (enrichment)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn generate_impl(&self, seed_text: &str) -> Result<AnalysisDraft, ProviderError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: seed_text,
                },
            ],
            temperature: 0.4,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("envelope: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("no message content".into()))?;
        parse_draft(&content)
    }
}

impl AnalysisProvider for OpenAiProvider {
    fn generate<'a>(&'a self, seed_text: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.generate_impl(seed_text))
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse model output into a draft. Tolerates a ```json fence; anything that does
/// not match the analysis shape is `Malformed`.
pub fn parse_draft(raw: &str) -> Result<AnalysisDraft, ProviderError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let draft: AnalysisDraft =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if draft.reliability > 100 {
        return Err(ProviderError::Malformed(format!(
            "reliability {} out of range",
            draft.reliability
        )));
    }
    if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
        return Err(ProviderError::Malformed("empty title or content".into()));
    }
    Ok(draft)
}
