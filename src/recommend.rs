//! Category recommendation backed by an LLM completion endpoint.
//!
//! The pipeline only ever sees [`Categorizer::classify_or_default`]: prompt
//! building, bracket extraction, JSON parsing and vocabulary filtering stay
//! in here, and every failure maps to the configured fallback categories.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::Asset;
use crate::scorer::has_value;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("categorization service is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response contained no text")]
    EmptyResponse,
}

/// Why no category list could be derived; callers substitute the fallback set.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classification unavailable: {0}")]
    Unavailable(#[from] LlmError),
    #[error("malformed category list: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no valid categories in response")]
    NoValidCategories,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single attempt, no retry.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn provider_name(&self) -> &'static str;
}

/// Used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClient;

#[async_trait]
impl CompletionClient for DisabledClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`; a model
    /// named in the config file wins over the environment.
    pub fn from_env(model_override: Option<&str>, timeout: Duration) -> Self {
        let model = model_override
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model,
            timeout,
        }
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    http: Client,
    cfg: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .user_agent("FinFeed/1.0 (News Aggregator)")
            .build()?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.cfg.api_key.as_deref().ok_or(LlmError::Disabled)?;

        let request = ChatRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: DEFAULT_TEMPERATURE,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Real client when an API key is present, otherwise [`DisabledClient`].
pub fn build_client(cfg: OpenAiConfig) -> Arc<dyn CompletionClient> {
    if cfg.api_key.is_none() {
        info!("No OPENAI_API_KEY set, recommendations use fallback categories");
        return Arc::new(DisabledClient);
    }
    match OpenAiClient::new(cfg) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Failed to build categorization client: {}", e);
            Arc::new(DisabledClient)
        }
    }
}

pub struct Categorizer {
    client: Arc<dyn CompletionClient>,
    fallback: Vec<String>,
}

impl Categorizer {
    pub fn new(client: Arc<dyn CompletionClient>, fallback: Vec<String>) -> Self {
        Self { client, fallback }
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }

    pub async fn classify(
        &self,
        profile_text: &str,
        valid_categories: &[String],
    ) -> Result<Vec<String>, ClassificationError> {
        let prompt = build_prompt(profile_text, valid_categories);
        let reply = self.client.complete(&prompt).await?;
        parse_categories(&reply, valid_categories)
    }

    pub async fn classify_or_default(
        &self,
        profile_text: &str,
        valid_categories: &[String],
    ) -> Vec<String> {
        match self.classify(profile_text, valid_categories).await {
            Ok(categories) => {
                info!(
                    "{} recommended categories: {}",
                    self.client.provider_name(),
                    categories.join(", ")
                );
                categories
            }
            Err(e) => {
                warn!("Using fallback categories: {}", e);
                self.fallback.clone()
            }
        }
    }
}

pub fn build_prompt(profile_text: &str, valid_categories: &[String]) -> String {
    format!(
        "Based on the following user profile, determine which news categories would be most relevant.\n\
         \n\
         User Profile:\n\
         {}\n\
         \n\
         Available categories: {}\n\
         \n\
         Return your response as a JSON array of strings containing ONLY the most relevant category names from the available list.\n\
         For example: [\"technology\", \"science\", \"education\"]\n\
         \n\
         Include at least 2 and at most 5 categories. Do not include any explanation, just the JSON array.",
        profile_text,
        valid_categories.join(", ")
    )
}

/// Outermost `[...]` span of `text`, or all of it when there is none.
pub fn extract_json_array(text: &str) -> &str {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse a reply into known categories, dropping unknown names and repeats.
pub fn parse_categories(
    reply: &str,
    valid_categories: &[String],
) -> Result<Vec<String>, ClassificationError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(extract_json_array(reply))?;

    let mut categories: Vec<String> = Vec::new();
    for name in values.iter().filter_map(|v| v.as_str()) {
        let known = valid_categories.iter().any(|c| c == name);
        if known && !categories.iter().any(|c| c == name) {
            categories.push(name.to_string());
        }
    }

    if categories.is_empty() {
        return Err(ClassificationError::NoValidCategories);
    }
    Ok(categories)
}

/// Free-text profile for the categorization prompt.
pub fn profile_summary(interests: &[String], goals: &[String], assets: &[Asset]) -> String {
    let list = |values: &[String]| {
        if values.is_empty() {
            "None specified".to_string()
        } else {
            values.join(", ")
        }
    };

    let mut summary = format!("Interests: {}\nGoals: {}", list(interests), list(goals));
    if let Some(composition) = portfolio_composition(assets) {
        summary.push_str("\nPortfolio: ");
        summary.push_str(&composition);
    }
    summary
}

/// Percentage of total value per asset type, e.g. `stock 75.0%, bond 25.0%`.
pub fn portfolio_composition(assets: &[Asset]) -> Option<String> {
    let valued: Vec<&Asset> = assets.iter().filter(|a| has_value(a)).collect();
    let total: f64 = valued.iter().map(|a| a.value).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let mut by_type: Vec<(&str, f64)> = Vec::new();
    for asset in valued {
        match by_type.iter_mut().find(|(t, _)| *t == asset.asset_type) {
            Some((_, value)) => *value += asset.value,
            None => by_type.push((&asset.asset_type, asset.value)),
        }
    }

    Some(
        by_type
            .iter()
            .map(|(t, value)| format!("{} {:.1}%", t, value / total * 100.0))
            .collect::<Vec<_>>()
            .join(", "),
    )
}
