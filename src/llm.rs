use crate::config::{Config, GenerationConfig};
use crate::conversation::Turn;
use crate::error::{ChatError, ChatResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Anything that can turn a conversation into a reply.
///
/// Implementations must return [`ChatError::CancelledByUser`] promptly once
/// `cancel` fires.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, turns: Vec<Turn>, cancel: CancellationToken) -> ChatResult<String>;
}

static BOLD_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern is valid"));

/// Strip `**bold**` markers and surrounding whitespace from a reply
pub fn sanitize_response(raw: &str) -> String {
    BOLD_MARKUP.replace_all(raw, "$1").trim().to_string()
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl From<GenerationConfig> for GenerationParams {
    fn from(config: GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl GenerateRequest {
    pub fn new(turns: &[Turn], generation: GenerationConfig) -> Self {
        let contents = turns
            .iter()
            .map(|turn| Content {
                role: Some(turn.role().as_str().to_string()),
                parts: vec![Part {
                    text: Some(turn.text().to_string()),
                }],
            })
            .collect();

        Self {
            contents,
            generation_config: generation.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, with all of its parts joined
    fn first_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text)
    }
}

/// HTTP client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(config: &Config) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key(),
            generation: config.generation,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request(&self, turns: &[Turn], api_key: &str) -> ChatResult<String> {
        let body = GenerateRequest::new(turns, self.generation);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|error| error.message)
                .unwrap_or_else(|| "API request failed".to_string());
            tracing::warn!(%status, "Generation request failed: {message}");
            return Err(ChatError::Transport(message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|err| ChatError::Transport(format!("Malformed API response: {err}")))?;

        parsed
            .first_text()
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ChatError::Transport("No response candidates returned".to_string()))
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, turns: Vec<Turn>, cancel: CancellationToken) -> ChatResult<String> {
        let Some(api_key) = self.api_key.clone() else {
            return Err(ChatError::Transport(
                "No API key configured. Set GEMINI_API_KEY or add api_key to config.toml."
                    .to_string(),
            ));
        };

        tracing::info!(turns = turns.len(), model = %self.model, "Sending generation request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Generation request aborted");
                Err(ChatError::CancelledByUser)
            }
            result = self.request(&turns, &api_key) => result,
        }
    }
}
