use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Failures of a single `generateContent` call
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request cancelled")]
    Cancelled,

    #[error("no API key configured (set `api_key` in config.toml or the GEMINI_API_KEY variable)")]
    MissingApiKey,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request task panicked")]
    Panicked,
}

/// Anything that can turn one user prompt into one reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generate a reply for `prompt`. Resolves to `LlmError::Cancelled`
    /// once `cancel` fires, whatever the transport is doing.
    async fn generate(&self, prompt: &str, cancel: CancellationToken) -> Result<String, LlmError>;
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPart {
    pub text: String,
}

impl GenerateContentRequest {
    /// Single-turn request carrying `text` as the only content
    pub fn single_turn(text: impl Into<String>) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: text.into() }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`
    fn into_reply(self) -> Result<String, LlmError> {
        self.candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("no candidates".to_string()))?
            .content
            .ok_or_else(|| LlmError::MalformedResponse("candidate has no content".to_string()))?
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("content has no parts".to_string()))?
            .text
            .ok_or_else(|| LlmError::MalformedResponse("first part has no text".to_string()))
    }
}

/// HTTP client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct LlmClient {
    config: Config,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn send_request(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.config.get_api_key().ok_or(LlmError::MissingApiKey)?;
        let payload = GenerateContentRequest::single_turn(prompt);

        debug!(model = %self.config.model, chars = prompt.chars().count(), "sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "generateContent returned an error status");
            return Err(LlmError::Api { status, body });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        parsed.into_reply()
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn generate(&self, prompt: &str, cancel: CancellationToken) -> Result<String, LlmError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = self.send_request(prompt) => result,
        }
    }
}
