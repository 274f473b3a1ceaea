//! LLM Client: the single point of entry for all language-model calls.
//!
//! No other module talks to the model API directly. Completions and embeddings
//! are exposed through the `CompletionModel` and `EmbeddingModel` traits so the
//! CV pipeline can run against fakes in tests.
//!
//! Models are hardcoded to keep extraction output stable across deployments.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Completion model used for every structured-extraction prompt.
pub const COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
/// Embedding model used for skills/achievements vectors.
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const TEMPERATURE: f32 = 0.3;
const MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned no choices")]
    EmptyContent,
}

impl LlmError {
    /// Transport failures, rate limits and upstream 5xx are worth another attempt.
    /// Client errors (bad key, bad request) and empty responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::EmptyContent => false,
        }
    }
}

/// Free-form text completion. Callers own prompt construction and output parsing.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

/// Fixed-length embedding of a piece of text.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl CompletionResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(usage) = &self.usage {
            debug!(
                "completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        self.choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(LlmError::EmptyContent)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Pulls `error.message` out of an API error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// HTTP client for an OpenAI-compatible completions/embeddings API.
/// Retries rate limits, 5xx and transport failures with exponential backoff.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    backoff: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the base retry delay (doubles per attempt).
    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 1;

        loop {
            match self.send_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = self.backoff * (1 << (attempt - 1));
                    warn!(
                        "LLM call to {} attempt {} failed ({}), retrying after {}ms...",
                        path,
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<B, R>(&self, url: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: COMPLETION_MODEL,
            prompt,
            max_tokens,
            temperature: TEMPERATURE,
            n: 1,
        };
        let response: CompletionResponse = self.post_json("/completions", &request).await?;
        response.into_text()
    }
}

#[async_trait]
impl EmbeddingModel for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: text,
        };
        let response: EmbeddingResponse = self.post_json("/embeddings", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyContent)
    }
}
