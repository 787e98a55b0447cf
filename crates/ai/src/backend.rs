//! Text-generation backends.
//!
//! The service only needs `prompt -> text`. [`OllamaBackend`] talks to a
//! local or remote Ollama server through its non-streaming generate API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

// ============================================================================
// Answer Backend Trait
// ============================================================================

/// Something that turns a prompt into generated text.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Stable identifier used in logs and health output.
    fn id(&self) -> &'static str;

    /// Generate a complete answer for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

// ============================================================================
// Ollama
// ============================================================================

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Configuration for the Ollama backend.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// HTTP timeout for a single generate call.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama `/api/generate` client.
pub struct OllamaBackend {
    client: HttpClient,
    config: OllamaConfig,
}

impl OllamaBackend {
    const ID: &'static str = "OLLAMA";

    pub fn new(config: OllamaConfig) -> Result<Self, AiError> {
        let client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::backend(Self::ID, e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AnswerBackend for OllamaBackend {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        debug!(
            "Generating answer with {} model {} ({} prompt chars)",
            Self::ID,
            self.config.model,
            prompt.len()
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(format!("{} did not answer in time", Self::ID))
                } else {
                    AiError::backend(Self::ID, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::backend(
                Self::ID,
                format!("HTTP {}: {}", status, truncate(&body, 200)),
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::backend(Self::ID, format!("invalid response: {}", e)))?;

        let answer = body.response.trim();
        if answer.is_empty() {
            return Err(AiError::backend(Self::ID, "empty response"));
        }
        Ok(answer.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
