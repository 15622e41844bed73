//! Hosted generative-model client.
//!
//! One bounded request/response exchange against a generate-content API;
//! all failure modes map into the typed [`AnalysisError`] taxonomy. No
//! retry loop lives here - retries are caller policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AnalysisError;
use crate::provider::{AnalysisProvider, AnalysisRequest};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Client for the hosted analysis service.
#[derive(Debug)]
pub struct HostedAnalysisClient {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HostedAnalysisClient {
    /// Fails fast when no credential is configured - surfaced before any
    /// request is attempted.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnalysisError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AnalysisError::MissingCredential);
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Hard timeout for the whole exchange, distinct from page-operation
    /// timeouts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn classify_status(status: StatusCode, body: String) -> AnalysisError {
        let message = ApiErrorEnvelope::message_from(&body).unwrap_or(body);
        match status.as_u16() {
            401 | 403 => AnalysisError::Auth(message),
            429 => {
                if message.contains("RESOURCE_EXHAUSTED") || message.to_lowercase().contains("quota")
                {
                    AnalysisError::Quota(message)
                } else {
                    AnalysisError::RateLimit(message)
                }
            }
            _ => AnalysisError::Transport(format!("status {}: {}", status.as_u16(), message)),
        }
    }
}

#[async_trait]
impl AnalysisProvider for HostedAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            BASE_URL, self.model, self.api_key
        );

        let body = GenerateContentRequest::from(request);
        debug!(model = %self.model, prompt_chars = request.user_prompt.len(), "analysis request");

        let send = self.client.post(&url).json(&body).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                AnalysisError::Transport(format!("analysis call exceeded {:?}", self.timeout))
            })?
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, text));
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::Upstream(format!("undecodable envelope: {e}")))?;
        let combined = envelope.combined_text();
        if combined.is_empty() {
            return Err(AnalysisError::Upstream("response carried no text parts".into()));
        }
        Ok(combined)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl From<&AnalysisRequest> for GenerateContentRequest {
    fn from(request: &AnalysisRequest) -> Self {
        Self {
            system_instruction: Content::text(&request.system_instruction),
            contents: vec![Content::text(&request.user_prompt)],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn combined_text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl ApiErrorEnvelope {
    fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .map(|e| e.error.message)
    }
}
