//! Model gateway for command interpretation.
//!
//! [`OpenAiClient`] talks to an OpenAI-compatible chat-completions
//! endpoint. It composes the fixed system instruction plus the user's
//! prompt, requests a JSON-object response format, and returns the raw
//! message content. The content is untrusted text; schema validation
//! happens in [`crate::nlp::command`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// Fixed instruction constraining the model to the command schema. Loaded
/// once, process-wide; the `email` alias is explicitly forbidden, though
/// the parser still normalizes it defensively.
pub const SYSTEM_PROMPT: &str = "You are an assistant that returns a valid JSON object for user CRUD operations. \
The JSON object has fields: 'operation' (create, get, update, delete), and 'data' (the user data). \
If user wants to get all, set 'operation' to 'get' and data to {}. \
Only output a valid JSON object, no explanations, no markdown, nothing else, Do NOT use 'email', use ONLY 'mail'.";

/// Fallback when neither the caller nor the configuration names a model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Internal failure classification for the upstream call. Each class is
/// logged with its diagnostics where it is observed; all of them collapse
/// to a single opaque upstream-failure error at the pipeline boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream returned client error status {0}")]
    ClientStatus(u16),
    #[error("upstream returned server error status {0}")]
    ServerStatus(u16),
    #[error("upstream returned an empty response")]
    EmptyResponse,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Default model name; may be blank, in which case [`DEFAULT_MODEL`]
    /// applies.
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Abstract interface for model providers. The gateway and tests plug in
/// different implementations behind this seam.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Interprets `prompt` and returns the raw model output text.
    ///
    /// On success the text is non-blank, but it is not guaranteed to be
    /// valid JSON matching the command schema.
    async fn interpret(&self, prompt: &str, model_override: Option<&str>)
        -> Result<String, LlmError>;
}

// Chat-completions wire types. Field names are the OpenAI wire contract
// and must not be renamed.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl ResponseFormat {
    fn json_object() -> Self {
        Self {
            format_type: "json_object",
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible provider (works with OpenAI and compatible
/// endpoints).
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn resolve_model(&self, model_override: Option<&str>) -> String {
        match model_override {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ if !self.config.model.trim().is_empty() => self.config.model.clone(),
            _ => DEFAULT_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn interpret(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<String, LlmError> {
        let model = self.resolve_model(model_override);
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request_body = ChatRequest {
            model: model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            response_format: ResponseFormat::json_object(),
        };

        debug!(model = %model, prompt_len = prompt.len(), "sending interpretation request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "model request transport failure");
                LlmError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "model endpoint rejected request");
            return Err(LlmError::ClientStatus(status.as_u16()));
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "model endpoint server error");
            return Err(LlmError::ServerStatus(status.as_u16()));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(error = %e, "failed to decode model response body");
            LlmError::Transport(format!("failed to decode response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            error!("model response had no choices or blank content");
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }
}

/// Deterministic provider for tests: returns the canned content for every
/// prompt.
pub struct StubLlmProvider {
    content: String,
}

impl StubLlmProvider {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn interpret(
        &self,
        _prompt: &str,
        _model_override: Option<&str>,
    ) -> Result<String, LlmError> {
        if self.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(self.content.clone())
    }
}
