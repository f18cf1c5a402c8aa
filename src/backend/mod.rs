//! Chat-completion backend adapter.
//!
//! [`BackendAdapter`] speaks to either an Ollama daemon or an OpenAI-compatible
//! vLLM deployment behind one call signature. [`ChatBackend::try_generate`]
//! surfaces every failure as a [`BackendError`]; [`ChatBackend::generate`] is
//! the degrade-gracefully boundary that turns a failure into a
//! [`BackendResponse`] carrying [`BACKEND_ERROR_MARKER`].

mod ollama;
mod vllm;

use crate::config::{BackendConfig, Provider};
use crate::error::{BackendError, ConfigError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

/// Prefix of every response built from a failure.
pub const BACKEND_ERROR_MARKER: &str = "[Backend error]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A system instruction followed by one user turn.
pub fn prompt_pair(system: impl Into<String>, user: impl Into<String>) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Sampling options sent with every request.
///
/// `extra` entries are merged into the top level of the payload and may
/// override the defaults (`temperature`, `stream`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub extra: Map<String, Value>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            extra: Map::new(),
        }
    }
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub content: String,
    /// Provider reply as received, kept for diagnostics.
    pub raw: Value,
}

impl BackendResponse {
    pub fn from_error(err: &BackendError) -> Self {
        Self {
            content: format!("{} {}", BACKEND_ERROR_MARKER, err),
            raw: json!({ "error": err.to_string() }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.content.starts_with(BACKEND_ERROR_MARKER)
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn try_generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<BackendResponse, BackendError>;

    /// Never fails: errors come back as an error-marked response.
    async fn generate(&self, messages: &[ChatMessage], options: &GenerationOptions) -> BackendResponse {
        match self.try_generate(messages, options).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Backend call degraded to error text: {}", err);
                BackendResponse::from_error(&err)
            }
        }
    }
}

pub struct BackendAdapter {
    config: BackendConfig,
    provider: Provider,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl BackendAdapter {
    pub fn new(config: BackendConfig) -> Result<Self, ConfigError> {
        let provider: Provider = config.provider.parse()?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_backoff);
        Ok(Self {
            config,
            provider,
            retry,
            http: reqwest::Client::new(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Change the active provider, and the model when one is given.
    pub fn switch(&mut self, provider: &str, model: Option<&str>) -> Result<(), ConfigError> {
        let provider: Provider = provider.parse()?;
        self.provider = provider;
        self.config.provider = provider.to_string();
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.config.model = model.to_string();
        }
        debug!(%provider, model = %self.config.model, "Switched backend");
        Ok(())
    }

    fn endpoint(&self) -> String {
        match self.provider {
            Provider::Ollama => ollama::endpoint(&self.config.base_url),
            Provider::Vllm => vllm::endpoint(&self.config.base_url),
        }
    }

    fn payload(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Value {
        build_payload(&self.config.model, messages, options)
    }

    async fn send_once(&self, url: &str, payload: &Value) -> Result<BackendResponse, BackendError> {
        let mut request = self.http.post(url).timeout(self.config.timeout()).json(payload);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let raw: Value = response.json().await?;
        let content = match self.provider {
            Provider::Ollama => ollama::extract_content(&raw)?,
            Provider::Vllm => vllm::extract_content(&raw)?,
        };
        Ok(BackendResponse { content, raw })
    }
}

#[async_trait]
impl ChatBackend for BackendAdapter {
    #[instrument(skip(self, messages, options), fields(provider = %self.provider, model = %self.config.model))]
    async fn try_generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<BackendResponse, BackendError> {
        let endpoint = self.endpoint();
        let payload = self.payload(messages, options);
        debug!("Sending {} messages to {}", messages.len(), endpoint);

        let (url, payload) = (endpoint.as_str(), &payload);
        let response = self
            .retry
            .run("chat completion", |_| self.send_once(url, payload))
            .await?;
        debug!("Received {} characters", response.content.len());
        Ok(response)
    }
}

/// Request body shared by both providers.
pub fn build_payload(model: &str, messages: &[ChatMessage], options: &GenerationOptions) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), json!(messages));
    payload.insert("stream".to_string(), json!(false));
    payload.insert("temperature".to_string(), json!(options.temperature));
    for (key, value) in &options.extra {
        payload.insert(key.clone(), value.clone());
    }
    Value::Object(payload)
}
