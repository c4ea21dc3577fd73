//! HTTP clients for the reasoning (chat-completion) service.
//!
//! Implements [`Reasoner`] for:
//! - **[`DisabledReasoner`]**: always fails; query expansion is skipped.
//! - **[`OpenAiReasoner`]**: OpenAI-compatible `POST /v1/chat/completions`.
//! - **[`OllamaReasoner`]**: local Ollama `POST /api/chat`.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with exponential backoff (0.5s, 1s, 2s, ...)
//! - HTTP 401/403 → fail immediately with [`ReasoningError::Unauthorized`]
//! - Other 4xx → fail immediately
//! - Network errors → retry

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use recall_search_core::reasoning::{Reasoner, ReasoningError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ReasoningConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

/// Instantiate the reasoner named by `config.provider`.
///
/// A missing OpenAI key is not an error here: the reasoner is still built
/// and reports [`ReasoningError::MissingCredential`] on use.
pub fn create_reasoner(config: &ReasoningConfig) -> Result<Arc<dyn Reasoner>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledReasoner)),
        "openai" => Ok(Arc::new(OpenAiReasoner::new(
            config,
            std::env::var("OPENAI_API_KEY").ok(),
        )?)),
        "ollama" => Ok(Arc::new(OllamaReasoner::new(config)?)),
        other => anyhow::bail!("Unknown reasoning provider: {}", other),
    }
}

fn build_client(config: &ReasoningConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// POST `body` as JSON and decode the response, retrying transient failures.
async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &B,
    max_retries: u32,
) -> Result<T, ReasoningError> {
    let mut last_err = ReasoningError::Network("no attempt made".to_string());

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_millis(500u64 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(key) = bearer {
            req = req.bearer_auth(key);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                last_err = ReasoningError::Network(e.to_string());
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ReasoningError::Malformed(e.to_string()));
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                last_err = ReasoningError::RateLimited;
                continue;
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ReasoningError::Unauthorized);
            }
            _ => {}
        }

        let body = response.text().await.unwrap_or_default();
        let err = ReasoningError::Http {
            status: status.as_u16(),
            body,
        };
        if status.is_server_error() {
            last_err = err;
            continue;
        }
        return Err(err);
    }

    Err(last_err)
}

// ============ Disabled ============

/// A reasoner that always fails with [`ReasoningError::Disabled`].
pub struct DisabledReasoner;

#[async_trait]
impl Reasoner for DisabledReasoner {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(
        &self,
        _user_prompt: &str,
        _system_prompt: &str,
        _temperature: f32,
    ) -> Result<String, ReasoningError> {
        Err(ReasoningError::Disabled)
    }
}

// ============ Chat message shape (shared) ============

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn chat_messages(system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        },
    ]
}

// ============ OpenAI-compatible ============

/// Reasoner backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiReasoner {
    client: reqwest::Client,
    label: String,
    model: String,
    url: String,
    api_key: Option<String>,
    max_retries: u32,
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

impl OpenAiReasoner {
    pub fn new(config: &ReasoningConfig, api_key: Option<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string());
        let base = trim_base(config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL));
        Ok(Self {
            client: build_client(config)?,
            label: format!("openai:{model}"),
            model,
            url: format!("{base}/v1/chat/completions"),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        temperature: f32,
    ) -> Result<String, ReasoningError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ReasoningError::MissingCredential("OPENAI_API_KEY".to_string()))?;

        let req = OpenAiChatRequest {
            model: &self.model,
            messages: chat_messages(system_prompt, user_prompt),
            temperature,
        };

        let body: OpenAiChatResponse =
            post_json(&self.client, &self.url, Some(api_key), &req, self.max_retries).await?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReasoningError::Malformed("response has no choices".to_string()))
    }
}

// ============ Ollama ============

/// Reasoner backed by a local Ollama instance.
pub struct OllamaReasoner {
    client: reqwest::Client,
    label: String,
    model: String,
    url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

impl OllamaReasoner {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string());
        let base = trim_base(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL));
        Ok(Self {
            client: build_client(config)?,
            label: format!("ollama:{model}"),
            model,
            url: format!("{base}/api/chat"),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Reasoner for OllamaReasoner {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        temperature: f32,
    ) -> Result<String, ReasoningError> {
        let req = OllamaChatRequest {
            model: &self.model,
            messages: chat_messages(system_prompt, user_prompt),
            stream: false,
            options: OllamaOptions { temperature },
        };

        let body: OllamaChatResponse =
            post_json(&self.client, &self.url, None, &req, self.max_retries).await?;
        Ok(body.message.content)
    }
}
