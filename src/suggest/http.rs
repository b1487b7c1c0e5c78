//! OpenAI-compatible chat completions provider.
//!
//! Works with any endpoint speaking the `/v1/chat/completions` format
//! (OpenAI, Groq, LiteLLM proxies, Ollama's compatibility layer).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Provider, ProviderError};
use crate::config::ProviderConfig;

const SYSTEM_PROMPT: &str =
    "You review code for performance and energy efficiency and propose behavior-preserving rewrites.";

pub struct ChatCompletionsProvider {
    http: Client,
    name: String,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    /// Set when `api_key_env` names a variable that is not set.
    missing_key_env: Option<String>,
    temperature: Option<f32>,
}

impl ChatCompletionsProvider {
    /// Create a provider from its configuration.
    ///
    /// `timeout` bounds the whole HTTP exchange.
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .user_agent(concat!("ecocode/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let api_key = config.resolve_api_key();
        let missing_key_env = match (&api_key, &config.api_key_env) {
            (None, Some(var)) => Some(var.clone()),
            _ => None,
        };

        Ok(Self {
            http,
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            missing_key_env,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "stream": false,
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Some(var) = &self.missing_key_env {
            return Err(ProviderError::MissingCredentials(var.clone()));
        }

        let mut request = self.http.post(&self.endpoint).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e)
            }
        })?;

        match response.status().as_u16() {
            429 => return Err(ProviderError::RateLimited),
            s if !(200..300).contains(&s) => return Err(ProviderError::Status(s)),
            _ => {}
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e)
            }
        })?;

        extract_content(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's content out of a completions response body.
fn extract_content(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(content)
}
