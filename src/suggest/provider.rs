//! Provider capability: turn a prompt into raw response text, or fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from a single provider attempt. All of them trigger the fallback.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("rate limited")]
    RateLimited,
    #[error("empty response")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no API key available (set {0})")]
    MissingCredentials(String),
}

/// Position a provider is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlot {
    Primary,
    Secondary,
}

impl ProviderSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSlot::Primary => "primary",
            ProviderSlot::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AI text-completion service.
///
/// Implementations issue exactly one request per `invoke` and never retry;
/// the orchestrator owns timeouts and fallback.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used for logging and shared rate-limit accounting.
    fn name(&self) -> &str;

    /// Send the prompt and return the raw completion text.
    async fn invoke(&self, prompt: &str) -> Result<String, ProviderError>;
}
