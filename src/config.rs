//! Configuration schema for ecocode.
//!
//! Analysis limits and the suggestion providers are read from a YAML file.
//! Provider endpoints and credentials are opaque values here; nothing in the
//! core hardcodes them.

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::DEFAULT_MAX_SOURCE_BYTES;
use crate::score::energy::DEFAULT_ELECTRICITY_RATE_PER_KWH;
use crate::suggest::ProviderSlot;

/// Default config file names to search for in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["ecocode.yaml", ".ecocode.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse a config from YAML text.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load the explicit path, else the first discovered file, else defaults.
    ///
    /// Returns the path that was loaded, if any.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(),
        };

        match path {
            Some(p) => {
                let config = Self::parse_file(&p)?;
                validate(&config)?;
                Ok((config, Some(p)))
            }
            None => Ok((Self::default(), None)),
        }
    }
}

/// Find a config file in the working directory, then in the user config dir.
pub fn discover() -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }

    ProjectDirs::from("", "", "ecocode")
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_NAMES[0]))
        .filter(|p| p.exists())
}

/// Limits and constants for the analysis pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Reject sources larger than this many bytes (default: 512 KiB)
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
    /// Electricity price used for cost estimates (default: 8.0 per kWh)
    #[serde(default = "default_electricity_rate")]
    pub electricity_rate_per_kwh: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: default_max_source_bytes(),
            electricity_rate_per_kwh: default_electricity_rate(),
        }
    }
}

fn default_max_source_bytes() -> usize {
    DEFAULT_MAX_SOURCE_BYTES
}

fn default_electricity_rate() -> f64 {
    DEFAULT_ELECTRICITY_RATE_PER_KWH
}

/// Provider order, timeout and credentials for suggestions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuggestionConfig {
    /// Per-provider call timeout in milliseconds (default: 20000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Order in which provider slots are tried (default: [primary, secondary])
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<ProviderSlot>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            provider_order: default_provider_order(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl SuggestionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the provider configured for a slot.
    pub fn provider(&self, slot: ProviderSlot) -> Option<&ProviderConfig> {
        match slot {
            ProviderSlot::Primary => self.providers.primary.as_ref(),
            ProviderSlot::Secondary => self.providers.secondary.as_ref(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_provider_order() -> Vec<ProviderSlot> {
    vec![ProviderSlot::Primary, ProviderSlot::Secondary]
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub primary: Option<ProviderConfig>,
    #[serde(default)]
    pub secondary: Option<ProviderConfig>,
}

/// One OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Display name (e.g. "openai", "groq")
    pub name: String,
    /// Full chat completions URL
    pub endpoint: String,
    pub model: String,
    /// Literal API key (prefer `api_key_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Calls allowed per rolling minute across all sessions (default: unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests_per_minute: Option<u32>,
}

impl ProviderConfig {
    /// Resolve the API key: literal value first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.analysis.max_source_bytes == 0 {
        anyhow::bail!("analysis.max_source_bytes must be greater than 0");
    }

    let rate = config.analysis.electricity_rate_per_kwh;
    if !rate.is_finite() || rate < 0.0 {
        anyhow::bail!("analysis.electricity_rate_per_kwh must be a non-negative number, got {}", rate);
    }

    let suggestion = &config.suggestion;
    if suggestion.timeout_ms == 0 {
        anyhow::bail!("suggestion.timeout_ms must be greater than 0");
    }

    for (i, slot) in suggestion.provider_order.iter().enumerate() {
        if suggestion.provider_order[..i].contains(slot) {
            anyhow::bail!("suggestion.provider_order lists {} more than once", slot);
        }
    }

    for slot in [ProviderSlot::Primary, ProviderSlot::Secondary] {
        if let Some(provider) = suggestion.provider(slot) {
            if provider.model.trim().is_empty() {
                anyhow::bail!("providers.{}.model must not be empty", slot);
            }
            reqwest::Url::parse(&provider.endpoint).map_err(|e| {
                anyhow::anyhow!("providers.{}.endpoint {:?} is invalid: {}", slot, provider.endpoint, e)
            })?;
            if provider.max_requests_per_minute == Some(0) {
                anyhow::bail!("providers.{}.max_requests_per_minute must be greater than 0", slot);
            }
        }
    }

    Ok(())
}
