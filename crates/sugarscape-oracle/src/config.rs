//! Configuration for the decision oracle.
//!
//! The `oracle:` section of `sugarscape-config.yaml` deserialises into
//! [`OracleConfig`]. The API key is never read from YAML; it comes from the
//! environment, which may also override the endpoint and model:
//!
//! - `ORACLE_API_KEY` -- API key (required when the oracle is enabled)
//! - `ORACLE_API_URL` -- base API URL
//! - `ORACLE_MODEL` -- model identifier

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Supported oracle backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API (also `DeepSeek`, Ollama).
    #[default]
    #[serde(alias = "deepseek", alias = "ollama")]
    OpenAi,
    /// Anthropic Messages API.
    #[serde(alias = "claude")]
    Anthropic,
}

impl core::str::FromStr for BackendType {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(OracleError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

/// Oracle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Whether decisions come from the oracle instead of the rules.
    pub enabled: bool,
    /// Which API dialect to speak.
    pub backend: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. Loaded from `ORACLE_API_KEY` only.
    #[serde(skip)]
    pub api_key: String,
    /// Attempts per tick before a transport failure becomes fatal.
    pub max_attempts: u32,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Directory holding `system.j2` / `batch.j2` overrides.
    pub templates_dir: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: BackendType::OpenAi,
            api_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key: String::new(),
            max_attempts: default_max_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
            templates_dir: None,
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl OracleConfig {
    /// Apply `ORACLE_*` environment variables on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ORACLE_API_KEY") {
            self.api_key = key;
        }
        if let Ok(url) = std::env::var("ORACLE_API_URL") {
            self.api_url = url;
        }
        if let Ok(model) = std::env::var("ORACLE_MODEL") {
            self.model = model;
        }
    }

    /// Per-request deadline.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check that an enabled oracle can actually be reached.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), OracleError> {
        if !self.enabled {
            return Ok(());
        }
        if self.api_url.trim().is_empty() {
            return Err(OracleError::Config("oracle.api_url is empty".to_owned()));
        }
        if self.model.trim().is_empty() {
            return Err(OracleError::Config("oracle.model is empty".to_owned()));
        }
        if self.api_key.is_empty() {
            return Err(OracleError::Config(
                "missing required env var ORACLE_API_KEY".to_owned(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(OracleError::Config(
                "oracle.max_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
