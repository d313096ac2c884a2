//! HTTP backends for the decision oracle.
//!
//! Enum dispatch over the two supported API dialects, since async methods
//! are not dyn-compatible. Both send one rendered prompt and return the
//! model's text reply, which the caller then parses as JSON.

use crate::config::{BackendType, OracleConfig};
use crate::error::OracleError;
use crate::prompt::RenderedPrompt;

/// Upper bound on reply length. A batch reply holds one decision per agent.
const MAX_REPLY_TOKENS: u32 = 8192;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An HTTP oracle backend.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Api`] if the HTTP call fails or the reply
    /// text cannot be extracted.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Create a backend from configuration.
pub fn create_backend(config: &OracleConfig) -> LlmBackend {
    match config.backend {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

fn transport_error(backend: &str, err: &reqwest::Error) -> OracleError {
    OracleError::Api {
        status: err.status().map(|s| s.as_u16()),
        detail: format!("{backend} request failed: {err}"),
    }
}

/// Turn a non-success HTTP reply into an error carrying its body.
async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, OracleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned());
    Err(OracleError::Api {
        status: Some(status.as_u16()),
        detail: format!("{backend} returned {status}: {body}"),
    })
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.2,
            "max_tokens": MAX_REPLY_TOKENS,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(endpoint(&self.api_url, "chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", &e))?;
        let response = check_status("OpenAI", response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_error("OpenAI", &e))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, OracleError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| OracleError::Api {
            status: None,
            detail: "OpenAI response missing choices[0].message.content".to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Differs from `OpenAI` in three ways:
/// - `x-api-key` header instead of `Authorization: Bearer`
/// - the system prompt is a top-level field
/// - the reply text lives at `content[0].text`
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_REPLY_TOKENS,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(endpoint(&self.api_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", &e))?;
        let response = check_status("Anthropic", response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_error("Anthropic", &e))?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, OracleError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| OracleError::Api {
            status: None,
            detail: "Anthropic response missing content[0].text".to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_openai_content_valid() {
        let json = serde_json::json!({
            "choices": [{
                "message": {"content": "{\"decisions\": []}"}
            }]
        });
        let result = extract_openai_content(&json);
        assert!(result.unwrap_or_default().contains("decisions"));
    }

    #[test]
    fn extract_openai_content_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        let result = extract_openai_content(&json);
        assert!(matches!(result, Err(OracleError::Api { .. })));
    }

    #[test]
    fn extract_anthropic_content_valid() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "[]"}]
        });
        assert_eq!(extract_anthropic_content(&json).unwrap_or_default(), "[]");
    }

    #[test]
    fn extract_anthropic_content_missing() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_content(&json).is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("https://api.anthropic.com/v1", "messages"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn create_backend_dispatches_correctly() {
        let openai = OracleConfig::default();
        assert_eq!(create_backend(&openai).name(), "openai-compatible");

        let anthropic = OracleConfig {
            backend: BackendType::Anthropic,
            ..OracleConfig::default()
        };
        assert_eq!(create_backend(&anthropic).name(), "anthropic");
    }
}
