//! Blocking transports that carry a rendered prompt to the oracle.
//!
//! The simulation is single-threaded and waits for every batch, so the
//! client talks to a synchronous [`OracleTransport`]. [`HttpTransport`]
//! drives the async HTTP backends on its own current-thread runtime.
//! [`ScriptedTransport`] replays canned replies for tests and offline runs.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::llm::{LlmBackend, create_backend};
use crate::prompt::RenderedPrompt;

/// Sends one prompt and returns the raw reply text.
pub trait OracleTransport {
    /// Send `prompt` and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Api`] for transport failures.
    fn complete(&mut self, prompt: &RenderedPrompt) -> Result<String, OracleError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// HTTP transport backed by an OpenAI-compatible or Anthropic API.
pub struct HttpTransport {
    runtime: tokio::runtime::Runtime,
    backend: LlmBackend,
    timeout: Duration,
}

impl HttpTransport {
    /// Build the backend and its runtime from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] if the runtime cannot be started.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| OracleError::Config(format!("failed to start oracle runtime: {e}")))?;
        Ok(Self {
            runtime,
            backend: create_backend(config),
            timeout: config.request_timeout(),
        })
    }
}

impl OracleTransport for HttpTransport {
    fn complete(&mut self, prompt: &RenderedPrompt) -> Result<String, OracleError> {
        let deadline = self.timeout;
        let backend = &self.backend;
        self.runtime.block_on(async move {
            tokio::time::timeout(deadline, backend.complete(prompt))
                .await
                .map_err(|_elapsed| OracleError::Api {
                    status: None,
                    detail: format!("request timed out after {}ms", deadline.as_millis()),
                })?
        })
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

/// Replays a fixed queue of replies, recording every prompt it receives.
///
/// Once the queue is empty every call fails with a non-retryable
/// [`OracleError::Config`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<String, OracleError>>,
    prompts: Vec<RenderedPrompt>,
}

impl ScriptedTransport {
    /// Create a transport that will hand out `replies` in order.
    pub fn new(replies: impl IntoIterator<Item = Result<String, OracleError>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    /// Queue another reply.
    pub fn push(&mut self, reply: Result<String, OracleError>) {
        self.replies.push_back(reply);
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> &[RenderedPrompt] {
        &self.prompts
    }

    /// Replies not yet handed out.
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl OracleTransport for ScriptedTransport {
    fn complete(&mut self, prompt: &RenderedPrompt) -> Result<String, OracleError> {
        self.prompts.push(prompt.clone());
        self.replies.pop_front().unwrap_or_else(|| {
            Err(OracleError::Config(
                "scripted transport has no replies left".to_owned(),
            ))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
