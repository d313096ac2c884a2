//! External decision oracle for the Sugarscape simulation.
//!
//! Once per tick the engine sends every living agent's [`AgentContext`] to
//! an external model in a single batch and receives one [`Decision`] per
//! agent, in the same order. This crate owns that round trip:
//!
//! - [`config`] -- Oracle settings loaded from YAML and `ORACLE_*` env vars
//! - [`prompt`] -- Prompt rendering with `minijinja` ([`PromptEngine`])
//! - [`llm`] -- OpenAI-compatible and Anthropic HTTP backends
//! - [`transport`] -- Blocking [`OracleTransport`] over HTTP or a script
//! - [`parse`] -- Strict reply validation
//! - [`client`] -- [`OracleClient`] with bounded retry
//! - [`error`] -- [`OracleError`]: API, schema, validation, prompt, config
//!
//! There is no silent fallback: a reply that fails validation is an error,
//! never a default decision.
//!
//! [`AgentContext`]: sugarscape_types::AgentContext
//! [`Decision`]: sugarscape_types::Decision

pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;
pub mod transport;

pub use client::{DecisionBatch, OracleClient};
pub use config::{BackendType, OracleConfig};
pub use error::{Location, OracleError};
pub use parse::parse_decisions;
pub use prompt::{PromptEngine, RenderedPrompt, RuleSummary};
pub use transport::{HttpTransport, OracleTransport, ScriptedTransport};
