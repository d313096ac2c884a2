//! Error types for the decision oracle.
//!
//! Transport failures are retried by the client; everything else aborts the
//! tick immediately. A rejected response never degrades into a default
//! decision.

use sugarscape_types::AgentId;

/// Which part of an oracle response an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The response as a whole.
    Response,
    /// One decision in the response.
    Decision {
        /// Position in the batch.
        index: usize,
        /// The agent the decision belongs to.
        agent_id: AgentId,
    },
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Response => write!(f, "response"),
            Self::Decision { index, agent_id } => {
                write!(f, "decision {index} (agent {agent_id})")
            }
        }
    }
}

/// Errors that can occur while obtaining decisions from the oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached, timed out, or rejected the request.
    #[error("oracle API error: {detail}")]
    Api {
        /// HTTP status, when the server answered.
        status: Option<u16>,
        /// Human-readable description.
        detail: String,
    },

    /// A required field is missing from a decision.
    #[error("oracle schema error at {at}: missing required field `{field}`")]
    Schema {
        /// Where the field is missing.
        at: Location,
        /// The missing field.
        field: &'static str,
    },

    /// A field is present but unusable.
    #[error("oracle validation error at {at}: field `{field}` = {value}: {reason}")]
    Validation {
        /// Where the bad value was found.
        at: Location,
        /// The offending field.
        field: &'static str,
        /// The offending value, as received.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A prompt template failed to load or render.
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Oracle configuration is invalid or incomplete.
    #[error("oracle config error: {0}")]
    Config(String),
}

impl OracleError {
    /// Whether another attempt may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// The agent the error refers to, if it refers to one.
    pub const fn agent_id(&self) -> Option<AgentId> {
        match self {
            Self::Schema {
                at: Location::Decision { agent_id, .. },
                ..
            }
            | Self::Validation {
                at: Location::Decision { agent_id, .. },
                ..
            } => Some(*agent_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_api_errors_are_retryable() {
        let api = OracleError::Api {
            status: Some(503),
            detail: "unavailable".to_owned(),
        };
        assert!(api.is_retryable());
        let schema = OracleError::Schema {
            at: Location::Response,
            field: "decisions",
        };
        assert!(!schema.is_retryable());
        assert!(!OracleError::Prompt("bad".to_owned()).is_retryable());
    }

    #[test]
    fn messages_identify_agent_and_field() {
        let err = OracleError::Validation {
            at: Location::Decision {
                index: 2,
                agent_id: AgentId::new(17),
            },
            field: "combat_target_id",
            value: "\"bob\"".to_owned(),
            reason: "expected a non-negative integer agent id".to_owned(),
        };
        let message = err.to_string();
        assert!(message.contains("decision 2 (agent 17)"));
        assert!(message.contains("combat_target_id"));
        assert!(message.contains("\"bob\""));
        assert_eq!(err.agent_id(), Some(AgentId::new(17)));
    }
}
