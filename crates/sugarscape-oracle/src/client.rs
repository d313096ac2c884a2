//! Batched oracle client with bounded retry.
//!
//! One call per tick: render every agent context into a single prompt, send
//! it, and validate the reply. Transport failures are retried up to
//! `max_attempts` times; schema and validation failures are returned at
//! once.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use sugarscape_types::{AgentContext, Decision};

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::parse::parse_decisions;
use crate::prompt::{PromptEngine, RuleSummary};
use crate::transport::{HttpTransport, OracleTransport};

/// Validated decisions for one tick, index-aligned with the contexts sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionBatch {
    /// The tick the decisions apply to.
    pub tick: u64,
    /// One decision per submitted context, in submission order.
    pub decisions: Vec<Decision>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// When the reply was accepted.
    pub received_at: DateTime<Utc>,
}

/// Client for the external decision oracle.
pub struct OracleClient {
    transport: Box<dyn OracleTransport>,
    prompts: PromptEngine,
    rules: RuleSummary,
    max_attempts: u32,
}

impl OracleClient {
    /// Create a client over an arbitrary transport.
    pub fn new(
        transport: Box<dyn OracleTransport>,
        prompts: PromptEngine,
        rules: RuleSummary,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            prompts,
            rules,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create an HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Config`] or [`OracleError::Prompt`] if the
    /// configuration is unusable.
    pub fn from_config(config: &OracleConfig, rules: RuleSummary) -> Result<Self, OracleError> {
        config.validate()?;
        let prompts = PromptEngine::new(config.templates_dir.as_deref())?;
        let transport = HttpTransport::new(config)?;
        info!(
            backend = transport.name(),
            model = %config.model,
            max_attempts = config.max_attempts,
            "Decision oracle configured"
        );
        Ok(Self::new(
            Box::new(transport),
            prompts,
            rules,
            config.max_attempts,
        ))
    }

    /// Obtain one decision per context for `tick`.
    ///
    /// An empty batch returns immediately without contacting the oracle.
    ///
    /// # Errors
    ///
    /// Returns the last [`OracleError::Api`] once attempts are exhausted,
    /// or the first schema, validation or prompt error.
    pub fn decide(
        &mut self,
        tick: u64,
        contexts: &[AgentContext],
    ) -> Result<DecisionBatch, OracleError> {
        if contexts.is_empty() {
            return Ok(DecisionBatch {
                tick,
                decisions: Vec::new(),
                attempts: 0,
                received_at: Utc::now(),
            });
        }

        let prompt = self.prompts.render(tick, &self.rules, contexts)?;
        let mut attempt: u32 = 1;
        loop {
            let started = Utc::now();
            match self.transport.complete(&prompt) {
                Ok(reply) => {
                    let decisions = parse_decisions(&reply, contexts)?;
                    let received_at = Utc::now();
                    debug!(
                        tick,
                        agents = contexts.len(),
                        attempt,
                        latency_ms = received_at.signed_duration_since(started).num_milliseconds(),
                        "Oracle batch accepted"
                    );
                    return Ok(DecisionBatch {
                        tick,
                        decisions,
                        attempts: attempt,
                        received_at,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        tick,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Oracle call failed, retrying"
                    );
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Attempts allowed per tick.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use sugarscape_types::{AgentId, BitString, Position, Sex, Tribe};

    use super::*;
    use crate::transport::ScriptedTransport;

    fn rules() -> RuleSummary {
        RuleSummary {
            combat_limit: Decimal::TEN,
            interest_rate: Decimal::ZERO,
            loan_duration: 10,
        }
    }

    fn context(id: u64) -> AgentContext {
        AgentContext {
            agent_id: AgentId::new(id),
            tick: 3,
            position: Position::new(0, 0),
            sugar: Decimal::TEN,
            metabolism: Decimal::ONE,
            vision: 1,
            age: 20,
            max_age: 80,
            sex: Sex::Female,
            tribe: Tribe::Blue,
            culture: BitString::zeros(3),
            fertile: true,
            reproduction_threshold: Decimal::TEN,
            loans_given: Vec::new(),
            loans_owed: Vec::new(),
            disease_count: 0,
            visible_cells: Vec::new(),
            visible_agents: Vec::new(),
        }
    }

    fn api_error() -> OracleError {
        OracleError::Api {
            status: Some(503),
            detail: "unavailable".to_owned(),
        }
    }

    const ONE_DECISION: &str =
        r#"[{"move": false, "combat": false, "credit": false, "reproduce": false}]"#;

    fn client(replies: Vec<Result<String, OracleError>>, attempts: u32) -> OracleClient {
        OracleClient::new(
            Box::new(ScriptedTransport::new(replies)),
            PromptEngine::new(None).unwrap(),
            rules(),
            attempts,
        )
    }

    #[test]
    fn transport_errors_are_retried() {
        let mut c = client(vec![Err(api_error()), Ok(ONE_DECISION.to_owned())], 3);
        let batch = c.decide(3, &[context(1)]).unwrap();
        assert_eq!(batch.attempts, 2);
        assert_eq!(batch.decisions, vec![Decision::abstain()]);
    }

    #[test]
    fn retries_are_bounded() {
        let mut c = client(
            vec![Err(api_error()), Err(api_error()), Err(api_error()), Ok(ONE_DECISION.to_owned())],
            3,
        );
        let err = c.decide(3, &[context(1)]).unwrap_err();
        assert!(matches!(err, OracleError::Api { status: Some(503), .. }));
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let mut c = client(
            vec![Ok("[{\"move\": false}]".to_owned()), Ok(ONE_DECISION.to_owned())],
            3,
        );
        let err = c.decide(3, &[context(1)]).unwrap_err();
        assert!(matches!(err, OracleError::Schema { field: "combat", .. }));
    }

    #[test]
    fn empty_batch_skips_the_oracle() {
        let mut c = client(Vec::new(), 3);
        let batch = c.decide(3, &[]).unwrap();
        assert!(batch.decisions.is_empty());
        assert_eq!(batch.attempts, 0);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut c = client(vec![Ok(ONE_DECISION.to_owned())], 0);
        assert_eq!(c.max_attempts(), 1);
        assert!(c.decide(3, &[context(1)]).is_ok());
    }
}
