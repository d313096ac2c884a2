//! Decision sources and the per-category gate every rule consults.
//!
//! A [`DecisionSource`] answers one question for the tick cycle: should
//! this agent act on this category, and with what payload? There are two
//! variants:
//!
//! - [`DecisionSource::RuleBased`] says yes to everything and leaves target
//!   selection to the rule heuristics.
//! - [`DecisionSource::ExternalOracle`] fetches one batch per tick from an
//!   [`OracleClient`] and answers from it. An agent missing from the batch
//!   (for example one born this tick) gets no decision, so gated rules skip
//!   it.
//!
//! Oracle failures are never papered over: [`DecisionSource::begin_tick`]
//! returns the typed error and the tick aborts.

use std::collections::BTreeMap;

use tracing::{debug, info};

use sugarscape_oracle::{OracleClient, OracleError};
use sugarscape_types::{AgentContext, AgentId, Decision, DecisionCategory};

/// Errors that can occur while collecting decisions.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The oracle could not produce a valid batch.
    #[error("oracle failed at tick {tick}: {source}")]
    Oracle {
        /// The tick whose decisions were requested.
        tick: u64,
        /// The underlying oracle error.
        #[source]
        source: OracleError,
    },

    /// The batch does not line up with the contexts sent.
    #[error("oracle returned {received} decisions for {expected} agents at tick {tick}")]
    BatchSize {
        /// The tick whose decisions were requested.
        tick: u64,
        /// Contexts submitted.
        expected: usize,
        /// Decisions returned.
        received: usize,
    },
}

impl DecisionError {
    /// The agent named by the underlying oracle error, if any.
    pub const fn agent_id(&self) -> Option<AgentId> {
        match self {
            Self::Oracle { source, .. } => source.agent_id(),
            Self::BatchSize { .. } => None,
        }
    }
}

/// Where agents' decisions come from.
pub enum DecisionSource {
    /// Every category is affirmative; the rules choose targets.
    RuleBased,
    /// Decisions come from an external oracle, one batch per tick.
    ExternalOracle(Box<OracleSource>),
}

/// Oracle-backed decisions for the tick in progress.
pub struct OracleSource {
    client: OracleClient,
    current: BTreeMap<AgentId, Decision>,
    tick: Option<u64>,
}

impl OracleSource {
    /// Wrap a configured client.
    pub const fn new(client: OracleClient) -> Self {
        Self {
            client,
            current: BTreeMap::new(),
            tick: None,
        }
    }

    /// The tick the held batch belongs to.
    pub const fn tick(&self) -> Option<u64> {
        self.tick
    }

    /// Number of agents with a decision this tick.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether no decisions are held.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

impl DecisionSource {
    /// The rule-based source.
    pub const fn rule_based() -> Self {
        Self::RuleBased
    }

    /// An oracle-backed source.
    pub fn oracle(client: OracleClient) -> Self {
        Self::ExternalOracle(Box::new(OracleSource::new(client)))
    }

    /// Whether decisions come from an external oracle.
    pub const fn is_oracle(&self) -> bool {
        matches!(self, Self::ExternalOracle(_))
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule-based",
            Self::ExternalOracle(_) => "external-oracle",
        }
    }

    /// Prepare decisions for `tick`.
    ///
    /// The rule-based source ignores `contexts`. The oracle source sends
    /// them as one batch and holds the validated reply until the next
    /// call. Any previous batch is dropped first, so a failed tick leaves
    /// no stale decisions behind.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError::Oracle`] when the oracle fails after its
    /// retries or returns an invalid reply.
    pub fn begin_tick(
        &mut self,
        tick: u64,
        contexts: &[AgentContext],
    ) -> Result<(), DecisionError> {
        let Self::ExternalOracle(source) = self else {
            return Ok(());
        };
        source.current.clear();
        source.tick = None;

        let batch = source
            .client
            .decide(tick, contexts)
            .map_err(|err| DecisionError::Oracle { tick, source: err })?;
        if batch.decisions.len() != contexts.len() {
            return Err(DecisionError::BatchSize {
                tick,
                expected: contexts.len(),
                received: batch.decisions.len(),
            });
        }

        source.current = contexts
            .iter()
            .map(|ctx| ctx.agent_id)
            .zip(batch.decisions)
            .collect();
        source.tick = Some(tick);

        info!(
            tick,
            agents = source.current.len(),
            attempts = batch.attempts,
            "Oracle decisions received"
        );
        Ok(())
    }

    /// The decision for `agent` in `category`, if one exists.
    ///
    /// The rule-based source always answers with
    /// [`Decision::affirmative`].
    pub fn decision_for(&self, agent: AgentId, category: DecisionCategory) -> Option<Decision> {
        match self {
            Self::RuleBased => Some(Decision::affirmative()),
            Self::ExternalOracle(source) => {
                let decision = source.current.get(&agent).copied();
                if decision.is_none() {
                    debug!(agent_id = %agent, %category, "No oracle decision for agent");
                }
                decision
            }
        }
    }

    /// Whether `agent` should act on `category` this tick: a decision
    /// exists and its flag is set.
    pub fn should_act(&self, agent: AgentId, category: DecisionCategory) -> bool {
        self.decision_for(agent, category)
            .is_some_and(|decision| decision.flag(category))
    }
}
