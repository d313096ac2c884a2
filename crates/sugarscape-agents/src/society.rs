//! The mutable simulation state every rule operates on.
//!
//! A [`Society`] bundles the grid, the living population, the sugar
//! ledger, the aggregate counters, and the rule parameters. Rules receive
//! it by `&mut` rather than reaching for globals, and every balance change
//! goes through one of the helpers below so the ledger stays complete.

use rust_decimal::Decimal;
use tracing::debug;

use sugarscape_ledger::{FlowKind, Ledger, Party};
use sugarscape_types::{AgentId, AgentState, Position};
use sugarscape_world::Grid;

use crate::config::RuleConfig;
use crate::counters::SocietyCounters;
use crate::error::{AgentError, overflow};
use crate::population::Population;

/// Grid, agents, ledger, counters, and parameters for one simulation.
#[derive(Debug)]
pub struct Society {
    /// The sugar landscape and its occupancy index.
    pub grid: Grid,
    /// Every living agent.
    pub population: Population,
    /// Record of every sugar movement.
    pub ledger: Ledger,
    /// Running totals.
    pub counters: SocietyCounters,
    /// Rule parameters.
    pub config: RuleConfig,
    /// The tick currently being resolved.
    pub tick: u64,
}

impl Society {
    /// Create a society with no agents.
    pub fn new(grid: Grid, config: RuleConfig) -> Self {
        Self {
            grid,
            population: Population::new(),
            ledger: Ledger::new(),
            counters: SocietyCounters::default(),
            config,
            tick: 0,
        }
    }

    /// Look up a living agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`].
    pub fn agent(&self, id: AgentId) -> Result<&AgentState, AgentError> {
        self.population.get(id).ok_or(AgentError::AgentNotFound(id))
    }

    /// Look up a living agent mutably.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`].
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut AgentState, AgentError> {
        self.population
            .get_mut(id)
            .ok_or(AgentError::AgentNotFound(id))
    }

    /// Whether the agent is alive.
    pub fn is_alive(&self, id: AgentId) -> bool {
        self.population.contains(id)
    }

    /// Place a new agent on its cell and add it to the population.
    ///
    /// # Errors
    ///
    /// Returns a world error if the cell is taken or out of bounds, or
    /// [`AgentError::DuplicateAgent`].
    pub fn add_agent(&mut self, state: AgentState) -> Result<AgentId, AgentError> {
        let id = state.id;
        if self.population.contains(id) {
            return Err(AgentError::DuplicateAgent(id));
        }
        self.grid.place(id, state.position)?;
        self.population.insert(state)?;
        Ok(id)
    }

    /// Take an agent off the grid and out of the population.
    ///
    /// This does not touch loans or sugar; see
    /// [`process_death`](crate::death::process_death) for the full path.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`].
    pub fn remove_agent(&mut self, id: AgentId) -> Result<AgentState, AgentError> {
        let state = self
            .population
            .remove(id)
            .ok_or(AgentError::AgentNotFound(id))?;
        if self.grid.occupant(state.position) == Some(id) {
            self.grid.vacate(state.position)?;
        }
        Ok(state)
    }

    /// Sugar held by agents plus sugar lying on the grid.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ArithmeticOverflow`].
    pub fn total_sugar(&self) -> Result<Decimal, AgentError> {
        let agents = self
            .population
            .total_sugar()
            .ok_or_else(|| overflow("summing agent sugar"))?;
        let cells = self.grid.total_sugar()?;
        agents
            .checked_add(cells)
            .ok_or_else(|| overflow("summing total sugar"))
    }

    /// Regrow the landscape and record the new sugar as one source entry.
    ///
    /// # Errors
    ///
    /// Returns a world or ledger error.
    pub fn grow_back(&mut self, rate: Decimal) -> Result<Decimal, AgentError> {
        let grown = self.grid.grow_back(rate)?;
        self.ledger.record(
            self.tick,
            FlowKind::Growback,
            grown,
            Party::Environment,
            Party::Landscape,
        )?;
        Ok(grown)
    }

    /// Move all sugar on `pos` into the agent's wealth.
    ///
    /// # Errors
    ///
    /// Returns a world, ledger, or overflow error.
    pub fn harvest(&mut self, id: AgentId, pos: Position) -> Result<Decimal, AgentError> {
        let current = self.agent(id)?.sugar;
        let taken = self.grid.harvest(pos)?;
        let tick = self.tick;
        self.agent_mut(id)?.sugar = current
            .checked_add(taken)
            .ok_or_else(|| overflow("harvest"))?;
        self.ledger
            .record(tick, FlowKind::Harvest, taken, Party::Cell(pos), Party::Agent(id))?;
        Ok(taken)
    }

    /// Move `amount` of sugar from one agent to another.
    ///
    /// The sender's balance is not checked; callers size transfers from
    /// what the sender holds.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`], a ledger error, or overflow.
    pub fn transfer(
        &mut self,
        kind: FlowKind,
        from: AgentId,
        to: AgentId,
        amount: Decimal,
    ) -> Result<(), AgentError> {
        if from == to || amount.is_zero() {
            return Ok(());
        }
        let context = format!("{kind:?} transfer");
        let sender_balance = self
            .agent(from)?
            .sugar
            .checked_sub(amount)
            .ok_or_else(|| overflow(&context))?;
        let receiver_balance = self
            .agent(to)?
            .sugar
            .checked_add(amount)
            .ok_or_else(|| overflow(&context))?;
        self.ledger
            .record(self.tick, kind, amount, Party::Agent(from), Party::Agent(to))?;
        self.agent_mut(from)?.sugar = sender_balance;
        self.agent_mut(to)?.sugar = receiver_balance;
        debug!(tick = self.tick, ?kind, %from, %to, %amount, "Sugar transferred");
        Ok(())
    }

    /// Destroy `amount` of the agent's sugar through a sink flow.
    ///
    /// The balance may go negative; the death check handles that.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`], a ledger error, or overflow.
    pub fn burn(&mut self, kind: FlowKind, id: AgentId, amount: Decimal) -> Result<(), AgentError> {
        let balance = self
            .agent(id)?
            .sugar
            .checked_sub(amount)
            .ok_or_else(|| overflow("burning sugar"))?;
        self.ledger
            .record(self.tick, kind, amount, Party::Agent(id), Party::Void)?;
        self.agent_mut(id)?.sugar = balance;
        Ok(())
    }

    /// Lift a negative balance back to zero through a `DebtWriteOff` source.
    ///
    /// Returns the amount written off.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] or a ledger error.
    pub fn write_off_deficit(&mut self, id: AgentId) -> Result<Decimal, AgentError> {
        let balance = self.agent(id)?.sugar;
        if balance >= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let deficit = balance.abs();
        self.ledger.record(
            self.tick,
            FlowKind::DebtWriteOff,
            deficit,
            Party::Environment,
            Party::Agent(id),
        )?;
        self.agent_mut(id)?.sugar = Decimal::ZERO;
        Ok(deficit)
    }
}
