//! Agent creation and the living population.
//!
//! The [`Population`] owns every living [`AgentState`] keyed by id and
//! hands out ids sequentially, so two runs with the same seed produce the
//! same ids. [`AgentBuilder`] assembles new agent records.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;

use sugarscape_types::{AgeRange, AgentId, AgentState, BitString, Position, Sex};

use crate::error::AgentError;

/// Every living agent, keyed by id.
#[derive(Debug, Default)]
pub struct Population {
    agents: BTreeMap<AgentId, AgentState>,
    next_id: u64,
}

impl Population {
    /// Create an empty population. The first allocated id is 1.
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserve a fresh id.
    pub fn allocate_id(&mut self) -> AgentId {
        let id = AgentId::new(self.next_id.max(1));
        self.next_id = id.into_inner().saturating_add(1);
        id
    }

    /// Add an agent record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateAgent`] if the id is already present.
    pub fn insert(&mut self, state: AgentState) -> Result<(), AgentError> {
        let id = state.id;
        if self.agents.contains_key(&id) {
            return Err(AgentError::DuplicateAgent(id));
        }
        // Keep the allocator ahead of externally built ids.
        if id.into_inner() >= self.next_id {
            self.next_id = id.into_inner().saturating_add(1);
        }
        self.agents.insert(id, state);
        Ok(())
    }

    /// Remove and return an agent.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentState> {
        self.agents.remove(&id)
    }

    /// Look up an agent.
    pub fn get(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(&id)
    }

    /// Look up an agent mutably.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.agents.get_mut(&id)
    }

    /// Whether the agent is alive.
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Number of living agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether everyone has died.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Living agent ids in ascending order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Living agent ids in a random order drawn from `rng`.
    pub fn shuffled_ids(&self, rng: &mut impl Rng) -> Vec<AgentId> {
        let mut ids = self.ids();
        ids.shuffle(rng);
        ids
    }

    /// Iterate over living agents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentState> {
        self.agents.values()
    }

    /// Iterate mutably over living agents in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AgentState> {
        self.agents.values_mut()
    }

    /// Sum of all agent sugar. Returns `None` on overflow.
    pub fn total_sugar(&self) -> Option<Decimal> {
        self.agents
            .values()
            .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a.sugar))
    }
}

/// Builder for [`AgentState`] records.
///
/// Unset fields get neutral defaults: 10 sugar (which is also the
/// reproduction threshold), metabolism 1, vision 1, age 0, `max_age` 100,
/// female, fertile from 12 to 50, eleven zero culture bits, and fifty zero
/// immunity bits.
#[derive(Debug, Clone)]
pub struct AgentBuilder {
    state: AgentState,
}

impl AgentBuilder {
    /// Start building an agent with the given id and position.
    pub fn new(id: AgentId, position: Position) -> Self {
        Self {
            state: AgentState {
                id,
                position,
                sugar: Decimal::new(10, 0),
                initial_sugar: Decimal::new(10, 0),
                metabolism: Decimal::ONE,
                vision: 1,
                age: 0,
                max_age: 100,
                sex: Sex::Female,
                fertility: AgeRange::new(12, 50),
                culture: BitString::zeros(11),
                children: Vec::new(),
                total_inheritance_received: Decimal::ZERO,
                loans_given: BTreeMap::new(),
                loans_owed: BTreeMap::new(),
                diseases: Vec::new(),
                immunity: BitString::zeros(50),
                has_reproduced: false,
                born_at_tick: 0,
            },
        }
    }

    /// Set the starting sugar and the reproduction threshold to `sugar`.
    #[must_use]
    pub const fn endowment(mut self, sugar: Decimal) -> Self {
        self.state.sugar = sugar;
        self.state.initial_sugar = sugar;
        self
    }

    /// Set the current sugar, leaving the threshold alone.
    #[must_use]
    pub const fn sugar(mut self, sugar: Decimal) -> Self {
        self.state.sugar = sugar;
        self
    }

    /// Set the reproduction threshold.
    #[must_use]
    pub const fn threshold(mut self, threshold: Decimal) -> Self {
        self.state.initial_sugar = threshold;
        self
    }

    /// Set the per-tick metabolism.
    #[must_use]
    pub const fn metabolism(mut self, metabolism: Decimal) -> Self {
        self.state.metabolism = metabolism;
        self
    }

    /// Set the vision radius.
    #[must_use]
    pub const fn vision(mut self, vision: u32) -> Self {
        self.state.vision = vision;
        self
    }

    /// Set the current age.
    #[must_use]
    pub const fn age(mut self, age: u32) -> Self {
        self.state.age = age;
        self
    }

    /// Set the age of death.
    #[must_use]
    pub const fn max_age(mut self, max_age: u32) -> Self {
        self.state.max_age = max_age;
        self
    }

    /// Set the sex.
    #[must_use]
    pub const fn sex(mut self, sex: Sex) -> Self {
        self.state.sex = sex;
        self
    }

    /// Set the fertility window.
    #[must_use]
    pub const fn fertility(mut self, fertility: AgeRange) -> Self {
        self.state.fertility = fertility;
        self
    }

    /// Set the culture bits.
    #[must_use]
    pub fn culture(mut self, culture: BitString) -> Self {
        self.state.culture = culture;
        self
    }

    /// Set the immunity bits.
    #[must_use]
    pub fn immunity(mut self, immunity: BitString) -> Self {
        self.state.immunity = immunity;
        self
    }

    /// Replace the disease bag.
    #[must_use]
    pub fn diseases(mut self, diseases: Vec<BitString>) -> Self {
        self.state.diseases = diseases;
        self
    }

    /// Set the tick of birth.
    #[must_use]
    pub const fn born_at_tick(mut self, tick: u64) -> Self {
        self.state.born_at_tick = tick;
        self
    }

    /// Finish the record.
    pub fn build(self) -> AgentState {
        self.state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use super::*;

    fn agent(id: u64) -> AgentState {
        AgentBuilder::new(AgentId::new(id), Position::new(0, 0)).build()
    }

    #[test]
    fn ids_are_sequential() {
        let mut pop = Population::new();
        assert_eq!(pop.allocate_id(), AgentId::new(1));
        assert_eq!(pop.allocate_id(), AgentId::new(2));
    }

    #[test]
    fn insert_keeps_allocator_ahead() {
        let mut pop = Population::new();
        pop.insert(agent(7)).unwrap();
        assert_eq!(pop.allocate_id(), AgentId::new(8));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut pop = Population::new();
        pop.insert(agent(3)).unwrap();
        assert!(matches!(
            pop.insert(agent(3)),
            Err(AgentError::DuplicateAgent(_))
        ));
    }

    #[test]
    fn remove_and_lookup() {
        let mut pop = Population::new();
        pop.insert(agent(1)).unwrap();
        pop.insert(agent(2)).unwrap();
        assert_eq!(pop.len(), 2);
        assert!(pop.remove(AgentId::new(1)).is_some());
        assert!(!pop.contains(AgentId::new(1)));
        assert_eq!(pop.ids(), vec![AgentId::new(2)]);
    }

    #[test]
    fn shuffle_is_seed_reproducible() {
        let mut pop = Population::new();
        for id in 1..=20 {
            pop.insert(agent(id)).unwrap();
        }
        let a = pop.shuffled_ids(&mut SmallRng::seed_from_u64(11));
        let b = pop.shuffled_ids(&mut SmallRng::seed_from_u64(11));
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn total_sugar_sums_agents() {
        let mut pop = Population::new();
        pop.insert(
            AgentBuilder::new(AgentId::new(1), Position::new(0, 0))
                .sugar(dec!(4.5))
                .build(),
        )
        .unwrap();
        pop.insert(
            AgentBuilder::new(AgentId::new(2), Position::new(1, 0))
                .sugar(dec!(-1))
                .build(),
        )
        .unwrap();
        assert_eq!(pop.total_sugar(), Some(dec!(3.5)));
    }

    #[test]
    fn builder_endowment_sets_threshold() {
        let state = AgentBuilder::new(AgentId::new(1), Position::new(2, 3))
            .endowment(dec!(25))
            .build();
        assert_eq!(state.sugar, dec!(25));
        assert_eq!(state.initial_sugar, dec!(25));
        assert_eq!(state.position, Position::new(2, 3));
    }
}
