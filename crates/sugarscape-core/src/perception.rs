//! Perception assembly.
//!
//! Builds the [`AgentContext`] an external oracle sees for one agent: its
//! private state, its loan books, and everything inside its vision along
//! the four cardinal axes. Cells are listed own cell first, then in the
//! grid's N, E, S, W order, nearest first.

use std::collections::BTreeMap;

use sugarscape_agents::{AgentError, Society};
use sugarscape_types::{AgentContext, AgentId, Loan, LoanSummary, VisibleAgent, VisibleCell};

/// Build the context for one living agent.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] if `id` is not alive.
pub fn build_context(society: &Society, id: AgentId) -> Result<AgentContext, AgentError> {
    let agent = society.agent(id)?;
    let grid = &society.grid;

    let visible_cells = std::iter::once(agent.position)
        .chain(
            grid.cardinal_cells(agent.position, agent.vision)
                .into_iter()
                .map(|(pos, _)| pos),
        )
        .filter_map(|pos| {
            grid.sugar_at(pos).map(|sugar| VisibleCell {
                position: pos,
                sugar,
                occupant: grid.occupant(pos),
            })
        })
        .collect();

    let visible_agents = grid
        .agents_in_vision(agent.position, agent.vision)
        .into_iter()
        .filter_map(|(other, position, _)| {
            society.population.get(other).map(|state| VisibleAgent {
                id: other,
                position,
                sex: state.sex,
                tribe: state.tribe(),
                sugar: state.sugar,
                age: state.age,
                fertile: state.is_fertile(),
            })
        })
        .collect();

    Ok(AgentContext {
        agent_id: id,
        tick: society.tick,
        position: agent.position,
        sugar: agent.sugar,
        metabolism: agent.metabolism,
        vision: agent.vision,
        age: agent.age,
        max_age: agent.max_age,
        sex: agent.sex,
        tribe: agent.tribe(),
        culture: agent.culture.clone(),
        fertile: agent.is_fertile(),
        reproduction_threshold: agent.initial_sugar,
        loans_given: summarize(&agent.loans_given),
        loans_owed: summarize(&agent.loans_owed),
        disease_count: agent.diseases.len(),
        visible_cells,
        visible_agents,
    })
}

/// Build contexts for `ids`, in the given order.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] for the first id that is not alive.
pub fn build_contexts(society: &Society, ids: &[AgentId]) -> Result<Vec<AgentContext>, AgentError> {
    ids.iter().map(|&id| build_context(society, id)).collect()
}

fn summarize(book: &BTreeMap<AgentId, Vec<Loan>>) -> Vec<LoanSummary> {
    book.iter()
        .flat_map(|(&counterparty, loans)| {
            loans.iter().map(move |loan| LoanSummary {
                counterparty,
                amount: loan.amount,
                time_due: loan.time_due,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal_macros::dec;
    use sugarscape_agents::{AgentBuilder, RuleConfig};
    use sugarscape_types::{BitString, Position, Sex, Tribe};
    use sugarscape_world::Grid;

    use super::*;

    fn society() -> Society {
        let mut grid = Grid::new(5, 5).unwrap();
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set_capacity(pos, dec!(4)).unwrap();
            grid.set_sugar(pos, dec!(2)).unwrap();
        }
        Society::new(grid, RuleConfig::default())
    }

    #[test]
    fn context_reflects_private_state() {
        let mut s = society();
        s.tick = 7;
        let id = AgentId::new(1);
        s.add_agent(
            AgentBuilder::new(id, Position::new(2, 2))
                .endowment(dec!(12))
                .vision(2)
                .age(20)
                .culture("111".parse::<BitString>().unwrap())
                .diseases(vec![BitString::zeros(2)])
                .build(),
        )
        .unwrap();

        let ctx = build_context(&s, id).unwrap();
        assert_eq!(ctx.tick, 7);
        assert_eq!(ctx.sugar, dec!(12));
        assert_eq!(ctx.reproduction_threshold, dec!(12));
        assert_eq!(ctx.tribe, Tribe::Red);
        assert!(ctx.fertile);
        assert_eq!(ctx.disease_count, 1);
        // Own cell plus two cells in each of four directions.
        assert_eq!(ctx.visible_cells.len(), 9);
        assert_eq!(ctx.visible_cells[0].position, Position::new(2, 2));
        assert_eq!(ctx.visible_cells[0].occupant, Some(id));
        assert!(ctx.visible_agents.is_empty());
    }

    #[test]
    fn neighbours_and_loans_are_listed() {
        let mut s = society();
        let me = AgentId::new(1);
        let other = AgentId::new(2);
        let diagonal = AgentId::new(3);
        s.add_agent(AgentBuilder::new(me, Position::new(0, 0)).vision(3).build())
            .unwrap();
        s.add_agent(
            AgentBuilder::new(other, Position::new(0, 2))
                .sex(Sex::Male)
                .endowment(dec!(5))
                .build(),
        )
        .unwrap();
        s.add_agent(AgentBuilder::new(diagonal, Position::new(1, 1)).build())
            .unwrap();
        s.agent_mut(me).unwrap().loans_given.insert(
            other,
            vec![Loan {
                amount: dec!(3),
                time_due: 9,
            }],
        );

        let ctx = build_context(&s, me).unwrap();
        assert_eq!(ctx.visible_agents.len(), 1);
        assert_eq!(ctx.visible_agents[0].id, other);
        assert_eq!(ctx.visible_agents[0].sugar, dec!(5));
        assert_eq!(ctx.visible_agents[0].sex, Sex::Male);
        assert_eq!(ctx.loans_given.len(), 1);
        assert_eq!(ctx.loans_given[0].counterparty, other);
        assert_eq!(ctx.loans_given[0].time_due, 9);
        assert!(ctx.loans_owed.is_empty());
        // The corner agent sees only east and south.
        assert_eq!(ctx.visible_cells.len(), 7);
    }

    #[test]
    fn contexts_follow_the_requested_order() {
        let mut s = society();
        for (n, x) in [(1, 0), (2, 2), (3, 4)] {
            s.add_agent(AgentBuilder::new(AgentId::new(n), Position::new(x, 0)).build())
                .unwrap();
        }
        let order = [AgentId::new(3), AgentId::new(1), AgentId::new(2)];
        let ids: Vec<AgentId> = build_contexts(&s, &order)
            .unwrap()
            .into_iter()
            .map(|c| c.agent_id)
            .collect();
        assert_eq!(ids, order);
        assert!(build_contexts(&s, &[AgentId::new(9)]).is_err());
    }
}
