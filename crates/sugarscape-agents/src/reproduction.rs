//! Sexual reproduction.
//!
//! A focal agent pairs with opposite-sex agents within its vision, in
//! neighbour order. A pair is eligible when both partners are inside their
//! fertility window and each holds at least its own reproduction threshold.
//! Each parent gives half its current sugar to the child, which is placed
//! on an empty cell next to either parent. The focal agent keeps pairing
//! until no eligible partner remains or no empty cell can be found.
//!
//! The child takes vision and metabolism each from a random parent, and
//! every culture and immunity bit from a random parent. Its reproduction
//! threshold is its starting endowment.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tracing::info;

use sugarscape_ledger::FlowKind;
use sugarscape_types::{AgentId, AgentState, BitString, Position, Sex};

use crate::counters::bump;
use crate::error::{AgentError, overflow};
use crate::population::AgentBuilder;
use crate::society::Society;

/// A child produced during reproduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthRecord {
    /// The newborn.
    pub child: AgentId,
    /// The focal parent.
    pub first_parent: AgentId,
    /// The partner.
    pub second_parent: AgentId,
    /// Where the child was placed.
    pub position: Position,
    /// Sugar the child starts with.
    pub endowment: Decimal,
}

/// Whether `a` and `b` may reproduce together right now.
pub fn is_eligible_pair(a: &AgentState, b: &AgentState) -> bool {
    a.id != b.id
        && a.sex != b.sex
        && a.is_fertile()
        && b.is_fertile()
        && a.sugar >= a.initial_sugar
        && b.sugar >= b.initial_sugar
}

/// Empty cells adjacent to either parent, without duplicates.
fn birth_cells(society: &Society, a: Position, b: Position) -> Vec<Position> {
    let mut cells = society.grid.empty_adjacent_cells(a);
    for cell in society.grid.empty_adjacent_cells(b) {
        if !cells.contains(&cell) {
            cells.push(cell);
        }
    }
    cells
}

fn half(value: Decimal) -> Result<Decimal, AgentError> {
    value
        .checked_div(Decimal::TWO)
        .ok_or_else(|| overflow("halving parent sugar"))
}

/// Create a child of `first` and `second` on `position`.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn give_birth(
    society: &mut Society,
    first: AgentId,
    second: AgentId,
    position: Position,
    rng: &mut impl Rng,
) -> Result<BirthRecord, AgentError> {
    let a = society.agent(first)?;
    let b = society.agent(second)?;
    let from_a = half(a.sugar.max(Decimal::ZERO))?;
    let from_b = half(b.sugar.max(Decimal::ZERO))?;
    let endowment = from_a
        .checked_add(from_b)
        .ok_or_else(|| overflow("child endowment"))?;

    let sex = if rng.random::<bool>() {
        Sex::Female
    } else {
        Sex::Male
    };
    let vision = if rng.random::<bool>() { a.vision } else { b.vision };
    let metabolism = if rng.random::<bool>() {
        a.metabolism
    } else {
        b.metabolism
    };
    let culture = BitString::crossover(&a.culture, &b.culture, rng);
    let immunity = BitString::crossover(&a.immunity, &b.immunity, rng);
    let max_age = society.config.lifespan.sample(rng);
    let fertility = society.config.fertility_for(sex);

    let child = society.population.allocate_id();
    let state = AgentBuilder::new(child, position)
        .sugar(Decimal::ZERO)
        .threshold(endowment)
        .metabolism(metabolism)
        .vision(vision)
        .max_age(max_age)
        .sex(sex)
        .fertility(fertility)
        .culture(culture)
        .immunity(immunity)
        .born_at_tick(society.tick)
        .build();
    society.add_agent(state)?;

    society.transfer(FlowKind::Endowment, first, child, from_a)?;
    society.transfer(FlowKind::Endowment, second, child, from_b)?;

    for parent in [first, second] {
        let state = society.agent_mut(parent)?;
        state.children.push(child);
        state.has_reproduced = true;
    }
    bump(&mut society.counters.births);

    info!(
        tick = society.tick,
        child = %child,
        first_parent = %first,
        second_parent = %second,
        %position,
        %endowment,
        "Agent born"
    );

    Ok(BirthRecord {
        child,
        first_parent: first,
        second_parent: second,
        position,
        endowment,
    })
}

/// Resolve reproduction for one focal agent.
///
/// With `only_with` set, the focal agent considers that partner alone.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn reproduce(
    society: &mut Society,
    focal: AgentId,
    only_with: Option<AgentId>,
    rng: &mut impl Rng,
) -> Result<Vec<BirthRecord>, AgentError> {
    let me = society.agent(focal)?;
    let neighbours: Vec<AgentId> = society
        .grid
        .agents_in_vision(me.position, me.vision)
        .into_iter()
        .map(|(id, _, _)| id)
        .filter(|id| only_with.is_none_or(|partner| partner == *id))
        .collect();

    let mut paired = BTreeSet::new();
    let mut births = Vec::new();
    for partner in neighbours {
        if paired.contains(&partner) || !society.is_alive(partner) {
            continue;
        }
        let me = society.agent(focal)?;
        let other = society.agent(partner)?;
        if !is_eligible_pair(me, other) {
            continue;
        }
        let cells = birth_cells(society, me.position, other.position);
        let Some(&cell) = cells.choose(rng) else {
            break;
        };
        births.push(give_birth(society, focal, partner, cell, rng)?);
        paired.insert(partner);
    }
    Ok(births)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;
    use sugarscape_types::AgeRange;
    use sugarscape_world::Grid;

    use super::*;
    use crate::config::RuleConfig;

    fn society(width: u32, height: u32) -> Society {
        let cells = usize::try_from(width * height).unwrap();
        let grid = Grid::from_capacities(width, height, &vec![Decimal::ZERO; cells]).unwrap();
        Society::new(grid, RuleConfig::default())
    }

    fn parent(id: u64, x: u32, y: u32, sex: Sex, sugar: Decimal) -> AgentState {
        AgentBuilder::new(AgentId::new(id), Position::new(x, y))
            .endowment(sugar)
            .sex(sex)
            .age(20)
            .fertility(AgeRange::new(12, 50))
            .vision(1)
            .build()
    }

    #[test]
    fn wealth_split_gives_child_half_of_each() {
        let mut s = society(4, 4);
        s.tick = 3;
        let mom = s.add_agent(parent(1, 1, 1, Sex::Female, dec!(20))).unwrap();
        let dad = s.add_agent(parent(2, 2, 1, Sex::Male, dec!(20))).unwrap();
        let opening = s.total_sugar().unwrap();

        let births = reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(4)).unwrap();
        assert_eq!(births.len(), 1);
        let birth = births[0];
        assert_eq!(birth.endowment, dec!(20));
        assert_eq!(s.agent(mom).unwrap().sugar, dec!(10));
        assert_eq!(s.agent(dad).unwrap().sugar, dec!(10));

        let child = s.agent(birth.child).unwrap();
        assert_eq!(child.sugar, dec!(20));
        assert_eq!(child.initial_sugar, dec!(20));
        assert_eq!(child.age, 0);
        assert_eq!(child.born_at_tick, 3);
        assert!(child.diseases.is_empty());
        assert_eq!(s.grid.occupant(birth.position), Some(birth.child));
        assert!(birth.position.distance(Position::new(1, 1)) == 1
            || birth.position.distance(Position::new(2, 1)) == 1);

        assert_eq!(s.agent(mom).unwrap().children, vec![birth.child]);
        assert_eq!(s.agent(dad).unwrap().children, vec![birth.child]);
        assert!(s.agent(mom).unwrap().has_reproduced);
        assert_eq!(s.counters.births, 1);

        let closing = s.total_sugar().unwrap();
        assert!(s.ledger.verify_conservation(3, opening, closing).is_balanced());
    }

    #[test]
    fn child_bits_come_from_parents() {
        let mut s = society(4, 1);
        let mom = s
            .add_agent(
                AgentBuilder::new(AgentId::new(1), Position::new(1, 0))
                    .endowment(dec!(10))
                    .age(20)
                    .culture("1111".parse().unwrap())
                    .immunity("111111".parse().unwrap())
                    .build(),
            )
            .unwrap();
        s.add_agent(
            AgentBuilder::new(AgentId::new(2), Position::new(2, 0))
                .endowment(dec!(10))
                .age(20)
                .sex(Sex::Male)
                .culture("1111".parse().unwrap())
                .immunity("111111".parse().unwrap())
                .build(),
        )
        .unwrap();

        let births = reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(8)).unwrap();
        let child = s.agent(births[0].child).unwrap();
        assert_eq!(child.culture.to_string(), "1111");
        assert_eq!(child.immunity.to_string(), "111111");
        assert!((60..=100).contains(&child.max_age));
    }

    #[test]
    fn ineligible_pairs_do_not_reproduce() {
        let mut s = society(4, 1);
        let mom = s.add_agent(parent(1, 0, 0, Sex::Female, dec!(20))).unwrap();
        // Same sex.
        s.add_agent(parent(2, 1, 0, Sex::Female, dec!(20))).unwrap();
        assert!(reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(1)).unwrap().is_empty());

        // Opposite sex but below its threshold.
        let mut s = society(4, 1);
        let mom = s.add_agent(parent(1, 0, 0, Sex::Female, dec!(20))).unwrap();
        let dad = s.add_agent(parent(2, 1, 0, Sex::Male, dec!(20))).unwrap();
        s.agent_mut(dad).unwrap().sugar = dec!(19);
        assert!(reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(1)).unwrap().is_empty());

        // Opposite sex but too young.
        s.agent_mut(dad).unwrap().sugar = dec!(20);
        s.agent_mut(dad).unwrap().age = 5;
        assert!(reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(1)).unwrap().is_empty());
    }

    #[test]
    fn no_space_means_no_child() {
        // A 2x1 grid has no empty cell next to either parent.
        let mut s = society(2, 1);
        let mom = s.add_agent(parent(1, 0, 0, Sex::Female, dec!(20))).unwrap();
        s.add_agent(parent(2, 1, 0, Sex::Male, dec!(20))).unwrap();
        let births = reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(1)).unwrap();
        assert!(births.is_empty());
        assert_eq!(s.agent(mom).unwrap().sugar, dec!(20));
    }

    #[test]
    fn focal_keeps_pairing_while_eligible() {
        let mut s = society(5, 5);
        let mom = s
            .add_agent(
                AgentBuilder::new(AgentId::new(1), Position::new(2, 2))
                    .sugar(dec!(40))
                    .threshold(dec!(5))
                    .age(20)
                    .vision(1)
                    .build(),
            )
            .unwrap();
        s.add_agent(parent(2, 2, 1, Sex::Male, dec!(10))).unwrap();
        s.add_agent(parent(3, 3, 2, Sex::Male, dec!(10))).unwrap();

        let births = reproduce(&mut s, mom, None, &mut SmallRng::seed_from_u64(2)).unwrap();
        // 40 -> 20 -> 10, still at or above the threshold of 5.
        assert_eq!(births.len(), 2);
        assert_eq!(s.agent(mom).unwrap().sugar, dec!(10));
        assert_eq!(s.agent(mom).unwrap().children.len(), 2);
    }

    #[test]
    fn named_partner_restricts_pairing() {
        let mut s = society(5, 5);
        let mom = s
            .add_agent(
                AgentBuilder::new(AgentId::new(1), Position::new(2, 2))
                    .sugar(dec!(40))
                    .threshold(dec!(5))
                    .age(20)
                    .vision(1)
                    .build(),
            )
            .unwrap();
        s.add_agent(parent(2, 2, 1, Sex::Male, dec!(10))).unwrap();
        let chosen = s.add_agent(parent(3, 3, 2, Sex::Male, dec!(10))).unwrap();

        let births =
            reproduce(&mut s, mom, Some(chosen), &mut SmallRng::seed_from_u64(2)).unwrap();
        assert_eq!(births.len(), 1);
        assert_eq!(births[0].second_parent, chosen);
    }
}
