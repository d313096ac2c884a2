//! Inheritance of a dying agent's sugar.
//!
//! The estate is split equally among living children using floor division,
//! so every heir receives the same whole number of sugar units. Whatever
//! cannot be split, and the whole estate when there are no heirs, is
//! discarded.

use rust_decimal::Decimal;
use tracing::debug;

use sugarscape_ledger::FlowKind;
use sugarscape_types::AgentId;

use crate::error::{AgentError, overflow};
use crate::society::Society;

/// How an estate was distributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceOutcome {
    /// Sugar the dying agent held.
    pub estate: Decimal,
    /// Children that received a share.
    pub heirs: Vec<AgentId>,
    /// Amount credited to each heir.
    pub share: Decimal,
    /// Sugar discarded.
    pub discarded: Decimal,
}

/// Split the dying agent's sugar among `heirs`.
///
/// The dying agent's balance must already be non-negative; a negative
/// balance is treated as an empty estate. Leaves the dying agent at zero.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn distribute_estate(
    society: &mut Society,
    dying: AgentId,
    heirs: &[AgentId],
) -> Result<InheritanceOutcome, AgentError> {
    let estate = society.agent(dying)?.sugar;
    let mut outcome = InheritanceOutcome {
        estate,
        heirs: Vec::new(),
        share: Decimal::ZERO,
        discarded: Decimal::ZERO,
    };
    if estate <= Decimal::ZERO {
        return Ok(outcome);
    }

    if !heirs.is_empty() {
        let count = Decimal::from(heirs.len());
        let share = estate
            .checked_div(count)
            .ok_or_else(|| overflow("inheritance share"))?
            .floor();
        for &heir in heirs {
            society.transfer(FlowKind::Inheritance, dying, heir, share)?;
            let child = society.agent_mut(heir)?;
            child.total_inheritance_received = child
                .total_inheritance_received
                .checked_add(share)
                .ok_or_else(|| overflow("inheritance received"))?;
        }
        let transferred = share
            .checked_mul(count)
            .ok_or_else(|| overflow("inheritance total"))?;

        let counters = &mut society.counters;
        counters.total_inheritances = counters
            .total_inheritances
            .saturating_add(u64::try_from(heirs.len()).unwrap_or(u64::MAX));
        counters.total_inheritance_value = counters
            .total_inheritance_value
            .checked_add(estate)
            .ok_or_else(|| overflow("inheritance value counter"))?;
        counters.generational_wealth_transferred = counters
            .generational_wealth_transferred
            .checked_add(transferred)
            .ok_or_else(|| overflow("generational wealth counter"))?;

        outcome.heirs = heirs.to_vec();
        outcome.share = share;
        debug!(tick = society.tick, %dying, %estate, %share, heirs = heirs.len(), "Estate inherited");
    }

    let remainder = society.agent(dying)?.sugar;
    if remainder > Decimal::ZERO {
        society.burn(FlowKind::Discard, dying, remainder)?;
        outcome.discarded = remainder;
    }
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use sugarscape_types::Position;
    use sugarscape_world::Grid;

    use super::*;
    use crate::config::RuleConfig;
    use crate::population::AgentBuilder;

    fn society_with(sugars: &[Decimal]) -> (Society, Vec<AgentId>) {
        let width = u32::try_from(sugars.len()).unwrap();
        let grid = Grid::from_capacities(width, 1, &vec![Decimal::ZERO; sugars.len()]).unwrap();
        let mut s = Society::new(grid, RuleConfig::default());
        let mut ids = Vec::new();
        for (x, sugar) in sugars.iter().enumerate() {
            let id = AgentId::new(u64::try_from(x).unwrap() + 1);
            let state = AgentBuilder::new(id, Position::new(u32::try_from(x).unwrap(), 0))
                .sugar(*sugar)
                .build();
            ids.push(s.add_agent(state).unwrap());
        }
        (s, ids)
    }

    #[test]
    fn splits_evenly_between_two_children() {
        let (mut s, ids) = society_with(&[dec!(31), dec!(0), dec!(2)]);
        let (parent, a, b) = (ids[0], ids[1], ids[2]);
        let opening = s.total_sugar().unwrap();

        let outcome = distribute_estate(&mut s, parent, &[a, b]).unwrap();
        assert_eq!(outcome.share, dec!(15));
        assert_eq!(outcome.discarded, dec!(1));
        assert_eq!(s.agent(a).unwrap().sugar, dec!(15));
        assert_eq!(s.agent(b).unwrap().sugar, dec!(17));
        assert_eq!(s.agent(a).unwrap().total_inheritance_received, dec!(15));
        assert_eq!(s.agent(parent).unwrap().sugar, Decimal::ZERO);

        assert_eq!(s.counters.total_inheritances, 2);
        assert_eq!(s.counters.total_inheritance_value, dec!(31));
        assert_eq!(s.counters.generational_wealth_transferred, dec!(30));

        let closing = s.total_sugar().unwrap();
        assert!(s.ledger.verify_conservation(0, opening, closing).is_balanced());
    }

    #[test]
    fn no_heirs_discards_estate() {
        let (mut s, ids) = society_with(&[dec!(12)]);
        let outcome = distribute_estate(&mut s, ids[0], &[]).unwrap();
        assert_eq!(outcome.discarded, dec!(12));
        assert!(outcome.heirs.is_empty());
        assert_eq!(s.counters.total_inheritances, 0);
        assert_eq!(s.counters.total_inheritance_value, Decimal::ZERO);
    }

    #[test]
    fn empty_estate_moves_nothing() {
        let (mut s, ids) = society_with(&[dec!(0), dec!(3)]);
        let outcome = distribute_estate(&mut s, ids[0], &[ids[1]]).unwrap();
        assert_eq!(outcome.estate, Decimal::ZERO);
        assert_eq!(s.agent(ids[1]).unwrap().sugar, dec!(3));
        assert!(s.ledger.is_empty());
    }
}
