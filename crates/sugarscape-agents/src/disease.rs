//! Disease and immunity.
//!
//! Diseases and immunity are both bit strings. A disease is neutralised
//! when it occurs as a contiguous run inside the carrier's immunity string.
//! Every uncovered disease costs one unit of sugar per tick and provokes an
//! immune response: one bit of the immunity window closest to the disease
//! is flipped towards it. Repeated exposure therefore always ends in
//! coverage, after at most `strain length` responses.
//!
//! Diseases are never cured. Carriers keep passing every strain they hold
//! to adjacent agents that lack it.
//!
//! Transmission is sequential and in place: carriers are visited in the
//! tick's shuffled order and each one writes straight into its neighbours'
//! disease lists. A strain picked up earlier in the pass is passed on again
//! if its new carrier is visited later, so a strain can cross several
//! agents in one tick. Which chains form depends on the order, which in
//! turn is fixed by the seed.

use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tracing::debug;

use sugarscape_ledger::FlowKind;
use sugarscape_types::{AgentId, AgentState, BitString};

use crate::counters::bump;
use crate::error::AgentError;
use crate::society::Society;

/// Sugar charged per uncovered disease per tick.
pub const DISEASE_PENALTY: Decimal = Decimal::ONE;

/// Result of one immune response pass for an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImmuneReport {
    /// Diseases not covered by immunity at the start of the pass.
    pub uncovered: u32,
    /// Immunity bits flipped.
    pub flips: u32,
    /// Sugar charged.
    pub penalty: Decimal,
}

/// Whether `disease` is neutralised by the agent's immunity.
pub fn is_covered(agent: &AgentState, disease: &BitString) -> bool {
    agent.immunity.contains_subsequence(disease)
}

/// Flip one immunity bit towards `disease`.
///
/// Picks uniformly among the immunity windows closest to the disease, then
/// uniformly among the mismatching bits of that window. Returns `false`
/// when nothing could be flipped (already covered, or the disease is longer
/// than the immunity string).
pub fn adapt_immunity(immunity: &mut BitString, disease: &BitString, rng: &mut impl Rng) -> bool {
    let (distance, windows) = immunity.closest_windows(disease);
    if distance == 0 {
        return false;
    }
    let Some(&offset) = windows.choose(rng) else {
        return false;
    };
    let mismatches = immunity.mismatches_at(disease, offset);
    let Some(&index) = mismatches.choose(rng) else {
        return false;
    };
    immunity.flip(index)
}

/// Run the immune response for one agent.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn immune_response(
    society: &mut Society,
    id: AgentId,
    rng: &mut impl Rng,
) -> Result<ImmuneReport, AgentError> {
    let agent = society.agent(id)?;
    let uncovered: Vec<BitString> = agent
        .diseases
        .iter()
        .filter(|disease| !is_covered(agent, disease))
        .cloned()
        .collect();

    let mut report = ImmuneReport::default();
    for disease in &uncovered {
        let flipped = adapt_immunity(&mut society.agent_mut(id)?.immunity, disease, rng);
        society.burn(FlowKind::DiseasePenalty, id, DISEASE_PENALTY)?;
        report.uncovered = report.uncovered.saturating_add(1);
        report.penalty = report.penalty.saturating_add(DISEASE_PENALTY);
        if flipped {
            report.flips = report.flips.saturating_add(1);
            bump(&mut society.counters.immune_responses);
        }
    }
    if report.uncovered > 0 {
        debug!(
            tick = society.tick,
            agent_id = %id,
            uncovered = report.uncovered,
            penalty = %report.penalty,
            "Immune response"
        );
    }
    Ok(report)
}

/// Copy every strain the focal agent carries to each adjacent agent that
/// lacks it. Returns the number of strains copied.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] if the focal agent is missing.
pub fn transmit_diseases(society: &mut Society, focal: AgentId) -> Result<u32, AgentError> {
    let me = society.agent(focal)?;
    if me.diseases.is_empty() {
        return Ok(0);
    }
    let strains = me.diseases.clone();
    let neighbours = society.grid.adjacent_agents(me.position);

    let mut copied: u32 = 0;
    for neighbour in neighbours {
        let Some(other) = society.population.get_mut(neighbour) else {
            continue;
        };
        for strain in &strains {
            if !other.diseases.contains(strain) {
                other.diseases.push(strain.clone());
                copied = copied.saturating_add(1);
            }
        }
    }
    society.counters.disease_transmissions = society
        .counters
        .disease_transmissions
        .saturating_add(u64::from(copied));
    if copied > 0 {
        debug!(tick = society.tick, from = %focal, copied, "Diseases transmitted");
    }
    Ok(copied)
}

/// Generate up to `count` distinct random strains of `length` bits.
///
/// Fewer are returned when `length` is too short to hold `count` distinct
/// strings.
pub fn generate_strains(count: usize, length: usize, rng: &mut impl Rng) -> Vec<BitString> {
    let mut strains: Vec<BitString> = Vec::with_capacity(count);
    if length == 0 {
        return strains;
    }
    let attempts = count.saturating_mul(16);
    for _ in 0..attempts {
        if strains.len() >= count {
            break;
        }
        let strain = BitString::random(length, rng);
        if !strains.contains(&strain) {
            strains.push(strain);
        }
    }
    strains
}

/// Draw `count` distinct strains from `pool` for a new host.
pub fn initial_infections(pool: &[BitString], count: usize, rng: &mut impl Rng) -> Vec<BitString> {
    pool.choose_multiple(rng, count).cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;
    use sugarscape_types::Position;
    use sugarscape_world::Grid;

    use super::*;
    use crate::config::RuleConfig;
    use crate::population::AgentBuilder;

    fn society() -> Society {
        let grid = Grid::from_capacities(3, 3, &[Decimal::ZERO; 9]).unwrap();
        Society::new(grid, RuleConfig::default())
    }

    fn carrier(s: &mut Society, id: u64, x: u32, y: u32, immunity: &str, diseases: &[&str]) -> AgentId {
        s.add_agent(
            AgentBuilder::new(AgentId::new(id), Position::new(x, y))
                .sugar(dec!(10))
                .immunity(immunity.parse().unwrap())
                .diseases(diseases.iter().map(|d| d.parse().unwrap()).collect())
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn covered_disease_costs_nothing() {
        let mut s = society();
        let a = carrier(&mut s, 1, 0, 0, "0011010", &["101"]);
        let report = immune_response(&mut s, a, &mut SmallRng::seed_from_u64(1)).unwrap();
        assert_eq!(report, ImmuneReport::default());
        assert_eq!(s.agent(a).unwrap().sugar, dec!(10));
        assert_eq!(s.agent(a).unwrap().immunity.to_string(), "0011010");
    }

    #[test]
    fn uncovered_disease_costs_one_and_flips_one_bit() {
        let mut s = society();
        let a = carrier(&mut s, 1, 0, 0, "000000", &["111"]);
        let before = s.agent(a).unwrap().immunity.clone();
        let report = immune_response(&mut s, a, &mut SmallRng::seed_from_u64(3)).unwrap();
        assert_eq!(report.uncovered, 1);
        assert_eq!(report.flips, 1);
        assert_eq!(report.penalty, dec!(1));
        assert_eq!(s.agent(a).unwrap().sugar, dec!(9));

        let after = &s.agent(a).unwrap().immunity;
        let changed = before
            .as_slice()
            .iter()
            .zip(after.as_slice())
            .filter(|(x, y)| x != y)
            .count();
        assert_eq!(changed, 1);
        assert_eq!(s.counters.immune_responses, 1);
        // Diseases are never removed.
        assert_eq!(s.agent(a).unwrap().diseases.len(), 1);
    }

    #[test]
    fn repeated_exposure_reaches_coverage() {
        let mut immunity: BitString = "0000000000".parse().unwrap();
        let disease: BitString = "1011".parse().unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..disease.len() {
            if immunity.contains_subsequence(&disease) {
                break;
            }
            assert!(adapt_immunity(&mut immunity, &disease, &mut rng));
        }
        assert!(immunity.contains_subsequence(&disease));
        assert!(!adapt_immunity(&mut immunity, &disease, &mut rng));
    }

    #[test]
    fn each_uncovered_strain_is_charged() {
        let mut s = society();
        let a = carrier(&mut s, 1, 0, 0, "0000000000", &["11", "101", "00"]);
        let opening = s.total_sugar().unwrap();
        let report = immune_response(&mut s, a, &mut SmallRng::seed_from_u64(5)).unwrap();
        assert_eq!(report.uncovered, 2);
        assert_eq!(s.agent(a).unwrap().sugar, dec!(8));
        let closing = s.total_sugar().unwrap();
        assert!(s.ledger.verify_conservation(0, opening, closing).is_balanced());
    }

    #[test]
    fn transmission_copies_missing_strains_to_neighbours() {
        let mut s = society();
        let sick = carrier(&mut s, 1, 1, 1, "0000", &["11", "01"]);
        let partly = carrier(&mut s, 2, 1, 0, "0000", &["11"]);
        let healthy = carrier(&mut s, 3, 2, 1, "0000", &[]);
        let far = carrier(&mut s, 4, 0, 0, "0000", &[]);

        let copied = transmit_diseases(&mut s, sick).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(s.agent(partly).unwrap().diseases.len(), 2);
        assert_eq!(s.agent(healthy).unwrap().diseases.len(), 2);
        assert!(s.agent(far).unwrap().diseases.is_empty());
        assert_eq!(s.counters.disease_transmissions, 3);

        // Transmission is directional: the healthy agent gives nothing back.
        assert_eq!(transmit_diseases(&mut s, far).unwrap(), 0);
        assert_eq!(s.agent(sick).unwrap().diseases.len(), 2);
    }

    #[test]
    fn transmission_chains_follow_visit_order() {
        // A row of three: only the west agent starts sick.
        let mut s = society();
        let west = carrier(&mut s, 1, 0, 1, "0000", &["11"]);
        let middle = carrier(&mut s, 2, 1, 1, "0000", &[]);
        let east = carrier(&mut s, 3, 2, 1, "0000", &[]);
        transmit_diseases(&mut s, west).unwrap();
        transmit_diseases(&mut s, middle).unwrap();
        assert_eq!(s.agent(east).unwrap().diseases.len(), 1);

        let mut s = society();
        let west = carrier(&mut s, 1, 0, 1, "0000", &["11"]);
        let middle = carrier(&mut s, 2, 1, 1, "0000", &[]);
        let east = carrier(&mut s, 3, 2, 1, "0000", &[]);
        transmit_diseases(&mut s, middle).unwrap();
        transmit_diseases(&mut s, west).unwrap();
        assert_eq!(s.agent(middle).unwrap().diseases.len(), 1);
        assert!(s.agent(east).unwrap().diseases.is_empty());
    }

    #[test]
    fn strain_pool_is_distinct() {
        let mut rng = SmallRng::seed_from_u64(42);
        let pool = generate_strains(10, 10, &mut rng);
        assert_eq!(pool.len(), 10);
        for (i, a) in pool.iter().enumerate() {
            assert!(pool.iter().skip(i + 1).all(|b| a != b));
        }
        let infections = initial_infections(&pool, 4, &mut rng);
        assert_eq!(infections.len(), 4);
        assert!(infections.iter().all(|d| pool.contains(d)));

        // Only four distinct 2-bit strings exist.
        assert_eq!(generate_strains(10, 2, &mut rng).len(), 4);
    }
}
