//! Cultural transmission.
//!
//! Each focal agent picks one random culture index per adjacent neighbour
//! and overwrites the neighbour's bit with its own. Tribe membership is
//! derived from the culture bits, so spreading culture can move an agent
//! across the tribal line.
//!
//! Spreading is sequential and in place, in the tick's shuffled order. A
//! bit an agent receives earlier in the pass is what it spreads when its
//! own turn comes, so the outcome of a tick depends on the visit order
//! fixed by the seed.

use rand::Rng;
use tracing::debug;

use sugarscape_types::AgentId;

use crate::error::AgentError;
use crate::society::Society;

/// Spread the focal agent's culture to each adjacent agent.
///
/// Returns the number of neighbour bits that actually changed.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] if the focal agent is missing.
pub fn spread_culture(
    society: &mut Society,
    focal: AgentId,
    rng: &mut impl Rng,
) -> Result<u32, AgentError> {
    let me = society.agent(focal)?;
    let culture = me.culture.clone();
    if culture.is_empty() {
        return Ok(0);
    }
    let neighbours = society.grid.adjacent_agents(me.position);

    let mut flips: u32 = 0;
    for neighbour in neighbours {
        let index = rng.random_range(0..culture.len());
        let Some(tag) = culture.get(index) else {
            continue;
        };
        let Some(other) = society.population.get_mut(neighbour) else {
            continue;
        };
        if other.culture.get(index).is_some_and(|bit| bit != tag) && other.culture.set(index, tag)
        {
            flips = flips.saturating_add(1);
            debug!(
                tick = society.tick,
                from = %focal,
                to = %neighbour,
                index,
                tribe = %other.tribe(),
                "Culture tag adopted"
            );
        }
    }
    Ok(flips)
}
