//! Seed population for a new run.
//!
//! Builds the landscape from the `world` section, then places
//! `population.initial_agents` agents on distinct random cells. Each agent
//! samples its traits from the `population` ranges and gets a random
//! culture and immunity string. When disease is enabled it also carries
//! `disease.initial_infections` strains drawn without replacement from a
//! pool shared by the whole run.

use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tracing::{debug, info};

use sugarscape_agents::disease::initial_infections;
use sugarscape_agents::{AgentBuilder, Society, generate_strains};
use sugarscape_core::SimulationConfig;
use sugarscape_types::{AgentId, BitString, Position, Sex};
use sugarscape_world::generate_landscape;

use crate::error::EngineError;

/// The output of the spawner: a populated society and the strain pool its
/// infections were drawn from.
#[derive(Debug)]
pub struct SpawnResult {
    /// Grid, agents, ledger and rule parameters, ready for tick 1.
    pub society: Society,
    /// Disease strains in circulation.
    pub strains: Vec<BitString>,
    /// Seed agents in placement order.
    pub agents: Vec<AgentId>,
}

/// Build the landscape and seed population described by `config`.
///
/// # Errors
///
/// Returns [`EngineError::World`] for an unusable grid, or
/// [`EngineError::Spawner`] if the agents do not fit.
pub fn build_society(
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Result<SpawnResult, EngineError> {
    let world = &config.world;
    let grid = generate_landscape(world.width, world.height, &world.peaks, world.max_capacity)?;
    let mut society = Society::new(grid, config.rule_config());

    let strains = generate_strains(config.disease.strain_count, config.disease.strain_length, rng);
    let agents = spawn_seed_agents(&mut society, config, &strains, rng)?;
    Ok(SpawnResult {
        society,
        strains,
        agents,
    })
}

/// Place the seed agents on distinct random cells.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] when there are more agents than cells,
/// or [`EngineError::Agent`] if a placement is rejected.
pub fn spawn_seed_agents(
    society: &mut Society,
    config: &SimulationConfig,
    strains: &[BitString],
    rng: &mut impl Rng,
) -> Result<Vec<AgentId>, EngineError> {
    let population = &config.population;
    let count = usize::try_from(population.initial_agents).map_err(|_overflow| {
        EngineError::Spawner {
            message: format!(
                "seed count {} exceeds usize range",
                population.initial_agents
            ),
        }
    })?;

    let mut cells: Vec<Position> = society.grid.positions().collect();
    if count > cells.len() {
        return Err(EngineError::Spawner {
            message: format!(
                "requested {count} agents but the grid only has {} cells",
                cells.len()
            ),
        });
    }
    cells.shuffle(rng);

    let infections = if config.rules.disease_enabled {
        config.disease.initial_infections
    } else {
        0
    };
    let sexes = assign_sexes(rng, count);
    let mut spawned = Vec::with_capacity(count);

    for (position, sex) in cells.into_iter().zip(sexes) {
        let id = society.population.allocate_id();
        let state = AgentBuilder::new(id, position)
            .sex(sex)
            .fertility(society.config.fertility_for(sex))
            .endowment(Decimal::from(population.initial_sugar.sample(rng)))
            .metabolism(Decimal::from(population.metabolism.sample(rng)))
            .vision(population.vision.sample(rng))
            .age(population.initial_age.sample(rng))
            .max_age(population.max_age.sample(rng))
            .culture(BitString::random(population.culture_length, rng))
            .immunity(BitString::random(config.disease.immunity_length, rng))
            .diseases(initial_infections(strains, infections, rng))
            .build();
        debug!(
            agent_id = %id,
            %position,
            %sex,
            sugar = %state.sugar,
            vision = state.vision,
            tribe = %state.tribe(),
            "Spawned seed agent"
        );
        society.add_agent(state)?;
        spawned.push(id);
    }

    info!(
        agents = spawned.len(),
        strains = strains.len(),
        infections_per_agent = infections,
        "Seed population placed"
    );
    Ok(spawned)
}

/// Random 50/50 sexes. With two or more agents, at least one of each so
/// reproduction is possible from the start.
fn assign_sexes(rng: &mut impl Rng, count: usize) -> Vec<Sex> {
    let mut sexes: Vec<Sex> = (0..count)
        .map(|_| {
            if rng.random::<bool>() {
                Sex::Female
            } else {
                Sex::Male
            }
        })
        .collect();
    if count < 2 {
        return sexes;
    }
    let slot = match (sexes.contains(&Sex::Female), sexes.contains(&Sex::Male)) {
        (false, _) => sexes.first_mut().map(|slot| (slot, Sex::Female)),
        (_, false) => sexes.last_mut().map(|slot| (slot, Sex::Male)),
        _ => None,
    };
    if let Some((slot, sex)) = slot {
        *slot = sex;
    }
    sexes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use sugarscape_agents::UniformRange;

    use super::*;

    fn small_config(agents: u32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.width = 10;
        config.world.height = 10;
        config.world.peaks = Vec::new();
        config.population.initial_agents = agents;
        config.disease.strain_count = 5;
        config.disease.strain_length = 4;
        config.disease.immunity_length = 12;
        config.disease.initial_infections = 2;
        config
    }

    #[test]
    fn spawns_requested_count_on_distinct_cells() {
        let config = small_config(30);
        let result = build_society(&config, &mut SmallRng::seed_from_u64(1)).unwrap();

        assert_eq!(result.agents.len(), 30);
        assert_eq!(result.society.population.len(), 30);
        let cells: BTreeSet<Position> = result
            .society
            .population
            .iter()
            .map(|agent| agent.position)
            .collect();
        assert_eq!(cells.len(), 30);
        for agent in result.society.population.iter() {
            assert_eq!(result.society.grid.occupant(agent.position), Some(agent.id));
        }
    }

    #[test]
    fn traits_fall_inside_configured_ranges() {
        let mut config = small_config(40);
        config.population.vision = UniformRange::new(2, 3);
        config.population.initial_sugar = UniformRange::new(7, 9);
        config.population.initial_age = UniformRange::new(10, 20);
        let result = build_society(&config, &mut SmallRng::seed_from_u64(2)).unwrap();

        for agent in result.society.population.iter() {
            assert!((2..=3).contains(&agent.vision));
            assert!(agent.sugar >= Decimal::from(7) && agent.sugar <= Decimal::from(9));
            assert_eq!(agent.sugar, agent.initial_sugar);
            assert!((10..=20).contains(&agent.age));
            assert_eq!(agent.culture.len(), config.population.culture_length);
            assert_eq!(agent.immunity.len(), 12);
            assert_eq!(agent.diseases.len(), 2);
            for disease in &agent.diseases {
                assert!(result.strains.contains(disease));
            }
        }
    }

    #[test]
    fn fertility_follows_sex() {
        let config = small_config(20);
        let result = build_society(&config, &mut SmallRng::seed_from_u64(3)).unwrap();
        for agent in result.society.population.iter() {
            let expected = match agent.sex {
                Sex::Female => config.population.female_fertility,
                Sex::Male => config.population.male_fertility,
            };
            assert_eq!(agent.fertility, expected);
        }
    }

    #[test]
    fn disabled_disease_means_no_infections() {
        let mut config = small_config(10);
        config.rules.disease_enabled = false;
        let result = build_society(&config, &mut SmallRng::seed_from_u64(4)).unwrap();
        assert!(
            result
                .society
                .population
                .iter()
                .all(|agent| agent.diseases.is_empty())
        );
    }

    #[test]
    fn too_many_agents_is_an_error() {
        let config = small_config(101);
        let result = build_society(&config, &mut SmallRng::seed_from_u64(5));
        assert!(matches!(result, Err(EngineError::Spawner { .. })));
    }

    #[test]
    fn same_seed_same_population() {
        let config = small_config(15);
        let snapshot = |seed: u64| {
            let result = build_society(&config, &mut SmallRng::seed_from_u64(seed)).unwrap();
            result
                .society
                .population
                .iter()
                .map(|a| (a.id, a.position, a.sugar, a.sex, a.culture.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(snapshot(9), snapshot(9));
    }

    #[test]
    fn both_sexes_present() {
        let mut rng = SmallRng::seed_from_u64(6);
        for count in 2..12 {
            let sexes = assign_sexes(&mut rng, count);
            assert_eq!(sexes.len(), count);
            assert!(sexes.contains(&Sex::Female));
            assert!(sexes.contains(&Sex::Male));
        }
        assert_eq!(assign_sexes(&mut rng, 1).len(), 1);
        assert!(assign_sexes(&mut rng, 0).is_empty());
    }
}
