//! Tick-cycle tests driven by a scripted external oracle.
//!
//! The oracle's batch must line up with the tick's movement order, so each
//! test predicts that order by shuffling with a clone of the simulation
//! RNG before the tick runs.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use sugarscape_agents::{AgentBuilder, RuleConfig, Society};
use sugarscape_core::{
    DecisionError, DecisionSource, NoOpCallback, RuleToggles, RunnerError, SimulationState,
    TickError, run_simulation, run_tick,
};
use sugarscape_oracle::{OracleClient, OracleError, PromptEngine, RuleSummary, ScriptedTransport};
use sugarscape_types::{AgeRange, AgentId, BitString, Position, Sex};
use sugarscape_world::Grid;

fn flat_society(width: u32, height: u32) -> Society {
    let mut grid = Grid::new(width, height).unwrap();
    for pos in grid.positions().collect::<Vec<_>>() {
        grid.set_capacity(pos, dec!(4)).unwrap();
    }
    let config = RuleConfig {
        interest_rate: Decimal::ZERO,
        ..RuleConfig::default()
    };
    Society::new(grid, config)
}

fn state(society: Society, toggles: RuleToggles) -> SimulationState {
    let mut state = SimulationState::new(society, 11);
    state.toggles = toggles;
    state.growback_rate = Decimal::ZERO;
    state
}

fn oracle(replies: Vec<Result<String, OracleError>>) -> DecisionSource {
    let client = OracleClient::new(
        Box::new(ScriptedTransport::new(replies)),
        PromptEngine::new(None).unwrap(),
        RuleSummary {
            combat_limit: Decimal::TEN,
            interest_rate: Decimal::ZERO,
            loan_duration: 10,
        },
        3,
    );
    DecisionSource::oracle(client)
}

fn idle() -> Value {
    json!({"move": false, "combat": false, "credit": false, "reproduce": false})
}

/// Lay out per-agent decisions in the order the next tick will ask for them.
fn reply_for_next_tick(state: &SimulationState, decisions: &BTreeMap<AgentId, Value>) -> String {
    let order = state
        .society
        .population
        .shuffled_ids(&mut state.rng.clone());
    let batch: Vec<Value> = order
        .iter()
        .map(|id| decisions.get(id).cloned().unwrap_or_else(idle))
        .collect();
    json!({ "decisions": batch }).to_string()
}

fn api_error() -> OracleError {
    OracleError::Api {
        status: Some(503),
        detail: "service unavailable".to_owned(),
    }
}

/// A lone forager at the west end of a 5x1 strip: 1 sugar underfoot, 2 one
/// step east, 4 two steps east.
fn lone_forager() -> (SimulationState, AgentId) {
    let mut society = flat_society(5, 1);
    for (x, sugar) in [(0, dec!(1)), (1, dec!(2)), (2, dec!(4))] {
        society.grid.set_sugar(Position::new(x, 0), sugar).unwrap();
    }
    let id = AgentId::new(1);
    society
        .add_agent(
            AgentBuilder::new(id, Position::new(0, 0))
                .vision(2)
                .endowment(dec!(5))
                .metabolism(dec!(1))
                .build(),
        )
        .unwrap();
    (state(society, RuleToggles::none()), id)
}

#[test]
fn refused_move_keeps_agent_on_its_cell() {
    let (mut st, id) = lone_forager();
    let mut source = oracle(vec![Ok(json!([idle()]).to_string())]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert!(summary.oracle_used);
    let agent = st.society.agent(id).unwrap();
    assert_eq!(agent.position, Position::new(0, 0));
    assert_eq!(agent.sugar, dec!(5));
    assert_eq!(agent.age, 1);
    assert!(summary.conservation.is_balanced());
}

#[test]
fn named_move_target_is_honoured() {
    let (mut st, id) = lone_forager();
    let reply = json!([{
        "move": true, "combat": false, "credit": false, "reproduce": false,
        "move_target_cell": [1, 0]
    }]);
    let mut source = oracle(vec![Ok(reply.to_string())]);

    run_tick(&mut st, &mut source).unwrap();
    let agent = st.society.agent(id).unwrap();
    assert_eq!(agent.position, Position::new(1, 0));
    assert_eq!(agent.sugar, dec!(6));
}

#[test]
fn unreachable_target_falls_back_to_richest_cell() {
    let (mut st, id) = lone_forager();
    let reply = json!([{
        "move": true, "combat": false, "credit": false, "reproduce": false,
        "move_target_cell": {"x": 4, "y": 0}
    }]);
    let mut source = oracle(vec![Ok(reply.to_string())]);

    run_tick(&mut st, &mut source).unwrap();
    let agent = st.society.agent(id).unwrap();
    assert_eq!(agent.position, Position::new(2, 0));
    assert_eq!(agent.sugar, dec!(8));
}

#[test]
fn invalid_reply_aborts_before_any_rule_runs() {
    let (mut st, id) = lone_forager();
    let missing_combat = json!([{"move": true, "credit": false, "reproduce": false}]);
    let mut source = oracle(vec![Ok(missing_combat.to_string())]);

    let err = run_tick(&mut st, &mut source).unwrap_err();
    let TickError::Decision { source: decision } = err else {
        panic!("expected a decision error");
    };
    assert!(matches!(
        decision,
        DecisionError::Oracle {
            tick: 1,
            source: OracleError::Schema { field: "combat", .. },
        }
    ));
    assert_eq!(decision.agent_id(), Some(id));

    let agent = st.society.agent(id).unwrap();
    assert_eq!(agent.position, Position::new(0, 0));
    assert_eq!(agent.sugar, dec!(5));
    assert_eq!(agent.age, 0);
}

#[test]
fn transient_api_errors_are_retried() {
    let (mut st, id) = lone_forager();
    let mut source = oracle(vec![
        Err(api_error()),
        Err(api_error()),
        Ok(json!([idle()]).to_string()),
    ]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.agents_alive, 1);
    assert_eq!(st.society.agent(id).unwrap().position, Position::new(0, 0));
}

#[test]
fn exhausted_retries_stop_the_run() {
    let (mut st, _) = lone_forager();
    let mut source = oracle(vec![Err(api_error()), Err(api_error()), Err(api_error())]);

    let err = run_simulation(&mut st, &mut source, 10, &mut NoOpCallback).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Tick {
            source: TickError::Decision {
                source: DecisionError::Oracle {
                    source: OracleError::Api { .. },
                    ..
                }
            }
        }
    ));
    assert_eq!(st.society.tick, 1);
}

fn rivals() -> (SimulationState, AgentId, AgentId) {
    let mut society = flat_society(5, 1);
    let attacker = AgentId::new(1);
    let victim = AgentId::new(2);
    society
        .add_agent(
            AgentBuilder::new(attacker, Position::new(0, 0))
                .endowment(dec!(10))
                .metabolism(dec!(1))
                .vision(2)
                .culture("111".parse::<BitString>().unwrap())
                .build(),
        )
        .unwrap();
    society
        .add_agent(
            AgentBuilder::new(victim, Position::new(2, 0))
                .endowment(dec!(4))
                .metabolism(dec!(0))
                .culture("000".parse::<BitString>().unwrap())
                .build(),
        )
        .unwrap();
    let toggles = RuleToggles {
        combat: true,
        ..RuleToggles::none()
    };
    (state(society, toggles), attacker, victim)
}

#[test]
fn combat_needs_the_oracles_consent() {
    let (mut st, attacker, victim) = rivals();
    let reply = reply_for_next_tick(&st, &BTreeMap::new());
    let mut source = oracle(vec![Ok(reply)]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.combat_kills, 0);
    assert!(st.society.is_alive(victim));
    assert_eq!(
        st.society.agent(attacker).unwrap().position,
        Position::new(0, 0)
    );
}

#[test]
fn named_combat_target_is_attacked() {
    let (mut st, attacker, victim) = rivals();
    let decisions = BTreeMap::from([(
        attacker,
        json!({
            "move": false, "combat": true, "credit": false, "reproduce": false,
            "combat_target_id": victim.into_inner()
        }),
    )]);
    let reply = reply_for_next_tick(&st, &decisions);
    let mut source = oracle(vec![Ok(reply)]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.combat_kills, 1);
    assert!(!st.society.is_alive(victim));
    let winner = st.society.agent(attacker).unwrap();
    assert_eq!(winner.position, Position::new(2, 0));
    assert_eq!(winner.sugar, dec!(13));
    assert!(summary.conservation.is_balanced());
}

#[test]
fn credit_is_limited_to_the_named_partner() {
    let mut society = flat_society(3, 1);
    let first_lender = AgentId::new(1);
    let borrower = AgentId::new(2);
    let second_lender = AgentId::new(3);
    for (id, x) in [(first_lender, 0), (second_lender, 2)] {
        society
            .add_agent(
                AgentBuilder::new(id, Position::new(x, 0))
                    .sugar(dec!(40))
                    .threshold(dec!(10))
                    .metabolism(dec!(0))
                    .age(60)
                    .fertility(AgeRange::new(12, 50))
                    .build(),
            )
            .unwrap();
    }
    society
        .add_agent(
            AgentBuilder::new(borrower, Position::new(1, 0))
                .sugar(dec!(10))
                .threshold(dec!(25))
                .metabolism(dec!(0))
                .age(20)
                .build(),
        )
        .unwrap();
    let toggles = RuleToggles {
        credit: true,
        ..RuleToggles::none()
    };
    let mut st = state(society, toggles);
    let decisions = BTreeMap::from([(
        borrower,
        json!({
            "move": false, "combat": false, "credit": true, "reproduce": false,
            "credit_partner_id": second_lender.into_inner()
        }),
    )]);
    let reply = reply_for_next_tick(&st, &decisions);
    let mut source = oracle(vec![Ok(reply)]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.loans_issued, 1);
    let debtor = st.society.agent(borrower).unwrap();
    assert_eq!(debtor.sugar, dec!(25));
    assert!(debtor.loans_owed.contains_key(&second_lender));
    assert!(!debtor.loans_owed.contains_key(&first_lender));
    assert_eq!(st.society.agent(first_lender).unwrap().sugar, dec!(40));
    assert_eq!(st.society.agent(second_lender).unwrap().sugar, dec!(25));
}

#[test]
fn reproduction_pairs_with_the_named_partner() {
    let mut society = flat_society(4, 3);
    let mother = AgentId::new(1);
    let east = AgentId::new(2);
    let west = AgentId::new(3);
    for (id, x, sex) in [
        (mother, 1, Sex::Female),
        (east, 2, Sex::Male),
        (west, 0, Sex::Male),
    ] {
        society
            .add_agent(
                AgentBuilder::new(id, Position::new(x, 1))
                    .sex(sex)
                    .age(20)
                    .endowment(dec!(20))
                    .metabolism(dec!(0))
                    .build(),
            )
            .unwrap();
    }
    let toggles = RuleToggles {
        reproduction: true,
        ..RuleToggles::none()
    };
    let mut st = state(society, toggles);
    let decisions = BTreeMap::from([(
        mother,
        json!({
            "move": false, "combat": false, "credit": false, "reproduce": true,
            "reproduce_with_id": west.into_inner()
        }),
    )]);
    let reply = reply_for_next_tick(&st, &decisions);
    let mut source = oracle(vec![Ok(reply)]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.births.len(), 1);
    let birth = summary.births[0];
    assert_eq!(birth.first_parent, mother);
    assert_eq!(birth.second_parent, west);
    assert_eq!(st.society.agent(east).unwrap().sugar, dec!(20));
    assert_eq!(st.society.agent(west).unwrap().sugar, dec!(10));
}

#[test]
fn next_batch_covers_children_born_last_tick() {
    let mut society = flat_society(4, 3);
    for (id, x, sex) in [(1, 1, Sex::Female), (2, 2, Sex::Male)] {
        society
            .add_agent(
                AgentBuilder::new(AgentId::new(id), Position::new(x, 1))
                    .sex(sex)
                    .age(20)
                    .endowment(dec!(20))
                    .metabolism(dec!(0))
                    .build(),
            )
            .unwrap();
    }
    let toggles = RuleToggles {
        reproduction: true,
        ..RuleToggles::none()
    };
    let mut st = state(society, toggles);
    let breed = |mate: u64| {
        json!({
            "move": false,
            "combat": false,
            "credit": false,
            "reproduce": true,
            "reproduce_with_id": mate,
        })
    };
    let pairs = BTreeMap::from([(AgentId::new(1), breed(2)), (AgentId::new(2), breed(1))]);
    let first = reply_for_next_tick(&st, &pairs);
    // A two-decision reply for what is now a three-agent batch.
    let second = json!([idle(), idle()]).to_string();
    let mut source = oracle(vec![Ok(first), Ok(second)]);

    let summary = run_tick(&mut st, &mut source).unwrap();
    assert_eq!(summary.births.len(), 1);

    let err = run_tick(&mut st, &mut source).unwrap_err();
    assert!(matches!(err, TickError::Decision { .. }));
}
