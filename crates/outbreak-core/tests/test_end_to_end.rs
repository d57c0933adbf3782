//! End-to-end tests for a single community simulation.
//!
//! Exercises: CommunityData → PopulationModel → GraphBuilder
//! → SimulationRunner → AveragedResult
//!
//! Inputs are parsed from the same JSON shapes the binary reads.

use std::sync::Arc;

use outbreak_core::prelude::*;
use outbreak_core::systems::CaseGrowth;

// ── Helpers ────────────────────────────────────────────────────────────

fn communities() -> CommunityData {
    serde_json::from_str(
        r#"{
            "Town": {"age_structure": {"(0, 9)": 100, "(10, 19)": 100}},
            "Hamlet": {"age_structure": {"(0, 9)": 30, "(10, 19)": 19}}
        }"#,
    )
    .unwrap()
}

fn infection() -> InfectionParameters {
    serde_json::from_str(
        r#"{
            "generic_infection": 0.1,
            "state_transitions": {
                "E": {"A": {"(0, 9)": 0.3, "(10, 19)": 0.2}, "I": {"(0, 9)": 0.2, "(10, 19)": 0.3}},
                "A": {"R": {"(0, 9)": 0.2, "(10, 19)": 0.2}},
                "I": {"H": {"(0, 9)": 0.05, "(10, 19)": 0.1}, "R": {"(0, 9)": 0.2, "(10, 19)": 0.15}},
                "H": {"R": {"(0, 9)": 0.1, "(10, 19)": 0.1}, "D": {"(0, 9)": 0.01, "(10, 19)": 0.02}}
            }
        }"#,
    )
    .unwrap()
}

fn complete_config(time_horizon: u32) -> SimulationConfig {
    serde_json::from_value(serde_json::json!({
        "time_horizon": time_horizon,
        "num_infected": 1,
        "graph_config": {"strategy": "complete", "closeness_threshold": 1}
    }))
    .unwrap()
}

fn small_world_config() -> SimulationConfig {
    serde_json::from_value(serde_json::json!({
        "time_horizon": 35,
        "num_infected": 2,
        "graph_config": {
            "strategy": "navigable_small_world",
            "params": {"short_connection_diameter": 1, "long_connection_diameter": 1, "decay": 2.0},
            "closeness_threshold": 1
        }
    }))
    .unwrap()
}

fn shared_runner(community: &str, config: SimulationConfig, seed: u64) -> SimulationRunner {
    let population = communities().population(community).unwrap();
    let graph = GraphBuilder::new(&population, &config.graph_config)
        .build(&mut seeded(seed))
        .unwrap();
    SimulationRunner::shared(Arc::new(graph), &population, infection(), config).unwrap()
}

// ── Scenario tests ─────────────────────────────────────────────────────

#[test]
fn complete_graph_outbreak_conserves_population() {
    let mut runner = shared_runner("Town", complete_config(5), 1);
    let run = runner.run_single(&mut seeded(2)).unwrap();

    assert_eq!(run.len(), 6);
    assert_eq!(run.count(DiseaseState::Infectious, 0), 1);
    for (t, counts) in run.steps.iter().enumerate() {
        assert_eq!(counts.total(), 200, "population drifted at t = {t}");
    }
    let susceptible = run.series(DiseaseState::Susceptible);
    assert!(
        susceptible.windows(2).all(|w| w[1] <= w[0]),
        "susceptible count increased: {susceptible:?}"
    );
}

#[test]
fn averaged_runs_conserve_population() {
    let mut runner = shared_runner("Town", complete_config(5), 1);
    let averaged = runner.run_multiple(4, &mut seeded(3)).unwrap();
    assert_eq!(averaged.runs, 4);
    for t in 0..averaged.len() {
        assert!((averaged.total_at(t) - 200.0).abs() < 1e-9);
    }
    let rounded = averaged.round_conserving(200);
    for t in 0..averaged.len() {
        let total: u32 = rounded.values().map(|series| series[t]).sum();
        assert_eq!(total, 200);
    }
}

#[test]
fn small_world_runs_are_reproducible() {
    let a = shared_runner("Hamlet", small_world_config(), 7)
        .run_multiple(3, &mut seeded(11))
        .unwrap();
    let b = shared_runner("Hamlet", small_world_config(), 7)
        .run_multiple(3, &mut seeded(11))
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 36);

    let weekly = a.sampled(7);
    assert_eq!(weekly.len(), 5);
}

#[test]
fn rebuild_policy_matches_population() {
    let population = communities().population("Hamlet").unwrap();
    let mut runner =
        SimulationRunner::rebuild(population, infection(), small_world_config()).unwrap();
    let averaged = runner.run_multiple(2, &mut seeded(5)).unwrap();
    for t in 0..averaged.len() {
        assert!((averaged.total_at(t) - 49.0).abs() < 1e-9);
    }
}

#[test]
fn case_growth_tracks_non_susceptible() {
    let mut runner = shared_runner("Town", complete_config(10), 1);
    let averaged = runner.run_multiple(2, &mut seeded(9)).unwrap();
    let growth = CaseGrowth::from_result(&averaged, 200);
    assert_eq!(growth.cumulative.len(), 11);
    assert_eq!(growth.cumulative[0], 1.0);
    assert!(growth.cumulative.windows(2).all(|w| w[1] >= w[0]));
}

// ── Validation tests ───────────────────────────────────────────────────

#[test]
fn overfull_transition_row_is_rejected() {
    let mut bad = infection();
    bad.state_transitions.set(
        DiseaseState::Infectious,
        DiseaseState::Dead,
        AgeBand::new(0, 9),
        0.9,
    );
    let population = communities().population("Town").unwrap();
    let result = SimulationRunner::rebuild(population, bad, complete_config(5));
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn graph_built_for_other_parameters_is_rejected() {
    let population = communities().population("Hamlet").unwrap();
    let graph = GraphBuilder::new(&population, &small_world_config().graph_config)
        .build(&mut seeded(1))
        .unwrap();

    let mut other = small_world_config();
    other
        .graph_config
        .params
        .insert("long_connection_diameter".into(), 2.0);
    let result = SimulationRunner::shared(Arc::new(graph), &population, infection(), other);
    assert!(matches!(
        result,
        Err(Error::GraphMismatch {
            field: "strategy parameters",
            ..
        })
    ));
}

#[test]
fn unknown_community_is_a_configuration_error() {
    assert!(matches!(
        communities().population("Atlantis"),
        Err(Error::Configuration(_))
    ));
}
