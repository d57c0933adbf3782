//! Integration tests for behaviour sweeps.
//!
//! Exercises: AppInputValues → combinations → worker pool
//! → IntermediaryStore → merge → SweepResult
//!
//! Every test works in its own temporary output directory.

use std::path::Path;
use std::sync::Arc;

use outbreak_core::persistence;
use outbreak_core::prelude::*;
use outbreak_core::sweep::{group_visit_factory, ContactModelFactory, IntermediaryStore};
use outbreak_core::systems::ContactModel;

// ── Helpers ────────────────────────────────────────────────────────────

fn inputs() -> SweepInputs {
    SweepInputs {
        communities: serde_json::from_str(
            r#"{"Hamlet": {"age_structure": {"(0, 9)": 25, "(10, 19)": 24}}}"#,
        )
        .unwrap(),
        infection: serde_json::from_str(
            r#"{
                "generic_infection": 0.15,
                "state_transitions": {
                    "E": {"I": {"(0, 9)": 0.4, "(10, 19)": 0.4}},
                    "I": {"R": {"(0, 9)": 0.2, "(10, 19)": 0.25}}
                }
            }"#,
        )
        .unwrap(),
        config: serde_json::from_str(
            r#"{
                "time_horizon": 14,
                "num_infected": 2,
                "graph_config": {
                    "strategy": "navigable_small_world",
                    "params": {"short_connection_diameter": 1, "long_connection_diameter": 1, "decay": 2.0},
                    "closeness_threshold": 1
                }
            }"#,
        )
        .unwrap(),
        // 3 food_shopping options and 2 church options, plus a zero variant each
        values: serde_json::from_str(
            r#"{
                "community": ["Hamlet"],
                "behaviour": ["food_shopping", "church"],
                "num_visits": {"food_shopping": [1, 2, 3], "church": [1, 2]},
                "num_people": {"food_shopping": [3], "church": [4]}
            }"#,
        )
        .unwrap(),
    }
}

fn options(output_dir: &Path) -> SweepOptions {
    SweepOptions {
        output_dir: output_dir.to_path_buf(),
        repeats: 2,
        seed: 17,
        ..SweepOptions::default()
    }
}

fn sweep(options: SweepOptions) -> Vec<SweepResult> {
    SweepOrchestrator::new(inputs(), options).unwrap().run().unwrap()
}

/// Group visits, except that combinations containing `pattern` fail.
fn failing_on(pattern: &'static str) -> ContactModelFactory {
    let default = group_visit_factory();
    Arc::new(
        move |combination: &BehaviourCombination,
              local: &[String]|
              -> outbreak_core::error::Result<Box<dyn ContactModel>> {
            if combination.key().contains(pattern) {
                return Err(Error::config(format!("refusing {pattern}")));
            }
            default(combination, local)
        },
    )
}

// ── Completeness ───────────────────────────────────────────────────────

#[test]
fn every_combination_gets_a_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        parallelism: Parallelism::Pool(2),
        ..options(dir.path())
    });

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.is_complete());
    assert_eq!(result.results.leaf_count(), 12);
    assert_eq!(result.community_data.population, 49);

    let baseline = result.results.get("food_shopping_0_0/church_0_0").unwrap();
    assert_eq!(baseline.runs, 2);
    assert_eq!(baseline.len(), 15);
    assert!(result.results.get("food_shopping_3_3/church_2_4").is_some());

    assert!(dir.path().join("Hamlet-results.json").is_file());
    assert!(dir.path().join("intermediary/Hamlet-graph.bin").is_file());

    let saved: SweepResult = read_json(dir.path().join("Hamlet-results.json")).unwrap();
    assert_eq!(saved.results, result.results);
}

#[test]
fn pool_and_sequential_sweeps_agree() {
    let pooled_dir = tempfile::tempdir().unwrap();
    let sequential_dir = tempfile::tempdir().unwrap();
    let pooled = sweep(SweepOptions {
        parallelism: Parallelism::Pool(3),
        ..options(pooled_dir.path())
    });
    let sequential = sweep(options(sequential_dir.path()));
    assert_eq!(pooled[0].results, sequential[0].results);
}

#[test]
fn weekly_reports_are_sampled() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        report_interval: Some(7),
        ..options(dir.path())
    });
    for (_, leaf) in results[0].results.leaves() {
        assert_eq!(leaf.len(), 2);
    }
}

// ── Resumability ───────────────────────────────────────────────────────

#[test]
fn resumed_sweep_matches_uninterrupted_sweep() {
    let full_dir = tempfile::tempdir().unwrap();
    let uninterrupted = sweep(options(full_dir.path()));

    // First attempt loses every church_1_4 combination
    let resumed_dir = tempfile::tempdir().unwrap();
    let partial = SweepOrchestrator::new(inputs(), options(resumed_dir.path()))
        .unwrap()
        .with_contact_models(failing_on("church_1_4"))
        .run()
        .unwrap();
    assert_eq!(partial[0].failures.len(), 4);
    assert_eq!(partial[0].results.leaf_count(), 8);

    let resumed = sweep(SweepOptions {
        skip_existing: true,
        ..options(resumed_dir.path())
    });
    assert!(resumed[0].is_complete());
    assert_eq!(resumed[0].results, uninterrupted[0].results);
}

#[test]
fn skip_existing_keeps_stored_partials() {
    let dir = tempfile::tempdir().unwrap();
    let key = "food_shopping_2_3/church_0_0";
    let combination = BehaviourCombination::from_key(key).unwrap();

    // A sentinel result nobody would compute: one run, one step
    let mut counts = StateCounts::new();
    counts[DiseaseState::Dead] = 49;
    let sentinel = AveragedResult::from_runs(&[RunResult::new(vec![counts])]).unwrap();
    let store = IntermediaryStore::open(dir.path().join("intermediary")).unwrap();
    store.write("Hamlet", &combination, &sentinel).unwrap();

    let results = sweep(SweepOptions {
        skip_existing: true,
        ..options(dir.path())
    });
    assert_eq!(results[0].results.get(key), Some(&sentinel));
    assert_eq!(results[0].results.leaf_count(), 12);
}

// ── Failure policy ─────────────────────────────────────────────────────

#[test]
fn failures_are_recorded_and_store_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let results = SweepOrchestrator::new(
        inputs(),
        SweepOptions {
            delete_after_merge: true,
            parallelism: Parallelism::Pool(2),
            ..options(dir.path())
        },
    )
    .unwrap()
    .with_contact_models(failing_on("church_2_4"))
    .run()
    .unwrap();

    let result = &results[0];
    assert!(!result.is_complete());
    assert_eq!(result.failures.len(), 4);
    assert!(result.failures.iter().all(|f| f.key.ends_with("church_2_4")));
    assert!(result.failures[0].error.contains("refusing"));
    assert_eq!(result.results.leaf_count(), 8);
    assert!(dir.path().join("intermediary").is_dir());
}

#[test]
fn fail_fast_aborts_the_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = SweepOrchestrator::new(
        inputs(),
        SweepOptions {
            fail_fast: true,
            ..options(dir.path())
        },
    )
    .unwrap()
    .with_contact_models(failing_on("church_1_4"))
    .run();

    match outcome {
        Err(Error::CombinationFailure { key, .. }) => assert!(key.ends_with("church_1_4")),
        other => panic!("expected a combination failure, got {other:?}"),
    }
    assert!(!dir.path().join("Hamlet-results.json").exists());
}

#[test]
fn store_is_deleted_after_a_clean_merge() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        delete_after_merge: true,
        ..options(dir.path())
    });
    assert!(results[0].is_complete());
    assert!(!dir.path().join("intermediary").exists());
    assert!(dir.path().join("Hamlet-results.json").is_file());
}

// ── Graph policies and sample mode ─────────────────────────────────────

#[test]
fn precomputed_graphs_are_loaded_and_validated() {
    let inputs = inputs();
    let population = inputs.communities.population("Hamlet").unwrap();
    let graph_dir = tempfile::tempdir().unwrap();
    let graph = GraphBuilder::new(&population, &inputs.config.graph_config)
        .build(&mut seeded(3))
        .unwrap();
    persistence::save_graph_file(&persistence::graph_path(graph_dir.path(), "Hamlet"), &graph)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        graph_policy: GraphPolicy::LoadFrom(graph_dir.path().to_path_buf()),
        ..options(dir.path())
    });
    assert_eq!(results[0].results.leaf_count(), 12);

    // Same blob, different closeness threshold
    let mut mismatched = inputs;
    mismatched.config.graph_config.closeness_threshold = 2;
    let outcome = SweepOrchestrator::new(
        mismatched,
        SweepOptions {
            graph_policy: GraphPolicy::LoadFrom(graph_dir.path().to_path_buf()),
            ..options(dir.path())
        },
    )
    .unwrap()
    .run();
    assert!(matches!(outcome, Err(Error::GraphMismatch { .. })));
}

#[test]
fn rebuild_per_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        graph_policy: GraphPolicy::RebuildPerRun,
        repeats: 1,
        ..options(dir.path())
    });
    assert_eq!(results[0].results.leaf_count(), 12);
    assert!(!dir.path().join("intermediary/Hamlet-graph.bin").exists());
}

#[test]
fn sample_mode_splits_population_between_s_and_r() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        generate_sample: true,
        ..options(dir.path())
    });
    assert_eq!(results[0].results.leaf_count(), 12);
    for (key, leaf) in results[0].results.leaves() {
        for t in 0..leaf.len() {
            let s = leaf.at(DiseaseState::Susceptible, t);
            let r = leaf.at(DiseaseState::Recovered, t);
            assert_eq!(s + r, 49.0, "{key} at t = {t}");
        }
    }
}

#[test]
fn rounded_counts_are_whole_and_sum_to_population() {
    let dir = tempfile::tempdir().unwrap();
    let results = sweep(SweepOptions {
        round_counts: true,
        ..options(dir.path())
    });
    assert_eq!(results[0].results.leaf_count(), 12);
    for (key, leaf) in results[0].results.leaves() {
        for t in 0..leaf.len() {
            for state in DiseaseState::ALL {
                let value = leaf.at(state, t);
                assert_eq!(value, value.round(), "{key} {state:?} at t = {t}");
            }
            assert_eq!(leaf.total_at(t), 49.0, "{key} at t = {t}");
        }
    }
}

#[test]
fn empty_age_band_sweeps_with_a_shared_graph() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = inputs();
    inputs.communities = serde_json::from_str(
        r#"{"Hamlet": {"age_structure": {"(0, 9)": 49, "(10, 19)": 0}}}"#,
    )
    .unwrap();
    let results = SweepOrchestrator::new(inputs, options(dir.path()))
        .unwrap()
        .run()
        .unwrap();

    let result = &results[0];
    assert!(result.failures.is_empty(), "{:?}", result.failures);
    assert_eq!(result.results.leaf_count(), 12);
    assert_eq!(result.community_data.population, 49);
}

#[test]
fn invalid_inputs_fail_before_running() {
    let mut bad = inputs();
    bad.values.num_visits.insert("church".into(), vec![9]);
    assert!(matches!(
        SweepOrchestrator::new(bad, SweepOptions::default()),
        Err(Error::Configuration(_))
    ));

    let mut unknown = inputs();
    unknown.values.community.push("Atlantis".into());
    assert!(SweepOrchestrator::new(unknown, SweepOptions::default()).is_err());
}
