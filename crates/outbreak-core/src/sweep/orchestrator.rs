//! Sweep orchestration: every community times every behaviour combination.
//!
//! Combinations are independent, so they fan out across a rayon pool. Each
//! finished combination lands in the [`IntermediaryStore`] before anything
//! else happens, and the merge only reads from the store. An interrupted
//! sweep rerun with `skip_existing` therefore computes only what is missing,
//! and because every combination seeds its own generator from the sweep
//! seed, the merged tree matches an uninterrupted run.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rayon::prelude::*;

use super::{enumerate, BehaviourCombination, CommunitySnapshot, FailureRecord, IntermediaryStore, SweepResult};
use crate::components::{AveragedResult, DiseaseState, PopulationModel, RunResult, StateCounts};
use crate::config::{read_json, AppInputValues, CommunityData, InfectionParameters, InputSpec, SimulationConfig};
use crate::engine::{GraphSource, SimulationRunner};
use crate::error::{Error, Result};
use crate::generation::GraphBuilder;
use crate::persistence;
use crate::rng::{derive_seed, seeded, SimRng};
use crate::systems::{ContactModel, GroupVisits};

/// Builds the per-day contact model for one combination. Receives the
/// behaviours that stay within a node's neighbourhood.
pub type ContactModelFactory =
    Arc<dyn Fn(&BehaviourCombination, &[String]) -> Result<Box<dyn ContactModel>> + Send + Sync>;

/// Weekly group visits for every enabled behaviour.
pub fn group_visit_factory() -> ContactModelFactory {
    Arc::new(
        |combination: &BehaviourCombination, local: &[String]| -> Result<Box<dyn ContactModel>> {
            Ok(Box::new(GroupVisits::new(combination, local)?))
        },
    )
}

/// Where each community's graph comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphPolicy {
    /// Build once per community, share it across combinations and save it
    /// to the store as `<community>-graph.bin`.
    SharedPerCommunity,
    /// Sample a new graph for every run.
    RebuildPerRun,
    /// Load `<community>-graph.bin` from a directory and validate it.
    LoadFrom(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    /// A dedicated pool with this many threads.
    Pool(usize),
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Results go here; partial results under `intermediary/`.
    pub output_dir: PathBuf,
    /// Runs averaged per combination.
    pub repeats: u32,
    pub parallelism: Parallelism,
    pub skip_existing: bool,
    pub delete_after_merge: bool,
    pub fail_fast: bool,
    /// Write random S/R splits instead of simulating.
    pub generate_sample: bool,
    pub graph_policy: GraphPolicy,
    /// Keep every n-th timestep starting at t = 1; `None` keeps the whole series.
    pub report_interval: Option<usize>,
    /// Store integer counts that sum to the population instead of means.
    pub round_counts: bool,
    pub seed: u64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            repeats: 10,
            parallelism: Parallelism::Sequential,
            skip_existing: false,
            delete_after_merge: false,
            fail_fast: false,
            generate_sample: false,
            graph_policy: GraphPolicy::SharedPerCommunity,
            report_interval: None,
            round_counts: false,
            seed: 0,
        }
    }
}

/// Everything read from the input files.
#[derive(Debug, Clone)]
pub struct SweepInputs {
    pub communities: CommunityData,
    pub infection: InfectionParameters,
    pub config: SimulationConfig,
    pub values: AppInputValues,
}

impl SweepInputs {
    pub fn load(spec: &InputSpec) -> Result<Self> {
        let values_path = spec
            .app_input_values_filename
            .as_ref()
            .ok_or_else(|| Error::config("input spec has no app_input_values_filename"))?;
        Ok(Self {
            communities: read_json(&spec.community_data_filename)?,
            infection: read_json(&spec.infection_data_filename)?,
            config: read_json(&spec.simulation_config_filename)?,
            values: read_json(values_path)?,
        })
    }
}

pub struct SweepOrchestrator {
    inputs: SweepInputs,
    options: SweepOptions,
    contact_models: ContactModelFactory,
}

impl SweepOrchestrator {
    /// Check every input up front; nothing runs if any of them is invalid.
    pub fn new(inputs: SweepInputs, options: SweepOptions) -> Result<Self> {
        inputs.values.validate()?;
        inputs.config.validate()?;
        if options.repeats == 0 {
            return Err(Error::config("repeat count must be positive"));
        }
        if options.parallelism == Parallelism::Pool(0) {
            return Err(Error::config("worker pool needs at least one thread"));
        }
        for community in &inputs.values.community {
            let population = inputs.communities.population(community)?;
            inputs.infection.validate(&population.age_structure)?;
        }
        Ok(Self {
            inputs,
            options,
            contact_models: group_visit_factory(),
        })
    }

    /// Replace the default group-visit contact model.
    pub fn with_contact_models(mut self, factory: ContactModelFactory) -> Self {
        self.contact_models = factory;
        self
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    pub fn combinations(&self) -> Result<Vec<BehaviourCombination>> {
        enumerate(&self.inputs.values)
    }

    pub fn intermediary_dir(&self) -> PathBuf {
        self.options.output_dir.join("intermediary")
    }

    /// Sweep every community, writing `<community>-results.json` for each.
    pub fn run(&self) -> Result<Vec<SweepResult>> {
        let mut store = IntermediaryStore::open(self.intermediary_dir())?;
        let combinations = self.combinations()?;
        log::info!(
            "sweeping {} communities x {} combinations ({} runs each)",
            self.inputs.values.community.len(),
            combinations.len(),
            self.options.repeats
        );

        let mut results = Vec::with_capacity(self.inputs.values.community.len());
        for community in &self.inputs.values.community {
            results.push(self.run_community(community, &combinations, &mut store)?);
        }

        if self.options.delete_after_merge {
            if results.iter().all(SweepResult::is_complete) {
                store.delete()?;
            } else {
                log::warn!(
                    "keeping {} because some combinations failed",
                    store.dir().display()
                );
            }
        }
        Ok(results)
    }

    fn run_community(
        &self,
        community: &str,
        combinations: &[BehaviourCombination],
        store: &mut IntermediaryStore,
    ) -> Result<SweepResult> {
        let population = self.inputs.communities.population(community)?;
        let source = self.graph_source(community, &population, store)?;

        let pending: Vec<&BehaviourCombination> = combinations
            .iter()
            .filter(|c| !(self.options.skip_existing && store.contains(community, c)))
            .collect();
        log::info!(
            "{community}: computing {} of {} combinations",
            pending.len(),
            combinations.len()
        );

        let shared: &IntermediaryStore = store;
        let compute = |combination: &BehaviourCombination| {
            self.compute(community, &population, source.as_ref(), combination, shared)
        };
        let wrap = |combination: &BehaviourCombination, source: Error| Error::CombinationFailure {
            key: combination.key(),
            source: Box::new(source),
        };

        let outcomes: Vec<(String, Result<()>)> = match self.options.parallelism {
            Parallelism::Sequential => {
                let mut outcomes = Vec::with_capacity(pending.len());
                for &combination in &pending {
                    let outcome = compute(combination);
                    if self.options.fail_fast {
                        outcome.map_err(|e| wrap(combination, e))?;
                    } else {
                        outcomes.push((combination.key(), outcome));
                    }
                }
                outcomes
            }
            Parallelism::Pool(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                if self.options.fail_fast {
                    pool.install(|| {
                        pending
                            .par_iter()
                            .try_for_each(|&c| compute(c).map_err(|e| wrap(c, e)))
                    })?;
                    Vec::new()
                } else {
                    pool.install(|| pending.par_iter().map(|&c| (c.key(), compute(c))).collect())
                }
            }
        };

        let failures: Vec<FailureRecord> = outcomes
            .into_iter()
            .filter_map(|(key, outcome)| {
                outcome.err().map(|error| {
                    log::warn!("{community}: combination {key} failed: {error}");
                    FailureRecord {
                        key,
                        error: error.to_string(),
                    }
                })
            })
            .collect();

        let finished: Vec<BehaviourCombination> = combinations
            .iter()
            .filter(|c| !failures.iter().any(|f| f.key == c.key()))
            .cloned()
            .collect();
        let results = store.merge(community, &finished)?;

        let result = SweepResult {
            timestamp: Utc::now(),
            community_data: CommunitySnapshot::from(&population),
            sim_config: self.inputs.config.clone(),
            infection_data: self.inputs.infection.clone(),
            results,
            failures,
        };
        let path = result.save(&self.options.output_dir)?;
        log::info!(
            "{community}: {} results merged into {}{}",
            result.results.leaf_count(),
            path.display(),
            if result.is_complete() {
                String::new()
            } else {
                format!(", {} failed", result.failures.len())
            }
        );
        Ok(result)
    }

    fn graph_source(
        &self,
        community: &str,
        population: &PopulationModel,
        store: &IntermediaryStore,
    ) -> Result<Option<GraphSource>> {
        if self.options.generate_sample {
            return Ok(None);
        }
        let source = match &self.options.graph_policy {
            GraphPolicy::SharedPerCommunity => {
                let mut rng = seeded(derive_seed(self.options.seed, &format!("{community}/graph")));
                let graph = GraphBuilder::new(population, &self.inputs.config.graph_config).build(&mut rng)?;
                let path = store.save_graph(community, &graph)?;
                log::info!(
                    "{community}: built graph with {} nodes and {} edges ({})",
                    graph.node_count(),
                    graph.edge_count(),
                    path.display()
                );
                GraphSource::Shared(Arc::new(graph))
            }
            GraphPolicy::LoadFrom(dir) => {
                let path = persistence::graph_path(dir, community);
                let graph = persistence::load_validated(&path, &self.inputs.config, population)?;
                GraphSource::Shared(Arc::new(graph))
            }
            GraphPolicy::RebuildPerRun => GraphSource::Rebuild(population.clone()),
        };
        Ok(Some(source))
    }

    /// Seed for one combination, independent of scheduling order.
    pub fn combination_seed(&self, community: &str, combination: &BehaviourCombination) -> u64 {
        derive_seed(self.options.seed, &format!("{community}/{}", combination.key()))
    }

    fn compute(
        &self,
        community: &str,
        population: &PopulationModel,
        source: Option<&GraphSource>,
        combination: &BehaviourCombination,
        store: &IntermediaryStore,
    ) -> Result<()> {
        let mut rng = seeded(self.combination_seed(community, combination));
        let result = match source {
            None => sample_result(population.age_structure.total(), self.inputs.config.time_horizon, &mut rng)?,
            Some(source) => {
                let infection = self.inputs.infection.clone();
                let config = self.inputs.config.clone();
                let runner = match source {
                    GraphSource::Shared(graph) => {
                        SimulationRunner::shared(Arc::clone(graph), population, infection, config)?
                    }
                    GraphSource::Rebuild(population) => {
                        SimulationRunner::rebuild(population.clone(), infection, config)?
                    }
                };
                let contacts = (self.contact_models)(combination, &self.inputs.values.local_behaviours)?;
                runner
                    .with_contacts(contacts)
                    .run_multiple(self.options.repeats, &mut rng)?
            }
        };
        let result = match self.options.report_interval {
            Some(interval) => result.sampled(interval),
            None => result,
        };
        let result = if self.options.round_counts {
            result.rounded(population.age_structure.total())
        } else {
            result
        };
        store.write(community, combination, &result)?;
        if combination.is_baseline() {
            log::debug!("{community}: finished static-graph baseline {combination}");
        } else {
            log::debug!("{community}: finished {combination}");
        }
        Ok(())
    }
}

/// Random split of the population between S and R at every timestep.
fn sample_result(population: u32, time_horizon: u32, rng: &mut SimRng) -> Result<AveragedResult> {
    let steps = (0..=time_horizon)
        .map(|_| {
            let mut counts = StateCounts::new();
            counts[DiseaseState::Susceptible] = rng.gen_range(0..=population);
            counts[DiseaseState::Recovered] = population - counts[DiseaseState::Susceptible];
            counts
        })
        .collect();
    AveragedResult::from_runs(&[RunResult::new(steps)])
}
