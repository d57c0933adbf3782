//! Simulation runner - main entry point for running epidemics

use std::sync::Arc;

use rand::seq::index;
use rand::Rng;

use crate::components::*;
use crate::config::{InfectionParameters, SimulationConfig};
use crate::error::{Error, Result};
use crate::generation::{ContactGraph, GraphBuilder};
use crate::rng::{seeded, SimRng};
use crate::systems::{ContactModel, DailyContacts, EpidemicEngine, StaticContacts};

/// Where each run gets its contact graph from.
#[derive(Debug, Clone)]
pub enum GraphSource {
    /// One validated graph, shared read-only by every run.
    Shared(Arc<ContactGraph>),
    /// A fresh graph sampled for every run.
    Rebuild(PopulationModel),
}

/// Runs one configured epidemic any number of times.
pub struct SimulationRunner {
    source: GraphSource,
    infection: InfectionParameters,
    config: SimulationConfig,
    contacts: Box<dyn ContactModel>,
}

impl SimulationRunner {
    /// Reuse `graph` for every run after checking it against `config`.
    pub fn shared(
        graph: Arc<ContactGraph>,
        population: &PopulationModel,
        infection: InfectionParameters,
        config: SimulationConfig,
    ) -> Result<Self> {
        Self::check_inputs(population, &infection, &config)?;
        graph.validate(&config, population)?;
        Ok(Self {
            source: GraphSource::Shared(graph),
            infection,
            config,
            contacts: Box::new(StaticContacts),
        })
    }

    /// Build an independent graph for every run.
    pub fn rebuild(
        population: PopulationModel,
        infection: InfectionParameters,
        config: SimulationConfig,
    ) -> Result<Self> {
        Self::check_inputs(&population, &infection, &config)?;
        Ok(Self {
            source: GraphSource::Rebuild(population),
            infection,
            config,
            contacts: Box::new(StaticContacts),
        })
    }

    fn check_inputs(
        population: &PopulationModel,
        infection: &InfectionParameters,
        config: &SimulationConfig,
    ) -> Result<()> {
        config.validate()?;
        infection.validate(&population.age_structure)?;
        if config.num_infected as usize > population.size() {
            return Err(Error::Sampling {
                requested: config.num_infected,
                population: population.size(),
            });
        }
        Ok(())
    }

    /// Replace the per-day contact model (static graph only by default).
    pub fn with_contacts(mut self, contacts: Box<dyn ContactModel>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn source(&self) -> &GraphSource {
        &self.source
    }

    fn graph_for_run(&self, rng: &mut SimRng) -> Result<Arc<ContactGraph>> {
        match &self.source {
            GraphSource::Shared(graph) => Ok(Arc::clone(graph)),
            GraphSource::Rebuild(population) => {
                let graph = GraphBuilder::new(population, &self.config.graph_config).build(rng)?;
                Ok(Arc::new(graph))
            }
        }
    }

    /// One run: counts for t = 0..=time_horizon.
    pub fn run_single(&mut self, rng: &mut SimRng) -> Result<RunResult> {
        let graph = self.graph_for_run(rng)?;
        let n = graph.node_count();
        let requested = self.config.num_infected;
        if requested as usize > n {
            return Err(Error::Sampling {
                requested,
                population: n,
            });
        }

        let engine = EpidemicEngine::new(&graph, &self.infection)?;
        let mut current = vec![DiseaseState::Susceptible; n];
        for id in index::sample(rng, n, requested as usize) {
            current[id] = DiseaseState::Infectious;
        }

        let mut next = Vec::with_capacity(n);
        let mut daily = DailyContacts::new(n);
        self.contacts.reset(&graph);

        let mut steps = Vec::with_capacity(self.config.time_horizon as usize + 1);
        steps.push(StateCounts::tally(&current));
        for day in 0..self.config.time_horizon {
            self.contacts.add_contacts(day, &graph, rng, &mut daily);
            let counts = engine.step(&graph, &daily, &current, &mut next, rng);
            daily.clear();
            std::mem::swap(&mut current, &mut next);
            steps.push(counts);
        }

        log::debug!(
            "run finished after {} steps: {} susceptible, {} recovered, {} dead",
            self.config.time_horizon,
            steps[steps.len() - 1][DiseaseState::Susceptible],
            steps[steps.len() - 1][DiseaseState::Recovered],
            steps[steps.len() - 1][DiseaseState::Dead],
        );
        Ok(RunResult::new(steps))
    }

    /// `repeats` runs averaged cell-wise. Each run gets its own generator
    /// seeded from `rng`.
    pub fn run_multiple(&mut self, repeats: u32, rng: &mut SimRng) -> Result<AveragedResult> {
        if repeats == 0 {
            return Err(Error::config("repeat count must be positive"));
        }
        let mut runs = Vec::with_capacity(repeats as usize);
        for _ in 0..repeats {
            let mut run_rng = seeded(rng.gen());
            runs.push(self.run_single(&mut run_rng)?);
        }
        AveragedResult::from_runs(&runs)
    }
}
