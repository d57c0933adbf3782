//! Input schemas: community data, infection data, simulation config and
//! the app-input files that select behaviours.
//!
//! Every struct mirrors one JSON input file. `validate` methods turn
//! structural problems into configuration errors before any simulation work
//! starts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::components::{AgeStructure, PopulationModel, TransitionTable};
use crate::error::{Error, Result};
use crate::generation::GraphStrategyKind;
use crate::sweep::{BehaviourCombination, BehaviourVariant};

/// Behaviours whose contacts stay within a node's neighbourhood unless the
/// app input says otherwise.
pub const DEFAULT_LOCAL_BEHAVIOURS: &[&str] = &["food_shopping"];

/// How the contact graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Construction strategy name, e.g. `"navigable_small_world"`.
    pub strategy: String,
    /// Strategy parameters by name.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Maximum Chebyshev grid distance at which two nodes count as close.
    pub closeness_threshold: u32,
}

impl GraphConfig {
    pub fn new(strategy: impl Into<String>, closeness_threshold: u32) -> Self {
        Self {
            strategy: strategy.into(),
            params: BTreeMap::new(),
            closeness_threshold,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Resolve the strategy name and its parameters.
    pub fn strategy_kind(&self) -> Result<GraphStrategyKind> {
        GraphStrategyKind::from_config(self)
    }
}

/// Horizon, seeding and graph construction for a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub time_horizon: u32,
    pub num_infected: u32,
    pub graph_config: GraphConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.time_horizon == 0 {
            return Err(Error::config("time_horizon must be positive"));
        }
        self.graph_config.strategy_kind()?;
        Ok(())
    }
}

/// Transmission probability plus the progression table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionParameters {
    /// Chance that one contagious neighbour exposes a susceptible node per day.
    pub generic_infection: f64,
    pub state_transitions: TransitionTable,
}

impl InfectionParameters {
    pub fn validate(&self, structure: &AgeStructure) -> Result<()> {
        if !self.generic_infection.is_finite() || !(0.0..=1.0).contains(&self.generic_infection) {
            return Err(Error::config(format!(
                "generic_infection {} outside [0, 1]",
                self.generic_infection
            )));
        }
        self.state_transitions.validate(structure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub age_structure: AgeStructure,
}

/// All communities from the community data file, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityData(pub BTreeMap<String, CommunityRecord>);

impl CommunityData {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn population(&self, community: &str) -> Result<PopulationModel> {
        let record = self.0.get(community).ok_or_else(|| {
            Error::config(format!("community {community:?} not found in the community data"))
        })?;
        PopulationModel::new(community, record.age_structure.clone())
    }
}

/// App input for a single run: one community, one variant per behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInput {
    pub community: String,
    /// Variants written `name_visits_people`.
    pub behaviours: Vec<String>,
    #[serde(default = "default_local_behaviours")]
    pub local_behaviours: Vec<String>,
}

impl AppInput {
    pub fn combination(&self) -> Result<BehaviourCombination> {
        let variants = self
            .behaviours
            .iter()
            .map(|s| s.parse::<BehaviourVariant>())
            .collect::<Result<Vec<_>>>()?;
        Ok(BehaviourCombination::new(variants))
    }
}

/// Candidate values for a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInputValues {
    pub community: Vec<String>,
    #[serde(alias = "behaviours")]
    pub behaviour: Vec<String>,
    pub num_visits: BTreeMap<String, Vec<u32>>,
    pub num_people: BTreeMap<String, Vec<u32>>,
    #[serde(default = "default_local_behaviours")]
    pub local_behaviours: Vec<String>,
}

impl AppInputValues {
    pub fn validate(&self) -> Result<()> {
        for behaviour in &self.behaviour {
            let visits = self.num_visits.get(behaviour).ok_or_else(|| {
                Error::config(format!("no num_visits values for behaviour {behaviour:?}"))
            })?;
            if !self.num_people.contains_key(behaviour) {
                return Err(Error::config(format!(
                    "no num_people values for behaviour {behaviour:?}"
                )));
            }
            if let Some(v) = visits.iter().find(|v| **v > 7) {
                return Err(Error::config(format!(
                    "behaviour {behaviour:?} has {v} visits per week, at most 7 allowed"
                )));
            }
        }
        Ok(())
    }
}

fn default_local_behaviours() -> Vec<String> {
    DEFAULT_LOCAL_BEHAVIOURS.iter().map(|s| s.to_string()).collect()
}

/// Locations of the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub community_data_filename: PathBuf,
    pub infection_data_filename: PathBuf,
    pub simulation_config_filename: PathBuf,
    #[serde(default)]
    pub app_input_filename: Option<PathBuf>,
    #[serde(default)]
    pub app_input_values_filename: Option<PathBuf>,
}

/// Read and deserialize one JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
