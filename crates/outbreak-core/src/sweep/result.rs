//! The merged output of one community's sweep.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::write_json_atomic;
use super::ResultTree;
use crate::components::{AgeStructure, PopulationModel};
use crate::config::{InfectionParameters, SimulationConfig};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySnapshot {
    pub name: String,
    pub population: u32,
    pub age_structure: AgeStructure,
}

impl From<&PopulationModel> for CommunitySnapshot {
    fn from(population: &PopulationModel) -> Self {
        Self {
            name: population.name.clone(),
            population: population.age_structure.total(),
            age_structure: population.age_structure.clone(),
        }
    }
}

/// A combination that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub key: String,
    pub error: String,
}

/// Results of every combination for one community, plus the inputs that
/// produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub timestamp: DateTime<Utc>,
    pub community_data: CommunitySnapshot,
    pub sim_config: SimulationConfig,
    pub infection_data: InfectionParameters,
    pub results: ResultTree,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl SweepResult {
    pub fn file_name(community: &str) -> String {
        format!("{community}-results.json")
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write `<community>-results.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(&self.community_data.name));
        write_json_atomic(&path, self)?;
        Ok(path)
    }
}
