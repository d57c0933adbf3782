//! Case growth analysis over averaged series.

use serde::{Deserialize, Serialize};

use crate::components::{AveragedResult, DiseaseState};

/// Cumulative cases and doubling times per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseGrowth {
    /// Everyone no longer susceptible.
    pub cumulative: Vec<f64>,
    /// Steps until `cumulative` at least doubles, if it ever does.
    pub doubling: Vec<Option<usize>>,
}

impl CaseGrowth {
    pub fn from_result(result: &AveragedResult, population: u32) -> Self {
        let susceptible: Vec<f64> = (0..result.len())
            .map(|t| result.at(DiseaseState::Susceptible, t))
            .collect();
        let cumulative = cumulative_cases(&susceptible, population);
        let doubling = doubling_times(&cumulative);
        Self {
            cumulative,
            doubling,
        }
    }
}

pub fn cumulative_cases(susceptible: &[f64], population: u32) -> Vec<f64> {
    susceptible.iter().map(|s| population as f64 - s).collect()
}

/// For each step, how many steps it takes for cases to double.
pub fn doubling_times(cases: &[f64]) -> Vec<Option<usize>> {
    cases
        .iter()
        .enumerate()
        .map(|(t, &now)| {
            cases[t + 1..]
                .iter()
                .position(|&later| later >= now * 2.0)
                .map(|offset| offset + 1)
        })
        .collect()
}
