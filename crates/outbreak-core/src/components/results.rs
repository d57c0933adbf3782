//! Per-run count series and their averages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DiseaseState, StateCounts};
use crate::error::{Error, Result};

/// Counts per compartment for t = 0..=time_horizon of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub steps: Vec<StateCounts>,
}

impl RunResult {
    pub fn new(steps: Vec<StateCounts>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn count(&self, state: DiseaseState, t: usize) -> u32 {
        self.steps[t][state]
    }

    /// One series per compartment.
    pub fn series(&self, state: DiseaseState) -> Vec<u32> {
        self.steps.iter().map(|c| c[state]).collect()
    }
}

/// Element-wise mean of N runs, stored as one series per compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AveragedResult {
    pub runs: u32,
    pub series: BTreeMap<DiseaseState, Vec<f64>>,
}

impl AveragedResult {
    pub fn from_runs(runs: &[RunResult]) -> Result<Self> {
        let first = runs
            .first()
            .ok_or_else(|| Error::config("cannot average zero runs"))?;
        let steps = first.len();
        if runs.iter().any(|r| r.len() != steps) {
            return Err(Error::config("runs to average have different lengths"));
        }

        let n = runs.len() as f64;
        let series = DiseaseState::ALL
            .iter()
            .map(|state| {
                let means = (0..steps)
                    .map(|t| {
                        let sum: u64 = runs.iter().map(|r| r.count(*state, t) as u64).sum();
                        sum as f64 / n
                    })
                    .collect();
                (*state, means)
            })
            .collect();

        Ok(Self {
            runs: runs.len() as u32,
            series,
        })
    }

    /// Number of recorded timesteps (time horizon + 1 for simulated runs).
    pub fn len(&self) -> usize {
        self.series.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, state: DiseaseState, t: usize) -> f64 {
        self.series.get(&state).and_then(|s| s.get(t)).copied().unwrap_or(0.0)
    }

    /// Sum over compartments at one timestep.
    pub fn total_at(&self, t: usize) -> f64 {
        DiseaseState::ALL.iter().map(|s| self.at(*s, t)).sum()
    }

    /// Keep every `interval`-th timestep starting from t = 1.
    pub fn sampled(&self, interval: usize) -> Self {
        let interval = interval.max(1);
        let series = self
            .series
            .iter()
            .map(|(state, values)| {
                let kept = values.iter().skip(1).step_by(interval).copied().collect();
                (*state, kept)
            })
            .collect();
        Self {
            runs: self.runs,
            series,
        }
    }

    /// Integer counts whose per-timestep sum equals `population`.
    ///
    /// Means are rounded, then the largest compartment at each timestep
    /// absorbs the rounding difference.
    pub fn round_conserving(&self, population: u32) -> BTreeMap<DiseaseState, Vec<u32>> {
        let mut rounded: BTreeMap<DiseaseState, Vec<i64>> = self
            .series
            .iter()
            .map(|(state, values)| (*state, values.iter().map(|v| v.round() as i64).collect()))
            .collect();

        for t in 0..self.len() {
            let total: i64 = rounded.values().map(|v| v[t]).sum();
            let diff = population as i64 - total;
            if diff == 0 {
                continue;
            }
            let biggest = rounded
                .iter()
                .max_by(|a, b| a.1[t].cmp(&b.1[t]).then(b.0.cmp(a.0)))
                .map(|(state, _)| *state);
            if let Some(values) = biggest.and_then(|state| rounded.get_mut(&state)) {
                values[t] += diff;
            }
        }

        rounded
            .into_iter()
            .map(|(state, values)| (state, values.into_iter().map(|v| v.max(0) as u32).collect()))
            .collect()
    }

    /// The same result with [`round_conserving`](Self::round_conserving)
    /// counts in place of the means.
    pub fn rounded(&self, population: u32) -> Self {
        let series = self
            .round_conserving(population)
            .into_iter()
            .map(|(state, values)| (state, values.into_iter().map(f64::from).collect()))
            .collect();
        Self {
            runs: self.runs,
            series,
        }
    }
}
