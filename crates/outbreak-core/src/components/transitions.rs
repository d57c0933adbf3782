//! Age-conditioned daily transition probabilities between compartments.
//!
//! Input files describe the table as `{from: {to: {age_band: probability}}}`.
//! For every source state and age band the listed targets may sum to at most
//! one; whatever is left over is the probability of staying put. Nothing is
//! hardcoded as terminal: a state with no row simply never leaves.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{AgeBand, AgeStructure, DiseaseState};
use crate::error::{Error, Result};

/// Slack allowed when a row's probabilities are summed in floating point.
const SUM_TOLERANCE: f64 = 1e-9;

/// Raw transition table, keyed the way input files key it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionTable(BTreeMap<DiseaseState, BTreeMap<DiseaseState, BTreeMap<AgeBand, f64>>>);

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one entry, returning `self` for chaining.
    pub fn with(mut self, from: DiseaseState, to: DiseaseState, band: AgeBand, p: f64) -> Self {
        self.set(from, to, band, p);
        self
    }

    pub fn set(&mut self, from: DiseaseState, to: DiseaseState, band: AgeBand, p: f64) {
        self.0
            .entry(from)
            .or_default()
            .entry(to)
            .or_default()
            .insert(band, p);
    }

    pub fn probability(&self, from: DiseaseState, to: DiseaseState, band: &AgeBand) -> Option<f64> {
        self.0.get(&from)?.get(&to)?.get(band).copied()
    }

    /// Listed targets for one (source, band) pair, in state order.
    pub fn row(&self, from: DiseaseState, band: &AgeBand) -> Vec<(DiseaseState, f64)> {
        self.0
            .get(&from)
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|(to, by_band)| by_band.get(band).map(|p| (*to, *p)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check probabilities, row sums and age band coverage for a population.
    pub fn validate(&self, structure: &AgeStructure) -> Result<()> {
        for (from, targets) in &self.0 {
            for (to, by_band) in targets {
                for (band, p) in by_band {
                    if !p.is_finite() || !(0.0..=1.0).contains(p) {
                        return Err(Error::config(format!(
                            "transition {}->{} for {band} has probability {p} outside [0, 1]",
                            from.letter(),
                            to.letter()
                        )));
                    }
                }
                for band in structure.bands() {
                    if !by_band.contains_key(&band) {
                        return Err(Error::config(format!(
                            "transition {}->{} does not cover age band {band}",
                            from.letter(),
                            to.letter()
                        )));
                    }
                }
            }
            for band in structure.bands() {
                let sum: f64 = self.row(*from, &band).iter().map(|(_, p)| p).sum();
                if sum > 1.0 + SUM_TOLERANCE {
                    return Err(Error::config(format!(
                        "transitions out of {} for {band} sum to {sum} > 1",
                        from.letter()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flatten into a lookup indexed by state and band position.
    pub fn compile(&self, bands: &[AgeBand]) -> CompiledTable {
        let rows = DiseaseState::ALL
            .iter()
            .map(|state| {
                bands
                    .iter()
                    .map(|band| {
                        self.row(*state, band)
                            .into_iter()
                            .filter(|(_, p)| *p > 0.0)
                            .collect()
                    })
                    .collect()
            })
            .collect();
        CompiledTable {
            bands: bands.to_vec(),
            rows,
        }
    }
}

/// Transition table resolved against a fixed list of age bands.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    bands: Vec<AgeBand>,
    /// rows[state][band] → non-zero (target, probability) pairs
    rows: Vec<Vec<Vec<(DiseaseState, f64)>>>,
}

impl CompiledTable {
    pub fn bands(&self) -> &[AgeBand] {
        &self.bands
    }

    pub fn band_index(&self, band: &AgeBand) -> Option<usize> {
        self.bands.iter().position(|b| b == band)
    }

    pub fn row(&self, state: DiseaseState, band_index: usize) -> &[(DiseaseState, f64)] {
        &self.rows[state.index()][band_index]
    }

    /// Draw the next state; the mass not listed in the row keeps `state`.
    pub fn sample<R: Rng + ?Sized>(&self, state: DiseaseState, band_index: usize, rng: &mut R) -> DiseaseState {
        let row = self.row(state, band_index);
        if row.is_empty() {
            return state;
        }
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (target, p) in row {
            cumulative += p;
            if draw < cumulative {
                return *target;
            }
        }
        state
    }
}
