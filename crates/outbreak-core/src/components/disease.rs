//! Disease compartments and per-timestep population counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Compartment a node occupies during one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiseaseState {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "E")]
    Exposed,
    #[serde(rename = "A")]
    Asymptomatic,
    #[serde(rename = "I")]
    Infectious,
    #[serde(rename = "H")]
    Hospitalized,
    #[serde(rename = "R")]
    Recovered,
    #[serde(rename = "D")]
    Dead,
}

impl DiseaseState {
    pub const COUNT: usize = 7;

    pub const ALL: [DiseaseState; Self::COUNT] = [
        DiseaseState::Susceptible,
        DiseaseState::Exposed,
        DiseaseState::Asymptomatic,
        DiseaseState::Infectious,
        DiseaseState::Hospitalized,
        DiseaseState::Recovered,
        DiseaseState::Dead,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        match self {
            DiseaseState::Susceptible => 'S',
            DiseaseState::Exposed => 'E',
            DiseaseState::Asymptomatic => 'A',
            DiseaseState::Infectious => 'I',
            DiseaseState::Hospitalized => 'H',
            DiseaseState::Recovered => 'R',
            DiseaseState::Dead => 'D',
        }
    }

    /// Whether a node in this state can pass the infection to a neighbour.
    pub fn is_contagious(self) -> bool {
        matches!(self, DiseaseState::Asymptomatic | DiseaseState::Infectious)
    }
}

impl fmt::Display for DiseaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiseaseState::Susceptible => "Susceptible",
            DiseaseState::Exposed => "Exposed",
            DiseaseState::Asymptomatic => "Asymptomatic",
            DiseaseState::Infectious => "Infectious",
            DiseaseState::Hospitalized => "Hospitalized",
            DiseaseState::Recovered => "Recovered",
            DiseaseState::Dead => "Dead",
        };
        f.write_str(name)
    }
}

/// How many nodes sit in each compartment at one timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts([u32; DiseaseState::COUNT]);

impl StateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a snapshot of node states.
    pub fn tally(states: &[DiseaseState]) -> Self {
        let mut counts = Self::new();
        for state in states {
            counts[*state] += 1;
        }
        counts
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiseaseState, u32)> + '_ {
        DiseaseState::ALL.iter().map(move |s| (*s, self.0[s.index()]))
    }
}

impl Index<DiseaseState> for StateCounts {
    type Output = u32;

    fn index(&self, state: DiseaseState) -> &u32 {
        &self.0[state.index()]
    }
}

impl IndexMut<DiseaseState> for StateCounts {
    fn index_mut(&mut self, state: DiseaseState) -> &mut u32 {
        &mut self.0[state.index()]
    }
}
