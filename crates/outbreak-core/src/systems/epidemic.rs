//! One-day epidemic update over a contact graph.

use rand::Rng;

use super::DailyContacts;
use crate::components::{CompiledTable, DiseaseState, StateCounts};
use crate::config::InfectionParameters;
use crate::error::{Error, Result};
use crate::generation::ContactGraph;
use crate::rng::SimRng;

/// Advances a snapshot of node states by one timestep.
///
/// Every node reads the snapshot of the previous day only, so update order
/// never changes the outcome.
pub struct EpidemicEngine {
    generic_infection: f64,
    table: CompiledTable,
    /// Compiled band index per node.
    band_of: Vec<usize>,
}

impl EpidemicEngine {
    pub fn new(graph: &ContactGraph, infection: &InfectionParameters) -> Result<Self> {
        let bands: Vec<_> = graph.age_distribution().into_keys().collect();
        let table = infection.state_transitions.compile(&bands);
        let band_of = graph
            .nodes()
            .iter()
            .map(|node| {
                table.band_index(&node.age_band).ok_or_else(|| {
                    Error::config(format!("no transition band for node {} aged {}", node.id, node.age_band))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            generic_infection: infection.generic_infection,
            table,
            band_of,
        })
    }

    /// Compute `next` from `current` and return the counts of `next`.
    pub fn step(
        &self,
        graph: &ContactGraph,
        contacts: &DailyContacts,
        current: &[DiseaseState],
        next: &mut Vec<DiseaseState>,
        rng: &mut SimRng,
    ) -> StateCounts {
        next.clear();
        next.extend(current.iter().enumerate().map(|(id, &state)| {
            let id = id as u32;
            if state == DiseaseState::Susceptible && self.is_exposed(graph, contacts, current, id, rng) {
                return DiseaseState::Exposed;
            }
            self.table.sample(state, self.band_of[id as usize], rng)
        }));
        StateCounts::tally(next)
    }

    /// One Bernoulli trial per contagious neighbour, stopping at the first
    /// success.
    fn is_exposed(
        &self,
        graph: &ContactGraph,
        contacts: &DailyContacts,
        current: &[DiseaseState],
        id: u32,
        rng: &mut SimRng,
    ) -> bool {
        if self.generic_infection <= 0.0 {
            return false;
        }
        graph
            .neighbors(id)
            .iter()
            .chain(contacts.partners(id))
            .filter(|&&other| current[other as usize].is_contagious())
            .any(|_| rng.gen::<f64>() < self.generic_infection)
    }
}
