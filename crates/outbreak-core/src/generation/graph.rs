//! Contact graph construction and validation.

use std::collections::BTreeMap;

use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::{EdgeSet, GraphStrategy, GridPos, Lattice};
use crate::components::{AgeBand, PopulationModel};
use crate::config::{GraphConfig, SimulationConfig};
use crate::error::{Error, Result};
use crate::rng::SimRng;

/// One member of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub age_band: AgeBand,
    pub location: GridPos,
}

/// Undirected contact graph with age-labelled nodes.
///
/// Adjacency lists are sorted and free of duplicates and self-loops. The
/// graph never changes after construction; per-day contacts live in
/// [`DailyContacts`](crate::systems::DailyContacts) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactGraph {
    nodes: Vec<Node>,
    adjacency: Vec<Vec<u32>>,
    close_nodes: Vec<Vec<u32>>,
    edge_count: usize,
    config: GraphConfig,
}

impl ContactGraph {
    /// Assemble a graph from placed nodes and an edge set.
    pub fn from_edges(nodes: Vec<Node>, edges: &EdgeSet, config: GraphConfig) -> Result<Self> {
        let n = nodes.len();
        if let Some(pos) = nodes.iter().enumerate().position(|(i, node)| node.id as usize != i) {
            return Err(Error::config(format!("node at index {pos} has id {}", nodes[pos].id)));
        }

        let mut adjacency = vec![Vec::new(); n];
        for (a, b) in edges.iter() {
            if a as usize >= n || b as usize >= n {
                return Err(Error::config(format!(
                    "edge ({a}, {b}) references a node outside 0..{n}"
                )));
            }
            adjacency[a as usize].push(b);
            adjacency[b as usize].push(a);
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }

        let lattice = Lattice::new(nodes.iter().map(|node| node.location).collect());
        let close_nodes = (0..n as u32)
            .map(|id| lattice.within_chebyshev(id, config.closeness_threshold))
            .collect();

        Ok(Self {
            nodes,
            adjacency,
            close_nodes,
            edge_count: edges.len(),
            config,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn neighbors(&self, id: u32) -> &[u32] {
        &self.adjacency[id as usize]
    }

    pub fn has_edge(&self, a: u32, b: u32) -> bool {
        self.adjacency
            .get(a as usize)
            .is_some_and(|list| list.binary_search(&b).is_ok())
    }

    /// Each undirected edge once, as `(smaller, larger)`.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(a, list)| {
            list.iter()
                .copied()
                .filter(move |b| (a as u32) < *b)
                .map(move |b| (a as u32, b))
        })
    }

    /// Nodes within the closeness threshold of `id`.
    pub fn close_nodes(&self, id: u32) -> &[u32] {
        &self.close_nodes[id as usize]
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn age_distribution(&self) -> BTreeMap<AgeBand, u32> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.age_band).or_insert(0) += 1;
        }
        counts
    }

    /// Check that this graph is what `config` would build for `population`.
    ///
    /// A mismatch is reported, never repaired: callers that want a fresh
    /// graph must build one explicitly.
    pub fn validate(&self, config: &SimulationConfig, population: &PopulationModel) -> Result<()> {
        let expected_nodes = population.size();
        if self.node_count() != expected_nodes {
            return Err(Error::mismatch("node count", expected_nodes, self.node_count()));
        }

        let mut expected_ages = population.age_structure.allocate(expected_nodes as u32)?;
        // Empty bands label no node
        expected_ages.retain(|_, count| *count > 0);
        let found_ages = self.age_distribution();
        if expected_ages != found_ages {
            return Err(Error::mismatch(
                "age labels",
                describe_ages(&expected_ages),
                describe_ages(&found_ages),
            ));
        }

        let wanted = &config.graph_config;
        if wanted.strategy != self.config.strategy {
            return Err(Error::mismatch("strategy", &wanted.strategy, &self.config.strategy));
        }
        if wanted.params != self.config.params {
            return Err(Error::mismatch(
                "strategy parameters",
                describe_params(&wanted.params),
                describe_params(&self.config.params),
            ));
        }
        if wanted.closeness_threshold != self.config.closeness_threshold {
            return Err(Error::mismatch(
                "closeness threshold",
                wanted.closeness_threshold,
                self.config.closeness_threshold,
            ));
        }
        Ok(())
    }
}

fn describe_ages(ages: &BTreeMap<AgeBand, u32>) -> String {
    ages.iter()
        .map(|(band, count)| format!("{band}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_params(params: &BTreeMap<String, f64>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds a [`ContactGraph`] for one population.
pub struct GraphBuilder<'a> {
    population: &'a PopulationModel,
    config: &'a GraphConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(population: &'a PopulationModel, config: &'a GraphConfig) -> Self {
        Self { population, config }
    }

    pub fn build(&self, rng: &mut SimRng) -> Result<ContactGraph> {
        let strategy = self.config.strategy_kind()?;
        let n = self.population.size();

        let side = Lattice::side_for(n);
        let cells = (side as usize) * (side as usize);
        let mut kept = index::sample(rng, cells, n).into_vec();
        kept.sort_unstable();
        let positions: Vec<GridPos> = kept
            .into_iter()
            .map(|cell| GridPos::new(cell as u32 % side, cell as u32 / side))
            .collect();
        let lattice = Lattice::new(positions);

        let ages = self.population.assign_ages(n, rng)?;
        let nodes = lattice
            .positions()
            .iter()
            .zip(ages)
            .enumerate()
            .map(|(id, (location, age_band))| Node {
                id: id as u32,
                age_band,
                location: *location,
            })
            .collect();

        let mut edges = EdgeSet::new();
        strategy.connect(&lattice, rng, &mut edges)?;

        let graph = ContactGraph::from_edges(nodes, &edges, self.config.clone())?;
        log::debug!(
            "built {} graph for {}: {} nodes, {} edges on a {side}x{side} grid",
            strategy.name(),
            self.population.name,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}
