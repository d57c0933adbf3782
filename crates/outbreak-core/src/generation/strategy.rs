//! Named graph construction strategies.
//!
//! A strategy only decides which edges exist between nodes already placed on
//! the lattice. Names are resolved once, when the configuration is read; an
//! unknown name is a configuration error rather than a fallback.

use std::collections::BTreeSet;

use rand::distributions::{Distribution, WeightedIndex};

use super::Lattice;
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::rng::SimRng;

/// Deduplicated undirected edges, stored as `(smaller, larger)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet(BTreeSet<(u32, u32)>);

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an undirected edge. Self-loops and duplicates are ignored.
    pub fn insert(&mut self, a: u32, b: u32) -> bool {
        if a == b {
            return false;
        }
        self.0.insert((a.min(b), a.max(b)))
    }

    pub fn contains(&self, a: u32, b: u32) -> bool {
        self.0.contains(&(a.min(b), a.max(b)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().copied()
    }
}

/// Capability shared by every graph constructor.
pub trait GraphStrategy {
    /// Name used in configuration files.
    fn name(&self) -> &'static str;

    /// Add this strategy's edges between the nodes of `lattice`.
    fn connect(&self, lattice: &Lattice, rng: &mut SimRng, edges: &mut EdgeSet) -> Result<()>;
}

/// Kleinberg's navigable small world on a 2-D lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigableSmallWorld {
    /// Lattice radius of the short-range neighbourhood.
    pub short_connection_diameter: u32,
    /// Long-range links drawn per node.
    pub long_connection_diameter: u32,
    /// Exponent of the distance decay of long-range links.
    pub decay: f64,
}

impl NavigableSmallWorld {
    pub const NAME: &'static str = "navigable_small_world";
}

impl GraphStrategy for NavigableSmallWorld {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn connect(&self, lattice: &Lattice, rng: &mut SimRng, edges: &mut EdgeSet) -> Result<()> {
        let n = lattice.len() as u32;

        for node in 0..n {
            for other in lattice.within_manhattan(node, self.short_connection_diameter) {
                edges.insert(node, other);
            }
        }

        if self.long_connection_diameter == 0 || n < 2 {
            return Ok(());
        }

        let mut weights = vec![0.0f64; n as usize];
        for node in 0..n {
            let here = lattice.position(node);
            for (other, weight) in weights.iter_mut().enumerate() {
                let d = here.manhattan(&lattice.position(other as u32));
                *weight = if d == 0 { 0.0 } else { (d as f64).powf(-self.decay) };
            }
            // Fails only when every weight underflowed to zero
            let dist = WeightedIndex::new(&weights).map_err(|_| {
                Error::config(format!(
                    "decay {} leaves node {node} with no long-range partner at any distance",
                    self.decay
                ))
            })?;
            for _ in 0..self.long_connection_diameter {
                edges.insert(node, dist.sample(rng) as u32);
            }
        }
        Ok(())
    }
}

/// Every node connected to every other node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompleteGraph;

impl CompleteGraph {
    pub const NAME: &'static str = "complete";
}

impl GraphStrategy for CompleteGraph {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn connect(&self, lattice: &Lattice, _rng: &mut SimRng, edges: &mut EdgeSet) -> Result<()> {
        let n = lattice.len() as u32;
        for a in 0..n {
            for b in (a + 1)..n {
                edges.insert(a, b);
            }
        }
        Ok(())
    }
}

/// Strategy selected by name from a [`GraphConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphStrategyKind {
    NavigableSmallWorld(NavigableSmallWorld),
    Complete(CompleteGraph),
}

impl GraphStrategyKind {
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        let params = Params {
            strategy: &config.strategy,
            config,
        };
        match config.strategy.as_str() {
            NavigableSmallWorld::NAME => {
                params.only(&["short_connection_diameter", "long_connection_diameter", "decay"])?;
                Ok(Self::NavigableSmallWorld(NavigableSmallWorld {
                    short_connection_diameter: params.count("short_connection_diameter")?,
                    long_connection_diameter: params.count("long_connection_diameter")?,
                    decay: params.real("decay")?,
                }))
            }
            CompleteGraph::NAME => {
                params.only(&[])?;
                Ok(Self::Complete(CompleteGraph))
            }
            other => Err(Error::config(format!("unknown graph strategy {other:?}"))),
        }
    }
}

impl GraphStrategy for GraphStrategyKind {
    fn name(&self) -> &'static str {
        match self {
            Self::NavigableSmallWorld(s) => s.name(),
            Self::Complete(s) => s.name(),
        }
    }

    fn connect(&self, lattice: &Lattice, rng: &mut SimRng, edges: &mut EdgeSet) -> Result<()> {
        match self {
            Self::NavigableSmallWorld(s) => s.connect(lattice, rng, edges),
            Self::Complete(s) => s.connect(lattice, rng, edges),
        }
    }
}

struct Params<'a> {
    strategy: &'a str,
    config: &'a GraphConfig,
}

impl Params<'_> {
    fn only(&self, allowed: &[&str]) -> Result<()> {
        match self.config.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(extra) => Err(Error::config(format!(
                "graph strategy {:?} does not take parameter {extra:?}",
                self.strategy
            ))),
            None => Ok(()),
        }
    }

    fn real(&self, name: &str) -> Result<f64> {
        let value = self.config.params.get(name).copied().ok_or_else(|| {
            Error::config(format!(
                "graph strategy {:?} requires parameter {name:?}",
                self.strategy
            ))
        })?;
        if !value.is_finite() {
            return Err(Error::config(format!("parameter {name:?} must be finite")));
        }
        Ok(value)
    }

    fn count(&self, name: &str) -> Result<u32> {
        let value = self.real(name)?;
        if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(Error::config(format!(
                "parameter {name:?} must be a non-negative integer, got {value}"
            )));
        }
        Ok(value as u32)
    }
}
