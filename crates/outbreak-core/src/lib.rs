//! Outbreak Core - contact-graph epidemic simulation
//!
//! Simulates an outbreak in an age-structured community whose contacts form
//! a graph, and sweeps over behaviour parameters (how often people visit
//! places and how many others they meet there) to compare outcomes.
//!
//! # Architecture
//!
//! | Module | Role |
//! |--------|------|
//! | `components` | Plain data: age bands, compartments, transition tables, result series |
//! | `generation` | Lattice placement and contact graph strategies |
//! | `systems` | The daily epidemic step, behaviour contacts, case growth |
//! | `engine` | `SimulationRunner`: seeded single and averaged runs |
//! | `sweep` | Combination enumeration, intermediary store, orchestrator |
//! | `persistence` | Versioned bincode blobs for precomputed graphs |
//! | `config` | JSON input schemas |
//!
//! # Example
//!
//! ```rust,no_run
//! use outbreak_core::prelude::*;
//!
//! # fn main() -> outbreak_core::error::Result<()> {
//! let communities: CommunityData = read_json("data/community.json")?;
//! let infection: InfectionParameters = read_json("data/infection.json")?;
//! let config: SimulationConfig = read_json("data/simulation.json")?;
//!
//! let population = communities.population("Kingston")?;
//! let mut rng = seeded(42);
//! let graph = GraphBuilder::new(&population, &config.graph_config).build(&mut rng)?;
//!
//! let mut runner = SimulationRunner::shared(graph.into(), &population, infection, config)?;
//! let averaged = runner.run_multiple(10, &mut rng)?;
//! println!("{:?}", averaged.sampled(7));
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod persistence;
pub mod rng;
pub mod sweep;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::*;
    pub use crate::engine::{GraphSource, SimulationRunner};
    pub use crate::error::Error;
    pub use crate::generation::{ContactGraph, GraphBuilder};
    pub use crate::rng::{derive_seed, seeded, SimRng};
    pub use crate::sweep::{
        BehaviourCombination, BehaviourVariant, GraphPolicy, Parallelism, ResultTree, SweepInputs,
        SweepOptions, SweepOrchestrator, SweepResult,
    };
}
