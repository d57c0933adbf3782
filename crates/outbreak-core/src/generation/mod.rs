//! Generation - contact graphs laid out on a square lattice

mod graph;
mod lattice;
mod strategy;

pub use graph::*;
pub use lattice::*;
pub use strategy::*;
