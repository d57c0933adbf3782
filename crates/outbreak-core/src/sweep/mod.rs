//! Sweep - behaviour combinations, partial results and their merge

mod combination;
mod orchestrator;
mod result;
mod store;
mod tree;

pub use combination::*;
pub use orchestrator::*;
pub use result::*;
pub use store::IntermediaryStore;
pub use tree::*;
