//! Data model for the simulation.
//!
//! Components are plain data: population structure, compartments,
//! transition probabilities and result series. Behaviour lives in
//! `generation` and `systems`.

mod disease;
mod population;
mod results;
mod transitions;

pub use disease::*;
pub use population::*;
pub use results::*;
pub use transitions::*;
