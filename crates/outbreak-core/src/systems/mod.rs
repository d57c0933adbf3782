//! Systems - logic that advances an epidemic over a contact graph

mod analysis;
mod contacts;
mod epidemic;

pub use analysis::*;
pub use contacts::*;
pub use epidemic::*;
