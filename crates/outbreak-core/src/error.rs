//! Error types shared by every layer of the simulation.

use thiserror::Error;

use crate::persistence::PersistError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between loading inputs and merging a sweep.
#[derive(Debug, Error)]
pub enum Error {
    /// Inputs violate a structural invariant (unknown graph strategy,
    /// malformed transition table, bad age bands, missing behaviour values).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A cached or loaded graph does not match the requested configuration.
    #[error("graph mismatch on {field}: expected {expected}, found {found}")]
    GraphMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// More initially infected nodes were requested than the graph holds.
    #[error("cannot infect {requested} nodes in a population of {population}")]
    Sampling { requested: u32, population: usize },

    /// One sweep combination failed; the sweep records it and moves on.
    #[error("combination {key} failed: {source}")]
    CombinationFailure {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph blob error: {0}")]
    Persist(#[from] PersistError),

    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Shorthand used by validators.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn mismatch(
        field: &'static str,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::GraphMismatch {
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_invariant() {
        let e = Error::Sampling {
            requested: 10,
            population: 3,
        };
        assert_eq!(e.to_string(), "cannot infect 10 nodes in a population of 3");

        let e = Error::mismatch("node count", 200, 150);
        assert_eq!(
            e.to_string(),
            "graph mismatch on node count: expected 200, found 150"
        );
    }

    #[test]
    fn test_combination_failure_keeps_its_source() {
        let e = Error::CombinationFailure {
            key: "shopping_1_2".into(),
            source: Box::new(Error::config("boom")),
        };
        assert!(e.to_string().contains("shopping_1_2"));
        let source = std::error::Error::source(&e).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("configuration error: boom"));
    }
}
