//! Error types.

use thiserror::Error;

use crate::{config::ConfigError, term::Sort};

/// Errors reported by the derivative engine.
///
/// Stuck derivatives and undecided memberships are not errors: they are returned as
/// unevaluated terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid engine configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A term of the wrong sort was passed to an operation
    #[error("{operation} expects a term of sort {expected}, got {found}")]
    SortMismatch {
        operation: &'static str,
        expected: Sort,
        found: Sort,
    },
    /// An operation that needs a variable-free term was given one with variables
    #[error("{operation} expects a ground term, got {term}")]
    NotGround { operation: &'static str, term: String },
}

/// Result type of the engine's operations.
pub type Result<T> = std::result::Result<T, Error>;
