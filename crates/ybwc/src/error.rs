//! Errors reported by the thread pool.

use thiserror::Error;

use crate::types::Depth;

/// Configuration and start-up failures of the thread pool.
///
/// Scheduling itself has no error channel: a refused split simply returns the
/// unchanged bound, and broken invariants are assertions.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("the pool needs at least one thread")]
    NoThreads,

    #[error("requested {requested} threads but at most {max} are supported")]
    TooManyThreads { requested: usize, max: usize },

    #[error("threads per split point must be between 1 and {max}, got {value}")]
    InvalidSplitWidth { value: usize, max: usize },

    #[error("minimum split depth must be positive, got {0}")]
    InvalidSplitDepth(Depth),

    #[error("unknown option `{0}`")]
    UnknownOption(String),

    #[error("invalid value `{value}` for option `{name}`")]
    InvalidOptionValue { name: String, value: String },

    #[error("failed to spawn search thread")]
    Spawn(#[from] std::io::Error),
}
