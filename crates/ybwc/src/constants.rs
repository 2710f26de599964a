//! Global constants

use crate::types::{Depth, Score};

/// Maximum number of threads supported.
///
/// Bounded by the width of the participant bit-set of a split point.
pub const MAX_THREADS: usize = 64;

/// Maximum number of split points that a single thread can have active at once.
pub const MAX_SPLITPOINTS_PER_THREAD: usize = 8;

/// Default cap on the number of threads (master included) working on one split point.
pub const DEFAULT_MAX_THREADS_PER_SPLITPOINT: usize = 5;

/// Maximum number of plies reachable from the root.
pub const MAX_PLY: Depth = 100;

/// Infinity score for search algorithms.
pub const SCORE_INF: Score = 30000;
