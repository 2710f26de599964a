//! Limits of a single search invocation.

use crate::types::Depth;

/// Constraints given by the protocol layer for one search.
///
/// The pool only stores these; interpreting them is up to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Remaining clock time per side in milliseconds.
    pub time: [u64; 2],
    /// Increment per move per side in milliseconds.
    pub inc: [u64; 2],
    /// Moves until the next time control, 0 when sudden death.
    pub movestogo: u32,
    /// Maximum depth, 0 for none.
    pub depth: Depth,
    /// Maximum number of nodes, 0 for none.
    pub nodes: u64,
    /// Exact time to spend in milliseconds, 0 for none.
    pub movetime: u64,
    /// Search until explicitly stopped.
    pub infinite: bool,
    /// Search in ponder mode.
    pub ponder: bool,
}

impl SearchLimits {
    /// Returns `true` when the engine has to budget the clock itself.
    pub fn use_time_management(&self) -> bool {
        !(self.movetime != 0 || self.depth != 0 || self.nodes != 0 || self.infinite)
    }

    /// Limits for a fixed-depth search.
    #[must_use]
    pub fn with_depth(depth: Depth) -> Self {
        SearchLimits {
            depth,
            ..Default::default()
        }
    }
}
