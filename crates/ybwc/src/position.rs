//! Interfaces the pool needs from the game being searched.

use std::fmt;

/// A searchable game position.
///
/// Positions are snapshotted into split points and cloned by every participant,
/// so cloning should be cheap.
pub trait Position: Clone + Send + Sync + 'static {
    /// A move in this game.
    type Move: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Returns all legal moves in this position.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// Returns the number of nodes visited from this position so far.
    fn nodes_searched(&self) -> u64;

    /// Overwrites the visited node counter.
    fn set_nodes_searched(&mut self, nodes: u64);
}

/// Move source shared by all participants of a split point.
///
/// Once handed to a split point the picker is only reachable through the split
/// point's lock guard, so it never needs internal synchronization.
pub trait MovePicker: Default + Send + 'static {
    type Move;

    /// Returns the next move to search, or `None` when exhausted.
    fn next_move(&mut self) -> Option<Self::Move>;
}
