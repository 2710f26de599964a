//! Parallel search scheduling.
//!
//! The node-level search algorithm is supplied by an [`Engine`]. The pool
//! calls [`Engine::think`] on the main thread for every search started with
//! [`ThreadPool::begin_search`], and [`Engine::search_split_point`] on every
//! thread that takes part in a split.

pub mod limits;
pub mod node_type;
pub mod options;
pub mod root_move;
pub mod search_context;
pub mod signals;
pub mod split_point;
pub mod thread;
pub mod threading;
pub mod timer;

use std::sync::Arc;

use crate::position::{MovePicker, Position};
use crate::search::split_point::SplitPoint;
use crate::search::thread::Thread;
use crate::search::threading::ThreadPool;

pub use limits::SearchLimits;
pub use node_type::NodeType;
pub use root_move::RootMove;
pub use signals::Signals;
pub use split_point::SplitParams;

/// Move type of an engine's positions.
pub type MoveOf<E> = <<E as Engine>::Position as Position>::Move;

/// Search algorithm driven by the thread pool.
pub trait Engine: Send + Sync + Sized + 'static {
    /// Position type searched by the engine.
    type Position: Position;

    /// Move source handed to split points.
    type MovePicker: MovePicker<Move = MoveOf<Self>>;

    /// Undo history handed over by the caller when a search starts.
    type StateStack: Send + 'static;

    /// Runs a complete top-level search on the main thread.
    ///
    /// The root position, limits and root moves are available through
    /// `pool.context()`. The pool marks the main thread parked again when this
    /// returns.
    fn think(&self, pool: &ThreadPool<Self>, thread: &Arc<Thread<Self>>);

    /// Searches the remaining moves of `sp` on behalf of `thread`.
    ///
    /// `pos` is a private copy of the split point's position whose node counter
    /// starts at zero; whatever it holds on return is added to the split
    /// point's node count. Moves must be taken with
    /// [`SplitPointGuard::next_move`](split_point::SplitPointGuard::next_move)
    /// and results merged through the same guard.
    fn search_split_point(
        &self,
        pool: &ThreadPool<Self>,
        thread: &Arc<Thread<Self>>,
        sp: &SplitPoint<Self>,
        pos: &mut Self::Position,
    );

    /// Called by the timer thread every time it wakes up.
    fn check_time(&self, _pool: &ThreadPool<Self>) {}
}
