//! Young Brothers Wait Concept thread pool for parallel alpha-beta search.
//!
//! The pool owns a set of long-lived search threads. A thread searching a node
//! can [`split`](search::threading::ThreadPool::split) the remaining moves of
//! that node and recruit idle threads to help; recruits return to their idle
//! loop once the node is finished.

pub mod constants;
pub mod error;
pub mod position;
pub mod search;
pub mod synthetic;
pub mod types;
pub mod util;

pub use error::PoolError;
pub use position::{MovePicker, Position};
pub use search::Engine;
pub use search::options::PoolOptions;
pub use search::threading::{PoolGuard, ThreadPool};
