//! Common type aliases used throughout the crate.

/// Search depth in plies.
pub type Depth = i32;

/// Search score from the side to move's point of view.
pub type Score = i32;
