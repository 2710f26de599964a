//! Deterministic synthetic game tree and an alpha-beta engine searching it.
//!
//! Every node is identified by a 64-bit key; children and leaf scores are
//! derived from the key by hashing, so the same seed always produces the same
//! tree. The tree is used to exercise the pool without a real game.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arrayvec::ArrayVec;

use crate::constants::{MAX_PLY, SCORE_INF};
use crate::position::{MovePicker, Position};
use crate::search::split_point::SplitPoint;
use crate::search::thread::Thread;
use crate::search::threading::ThreadPool;
use crate::search::{Engine, NodeType, SplitParams};
use crate::types::{Depth, Score};

/// Maximum number of children of a node.
pub const MAX_BRANCHING: usize = 32;

/// Depth searched when the limits do not set one.
pub const DEFAULT_DEPTH: Depth = 8;

/// Leaf scores lie in `-LEAF_RANGE..=LEAF_RANGE`.
pub const LEAF_RANGE: Score = 100;

/// Timer interval used while a movetime limit is active.
const TIMER_RESOLUTION_MS: u64 = 5;

#[inline]
fn mix(key: u64, salt: u64) -> u64 {
    let mut hasher = rapidhash::fast::RapidHasher::default();
    hasher.write_u64(key);
    hasher.write_u64(salt);
    hasher.finish()
}

/// Index of a child in its parent's move list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeMove(pub u32);

/// A node of the synthetic tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreePosition {
    key: u64,
    ply: usize,
    branching: usize,
    nodes: u64,
}

impl TreePosition {
    /// Creates the root of the tree generated by `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `branching` is 0 or larger than [`MAX_BRANCHING`].
    pub fn new(seed: u64, branching: usize) -> TreePosition {
        assert!(
            (1..=MAX_BRANCHING).contains(&branching),
            "branching factor must be between 1 and {MAX_BRANCHING}"
        );
        TreePosition {
            key: mix(seed, 0),
            ply: 0,
            branching,
            nodes: 0,
        }
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn ply(&self) -> usize {
        self.ply
    }

    #[inline]
    pub fn branching(&self) -> usize {
        self.branching
    }

    /// Static score of the node from the side to move's point of view.
    #[inline]
    pub fn evaluate(&self) -> Score {
        (mix(self.key, 1) % (2 * LEAF_RANGE as u64 + 1)) as Score - LEAF_RANGE
    }

    #[inline]
    fn child_key(&self, mv: TreeMove) -> u64 {
        mix(self.key, u64::from(mv.0) + 2)
    }

    /// Plays `mv` and returns the key needed to take it back.
    #[inline]
    pub fn do_move(&mut self, mv: TreeMove) -> u64 {
        debug_assert!((mv.0 as usize) < self.branching);
        let previous = self.key;
        self.key = self.child_key(mv);
        self.ply += 1;
        self.nodes += 1;
        previous
    }

    #[inline]
    pub fn undo_move(&mut self, previous: u64) {
        self.key = previous;
        self.ply -= 1;
    }

    /// Position after `mv`, with the node counter left untouched.
    pub fn child(&self, mv: TreeMove) -> TreePosition {
        TreePosition {
            key: self.child_key(mv),
            ply: self.ply + 1,
            branching: self.branching,
            nodes: self.nodes,
        }
    }
}

impl Position for TreePosition {
    type Move = TreeMove;

    fn legal_moves(&self) -> Vec<TreeMove> {
        (0..self.branching as u32).map(TreeMove).collect()
    }

    #[inline]
    fn nodes_searched(&self) -> u64 {
        self.nodes
    }

    #[inline]
    fn set_nodes_searched(&mut self, nodes: u64) {
        self.nodes = nodes;
    }
}

/// Move list with a cursor.
#[derive(Clone, Debug, Default)]
pub struct TreeMovePicker {
    moves: ArrayVec<TreeMove, MAX_BRANCHING>,
    cursor: usize,
}

impl TreeMovePicker {
    /// Generates the moves of `pos`, the most promising first.
    ///
    /// Moves are ordered by the static score of the child, lowest first since
    /// that score is from the opponent's point of view.
    pub fn new(pos: &TreePosition) -> TreeMovePicker {
        let mut scored: ArrayVec<(Score, TreeMove), MAX_BRANCHING> = (0..pos.branching as u32)
            .map(|i| {
                let mv = TreeMove(i);
                (pos.child(mv).evaluate(), mv)
            })
            .collect();
        scored.sort_unstable();

        TreeMovePicker {
            moves: scored.into_iter().map(|(_, mv)| mv).collect(),
            cursor: 0,
        }
    }

    /// Picker over a fixed list of moves, in the given order.
    pub fn from_moves(moves: impl IntoIterator<Item = TreeMove>) -> TreeMovePicker {
        moves.into_iter().collect()
    }

    /// Number of moves not yet returned.
    pub fn remaining(&self) -> usize {
        self.moves.len() - self.cursor
    }
}

impl FromIterator<TreeMove> for TreeMovePicker {
    fn from_iter<I: IntoIterator<Item = TreeMove>>(iter: I) -> Self {
        TreeMovePicker {
            moves: iter.into_iter().take(MAX_BRANCHING).collect(),
            cursor: 0,
        }
    }
}

impl MovePicker for TreeMovePicker {
    type Move = TreeMove;

    fn next_move(&mut self) -> Option<TreeMove> {
        let mv = self.moves.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(mv)
    }
}

/// Negamax value of `pos` searched to `depth` without any pruning.
pub fn minimax(pos: &TreePosition, depth: Depth) -> Score {
    if depth <= 0 {
        return pos.evaluate();
    }
    (0..pos.branching as u32)
        .map(|i| -minimax(&pos.child(TreeMove(i)), depth - 1))
        .max()
        .unwrap_or_else(|| pos.evaluate())
}

/// Negamax value of `pos` when only `moves` may be played at the root.
pub fn minimax_restricted(pos: &TreePosition, depth: Depth, moves: &[TreeMove]) -> Score {
    if depth <= 0 || moves.is_empty() {
        return minimax(pos, depth);
    }
    moves
        .iter()
        .map(|&mv| -minimax(&pos.child(mv), depth - 1))
        .max()
        .unwrap_or_else(|| pos.evaluate())
}

/// Outcome of the last completed iteration of a search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: Option<TreeMove>,
    pub score: Score,
    pub depth: Depth,
    pub nodes: u64,
    pub max_ply: usize,
    pub elapsed: Duration,
}

/// Statistics gathered by the engine over its lifetime.
#[derive(Debug, Default)]
struct Counters {
    splits: AtomicU64,
    split_point_searches: AtomicU64,
}

/// Fail-soft alpha-beta search over [`TreePosition`] that splits with the pool.
#[derive(Debug, Default)]
pub struct TreeSearch {
    /// Split with the bookkeeping-only mode instead of recruiting threads.
    fake_split: bool,
    result: Mutex<Option<SearchResult>>,
    counters: Counters,
}

impl TreeSearch {
    pub fn new() -> TreeSearch {
        TreeSearch::default()
    }

    /// Engine whose splits never recruit other threads.
    pub fn with_fake_split() -> TreeSearch {
        TreeSearch {
            fake_split: true,
            ..TreeSearch::default()
        }
    }

    /// Result of the most recent search, once it has finished an iteration.
    pub fn last_result(&self) -> Option<SearchResult> {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of split calls made so far.
    pub fn splits(&self) -> u64 {
        self.counters.splits.load(Ordering::Relaxed)
    }

    /// Number of times a thread has entered a split point.
    pub fn split_point_searches(&self) -> u64 {
        self.counters.split_point_searches.load(Ordering::Relaxed)
    }

    fn store_result(&self, result: SearchResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        pool: &ThreadPool<Self>,
        thread: &Arc<Thread<Self>>,
        pos: &mut TreePosition,
        mut alpha: Score,
        beta: Score,
        depth: Depth,
        node_type: NodeType,
        mut move_picker: TreeMovePicker,
    ) -> Score {
        if depth <= 0 {
            return pos.evaluate();
        }

        thread.update_max_ply(pos.ply());

        let mut best_value = -SCORE_INF;
        let mut best_move = None;
        let mut move_count = 0;

        while let Some(mv) = move_picker.next_move() {
            move_count += 1;
            if node_type.is_root() {
                pool.signals().set_first_root_move(move_count == 1);
            }

            let previous = pos.do_move(mv);
            let value = -self.search(
                pool,
                thread,
                pos,
                -beta,
                -alpha,
                depth - 1,
                node_type.child(),
                TreeMovePicker::new(pos),
            );
            pos.undo_move(previous);

            if pool.signals().stop() || thread.cutoff_occurred() {
                return 0;
            }

            if node_type.is_root() {
                let score = if move_count == 1 || value > alpha {
                    value
                } else {
                    -SCORE_INF
                };
                pool.context().update_root_move(mv, score);
            }

            if value > best_value {
                best_value = value;
                if value > alpha {
                    best_move = Some(mv);
                    if value >= beta {
                        break;
                    }
                    alpha = value;
                }
            }

            if depth >= pool.min_split_depth()
                && best_value < beta
                && move_picker.remaining() > 0
                && (self.fake_split || pool.any_available_to(thread))
            {
                let params = SplitParams {
                    alpha,
                    beta,
                    best_value,
                    depth,
                    threat_move: None,
                    move_count,
                    node_type,
                };

                self.counters.splits.fetch_add(1, Ordering::Relaxed);
                best_value = if self.fake_split {
                    pool.split::<true>(thread, pos, params, &mut best_move, &mut move_picker)
                } else {
                    pool.split::<false>(thread, pos, params, &mut best_move, &mut move_picker)
                };

                if pool.signals().stop() || thread.cutoff_occurred() {
                    return 0;
                }
                if best_value >= beta {
                    break;
                }
                alpha = alpha.max(best_value);
            }
        }

        if move_count == 0 {
            return pos.evaluate();
        }
        best_value
    }
}

impl Engine for TreeSearch {
    type Position = TreePosition;
    type MovePicker = TreeMovePicker;
    type StateStack = Vec<u64>;

    fn think(&self, pool: &ThreadPool<Self>, thread: &Arc<Thread<Self>>) {
        let context = pool.context();
        let limits = context.limits();
        let Some(mut pos) = context.root_position() else {
            return;
        };

        if limits.movetime > 0 {
            pool.set_timer(TIMER_RESOLUTION_MS);
        }

        let max_depth = if limits.depth > 0 { limits.depth } else { DEFAULT_DEPTH }.min(MAX_PLY);
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = None;

        if context.root_moves().is_empty() {
            self.store_result(SearchResult {
                score: pos.evaluate(),
                ..SearchResult::default()
            });
        } else {
            for depth in 1..=max_depth {
                let ordered: Vec<TreeMove> =
                    context.root_moves().iter().map(|rm| rm.mv()).collect();
                let score = self.search(
                    pool,
                    thread,
                    &mut pos,
                    -SCORE_INF,
                    SCORE_INF,
                    depth,
                    NodeType::Root,
                    TreeMovePicker::from_moves(ordered),
                );

                if pool.signals().stop() {
                    break;
                }

                context.finish_iteration();
                self.store_result(SearchResult {
                    best_move: context.best_root_moves(1).first().map(|rm| rm.mv()),
                    score,
                    depth,
                    nodes: pos.nodes_searched(),
                    max_ply: thread.max_ply(),
                    elapsed: context.elapsed(),
                });
            }
        }

        pool.set_timer(0);
        pool.hold_result_until_stopped(thread);
    }

    fn search_split_point(
        &self,
        pool: &ThreadPool<Self>,
        thread: &Arc<Thread<Self>>,
        sp: &SplitPoint<Self>,
        pos: &mut TreePosition,
    ) {
        self.counters
            .split_point_searches
            .fetch_add(1, Ordering::Relaxed);

        let (beta, depth, node_type) = {
            let guard = sp.lock();
            (guard.beta(), guard.depth(), guard.node_type())
        };

        loop {
            let (mv, move_count, alpha) = {
                let mut guard = sp.lock();
                if guard.cutoff() {
                    break;
                }
                let Some((mv, move_count)) = guard.next_move() else {
                    break;
                };
                (mv, move_count, guard.alpha)
            };

            let previous = pos.do_move(mv);
            let value = -self.search(
                pool,
                thread,
                pos,
                -beta,
                -alpha,
                depth - 1,
                node_type.child(),
                TreeMovePicker::new(pos),
            );
            pos.undo_move(previous);

            let mut guard = sp.lock();
            if pool.signals().stop() || thread.cutoff_occurred() {
                break;
            }

            if node_type.is_root() {
                let score = if move_count == 1 || value > guard.alpha {
                    value
                } else {
                    -SCORE_INF
                };
                pool.context().update_root_move(mv, score);
            }

            if value > guard.best_value {
                guard.best_value = value;
                if value > guard.alpha {
                    guard.best_move = Some(mv);
                    if value >= beta {
                        guard.set_cutoff();
                        break;
                    }
                    guard.alpha = value;
                }
            }
        }
    }

    fn check_time(&self, pool: &ThreadPool<Self>) {
        let limits = pool.context().limits();
        if limits.movetime > 0
            && pool.context().elapsed() >= Duration::from_millis(limits.movetime)
        {
            pool.signals().set_stop(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_is_deterministic() {
        let a = TreePosition::new(42, 5);
        let b = TreePosition::new(42, 5);
        assert_eq!(a, b);
        assert_eq!(a.child(TreeMove(3)), b.child(TreeMove(3)));
        assert_ne!(a.child(TreeMove(3)).key(), a.child(TreeMove(4)).key());
        assert_ne!(TreePosition::new(43, 5).key(), a.key());
    }

    #[test]
    fn test_evaluate_range() {
        let root = TreePosition::new(7, 8);
        for i in 0..8 {
            let score = root.child(TreeMove(i)).evaluate();
            assert!((-LEAF_RANGE..=LEAF_RANGE).contains(&score));
        }
    }

    #[test]
    fn test_do_undo_move() {
        let mut pos = TreePosition::new(1, 4);
        let root = pos.clone();

        let previous = pos.do_move(TreeMove(2));
        assert_eq!(pos.key(), root.child(TreeMove(2)).key());
        assert_eq!(pos.ply(), 1);
        assert_eq!(pos.nodes_searched(), 1);

        pos.undo_move(previous);
        assert_eq!(pos.key(), root.key());
        assert_eq!(pos.ply(), 0);
        assert_eq!(pos.nodes_searched(), 1);
    }

    #[test]
    fn test_picker_yields_every_move_once() {
        let pos = TreePosition::new(9, 6);
        let mut picker = TreeMovePicker::new(&pos);
        assert_eq!(picker.remaining(), 6);

        let mut seen = Vec::new();
        while let Some(mv) = picker.next_move() {
            seen.push(mv);
        }
        seen.sort();
        assert_eq!(seen, pos.legal_moves());
        assert_eq!(picker.remaining(), 0);
        assert_eq!(picker.next_move(), None);
    }

    #[test]
    fn test_picker_orders_by_child_score() {
        let pos = TreePosition::new(11, 10);
        let mut picker = TreeMovePicker::new(&pos);
        let mut last = Score::MIN;
        while let Some(mv) = picker.next_move() {
            let score = pos.child(mv).evaluate();
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_default_picker_is_empty() {
        let mut picker = TreeMovePicker::default();
        assert_eq!(picker.next_move(), None);
    }

    #[test]
    fn test_minimax_depth_one() {
        let pos = TreePosition::new(3, 4);
        let expected = (0..4)
            .map(|i| -pos.child(TreeMove(i)).evaluate())
            .max()
            .unwrap();
        assert_eq!(minimax(&pos, 1), expected);
        assert_eq!(minimax(&pos, 0), pos.evaluate());
    }

    #[test]
    fn test_minimax_restricted() {
        let pos = TreePosition::new(5, 5);
        let all: Vec<TreeMove> = pos.legal_moves();
        assert_eq!(minimax_restricted(&pos, 3, &all), minimax(&pos, 3));

        let one = [TreeMove(2)];
        assert_eq!(
            minimax_restricted(&pos, 3, &one),
            -minimax(&pos.child(TreeMove(2)), 2)
        );
    }
}
