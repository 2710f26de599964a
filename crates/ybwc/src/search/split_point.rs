//! Shared record of a node whose moves are searched by several threads.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::position::{MovePicker, Position};
use crate::search::node_type::NodeType;
use crate::search::thread::Thread;
use crate::search::{Engine, MoveOf};
use crate::types::{Depth, Score};
use crate::util::bitset::AtomicBitSet;
use crate::util::spinlock::{SpinLock, SpinLockGuard};

/// Search parameters of the node being split, as seen by its master.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitParams<M> {
    pub alpha: Score,
    pub beta: Score,
    /// Best score found so far at the node.
    pub best_value: Score,
    pub depth: Depth,
    /// Move the opponent threatens, if the engine computed one.
    pub threat_move: Option<M>,
    /// Number of moves already taken from the move picker.
    pub move_count: usize,
    pub node_type: NodeType,
}

/// Mutable part of a split point, only reachable through [`SplitPointGuard`].
pub struct SplitPointState<E: Engine> {
    /// Alpha bound, raised by participants as they improve on it.
    pub alpha: Score,

    /// Best score found so far at this node.
    pub best_value: Score,

    /// Move that produced `best_value`, if it raised alpha.
    pub best_move: Option<MoveOf<E>>,

    beta: Score,
    depth: Depth,
    node_type: NodeType,
    threat_move: Option<MoveOf<E>>,
    move_count: usize,
    move_picker: E::MovePicker,
    position: Option<E::Position>,
    nodes: u64,
}

impl<E: Engine> SplitPointState<E> {
    fn empty() -> Self {
        SplitPointState {
            alpha: 0,
            best_value: 0,
            best_move: None,
            beta: 0,
            depth: 0,
            node_type: NodeType::NonPv,
            threat_move: None,
            move_count: 0,
            move_picker: E::MovePicker::default(),
            position: None,
            nodes: 0,
        }
    }

    #[inline]
    pub fn beta(&self) -> Score {
        self.beta
    }

    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    #[inline]
    pub fn threat_move(&self) -> Option<MoveOf<E>> {
        self.threat_move
    }

    /// Number of moves handed out so far, including those taken before the split.
    #[inline]
    pub fn move_count(&self) -> usize {
        self.move_count
    }

    /// Nodes reported by participants that have already finished.
    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Copy of the split position for a participant, with its node counter cleared.
    pub(crate) fn position_for_participant(&self) -> Option<E::Position> {
        self.position.clone().map(|mut pos| {
            pos.set_nodes_searched(0);
            pos
        })
    }

    pub(crate) fn add_nodes(&mut self, nodes: u64) {
        self.nodes += nodes;
    }

    /// Loads the parameters of a new split, taking over the master's move picker.
    pub(crate) fn load(
        &mut self,
        params: &SplitParams<MoveOf<E>>,
        best_move: Option<MoveOf<E>>,
        move_picker: &mut E::MovePicker,
        pos: &E::Position,
    ) {
        self.alpha = params.alpha;
        self.beta = params.beta;
        self.best_value = params.best_value;
        self.best_move = best_move;
        self.depth = params.depth;
        self.node_type = params.node_type;
        self.threat_move = params.threat_move;
        self.move_count = params.move_count;
        self.move_picker = std::mem::take(move_picker);
        self.position = Some(pos.clone());
        self.nodes = 0;
    }

    /// Hands the move picker back to the master and drops the position snapshot.
    pub(crate) fn unload(&mut self, move_picker: &mut E::MovePicker) {
        *move_picker = std::mem::take(&mut self.move_picker);
        self.position = None;
    }
}

/// A node of the search tree whose remaining moves are searched in parallel.
///
/// Every thread owns a fixed stack of split points; a split point is only in
/// use for the dynamic extent of the [`split`](super::threading::ThreadPool::split)
/// call that loaded it. The participant mask and the cutoff flag can be read
/// without locking, but are only written while the split point is locked.
pub struct SplitPoint<E: Engine> {
    /// Thread owning this slot, which is the master of every split loaded into it.
    master: Weak<Thread<E>>,
    master_idx: usize,
    slot: usize,

    slaves_mask: AtomicBitSet,
    cutoff: AtomicBool,

    /// Cleared as soon as one participant finishes; no late joins afterwards.
    all_slaves_searching: AtomicBool,

    /// Split point the master was working on when this one was created.
    parent: SpinLock<Option<Arc<SplitPoint<E>>>>,

    state: SpinLock<SplitPointState<E>>,
}

impl<E: Engine> SplitPoint<E> {
    pub(crate) fn new(master: Weak<Thread<E>>, master_idx: usize, slot: usize) -> Self {
        SplitPoint {
            master,
            master_idx,
            slot,
            slaves_mask: AtomicBitSet::new(),
            cutoff: AtomicBool::new(false),
            all_slaves_searching: AtomicBool::new(false),
            parent: SpinLock::new(None),
            state: SpinLock::new(SplitPointState::empty()),
        }
    }

    /// Locks the split point.
    #[inline]
    pub fn lock(&self) -> SplitPointGuard<'_, E> {
        SplitPointGuard {
            sp: self,
            state: self.state.lock(),
        }
    }

    /// Index of the thread that created the split.
    #[inline]
    pub fn master_idx(&self) -> usize {
        self.master_idx
    }

    /// Position of this split point in its master's stack.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn master(&self) -> Option<Arc<Thread<E>>> {
        self.master.upgrade()
    }

    /// Bit mask of the threads working on this split point.
    #[inline]
    pub fn participants(&self) -> u64 {
        self.slaves_mask.bits()
    }

    /// Indices of the threads working on this split point, ascending.
    pub fn participant_indices(&self) -> Vec<usize> {
        self.slaves_mask.iter().collect()
    }

    #[inline]
    pub fn participant_count(&self) -> usize {
        self.slaves_mask.count()
    }

    #[inline]
    pub fn has_participant(&self, idx: usize) -> bool {
        self.slaves_mask.test(idx)
    }

    /// Returns `true` once only the master is left.
    #[inline]
    pub fn is_master_only(&self) -> bool {
        self.slaves_mask.is_only(self.master_idx)
    }

    /// Whether a participant proved that this node fails high.
    #[inline]
    pub fn cutoff(&self) -> bool {
        self.cutoff.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn all_slaves_searching(&self) -> bool {
        self.all_slaves_searching.load(Ordering::Acquire)
    }

    /// Split point the master was contributing to when this one was created.
    pub fn parent(&self) -> Option<Arc<SplitPoint<E>>> {
        self.parent.lock().clone()
    }

    /// Number of split points above this one in the parent chain.
    pub fn nesting_level(&self) -> usize {
        let mut level = 0;
        let mut current = self.parent();
        while let Some(sp) = current {
            level += 1;
            current = sp.parent();
        }
        level
    }
}

/// Locked view of a split point.
///
/// Gives mutable access to the public fields of [`SplitPointState`] and is the
/// only way to advance the shared move picker.
pub struct SplitPointGuard<'a, E: Engine> {
    sp: &'a SplitPoint<E>,
    state: SpinLockGuard<'a, SplitPointState<E>>,
}

impl<E: Engine> SplitPointGuard<'_, E> {
    /// Takes the next move from the shared picker.
    ///
    /// Returns the move and its 1-based number among all moves of the node.
    pub fn next_move(&mut self) -> Option<(MoveOf<E>, usize)> {
        let mv = self.state.move_picker.next_move()?;
        self.state.move_count += 1;
        Some((mv, self.state.move_count))
    }

    /// Marks the node as failing high. Visible to every participant and to
    /// threads working below this split point.
    #[inline]
    pub fn set_cutoff(&mut self) {
        self.sp.cutoff.store(true, Ordering::Release);
    }

    #[inline]
    pub fn cutoff(&self) -> bool {
        self.sp.cutoff()
    }

    /// The split point this guard locks.
    #[inline]
    pub fn split_point(&self) -> &SplitPoint<E> {
        self.sp
    }

    /// Resets the bookkeeping for a new split owned by the master alone.
    pub(crate) fn reset(&mut self, parent: Option<Arc<SplitPoint<E>>>) {
        *self.sp.parent.lock() = parent;
        self.sp.cutoff.store(false, Ordering::Release);
        self.sp.slaves_mask.assign_only(self.sp.master_idx);
        self.sp.all_slaves_searching.store(true, Ordering::Release);
    }

    pub(crate) fn add_participant(&mut self, idx: usize) {
        self.sp.slaves_mask.set(idx);
    }

    /// Removes a finished participant. The master's bit stays until the split returns.
    pub(crate) fn remove_participant(&mut self, idx: usize) {
        if idx != self.sp.master_idx {
            self.sp.slaves_mask.reset(idx);
        }
    }

    pub(crate) fn close_to_late_joiners(&mut self) {
        self.sp.all_slaves_searching.store(false, Ordering::Release);
    }

    /// Detaches the split point from its parent once the split is merged.
    pub(crate) fn release(&mut self) {
        self.close_to_late_joiners();
        self.sp.parent.lock().take();
    }
}

impl<E: Engine> Deref for SplitPointGuard<'_, E> {
    type Target = SplitPointState<E>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<E: Engine> DerefMut for SplitPointGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}
