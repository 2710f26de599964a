//! Per-search state owned by the pool.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::position::Position;
use crate::search::root_move::{RootMove, sort_root_moves};
use crate::search::{Engine, MoveOf, SearchLimits};
use crate::types::Score;

/// Root position, limits and root moves of the current search.
///
/// Written only by [`ThreadPool::begin_search`](super::threading::ThreadPool::begin_search)
/// while no search is running; the engine reads it through
/// [`ThreadPool::context`](super::threading::ThreadPool::context).
pub struct SearchContext<E: Engine> {
    root_position: RwLock<Option<E::Position>>,
    limits: RwLock<SearchLimits>,
    root_moves: Mutex<Vec<RootMove<MoveOf<E>>>>,
    setup_states: Mutex<Option<E::StateStack>>,
    search_time: Mutex<Instant>,
}

impl<E: Engine> SearchContext<E> {
    pub(crate) fn new() -> Self {
        SearchContext {
            root_position: RwLock::new(None),
            limits: RwLock::new(SearchLimits::default()),
            root_moves: Mutex::new(Vec::new()),
            setup_states: Mutex::new(None),
            search_time: Mutex::new(Instant::now()),
        }
    }

    /// Installs everything a new search needs.
    ///
    /// The root move list is rebuilt from the legal moves of `pos`, keeping
    /// only those in `search_moves` unless it is empty.
    pub(crate) fn install(
        &self,
        pos: &E::Position,
        limits: &SearchLimits,
        search_moves: &[MoveOf<E>],
        states: Option<E::StateStack>,
    ) {
        *self.search_time.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        *self.root_position.write().unwrap_or_else(PoisonError::into_inner) = Some(pos.clone());
        *self.limits.write().unwrap_or_else(PoisonError::into_inner) = limits.clone();
        *self.setup_states.lock().unwrap_or_else(PoisonError::into_inner) = states;

        let mut root_moves = self.root_moves();
        root_moves.clear();
        root_moves.extend(
            pos.legal_moves()
                .into_iter()
                .filter(|mv| search_moves.is_empty() || search_moves.contains(mv))
                .map(RootMove::new),
        );
    }

    /// Returns a copy of the root position, if a search was ever started.
    pub fn root_position(&self) -> Option<E::Position> {
        self.root_position
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the limits of the current search.
    pub fn limits(&self) -> SearchLimits {
        self.limits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn clear_ponder(&self) {
        self.limits
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .ponder = false;
    }

    /// Locks and returns the root move list.
    pub fn root_moves(&self) -> MutexGuard<'_, Vec<RootMove<MoveOf<E>>>> {
        self.root_moves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the `n` best root moves in descending score order.
    pub fn best_root_moves(&self, n: usize) -> Vec<RootMove<MoveOf<E>>> {
        let mut moves = self.root_moves().clone();
        sort_root_moves(&mut moves);
        moves.truncate(n);
        moves
    }

    /// Records the score of a root move. Unknown moves are ignored.
    pub fn update_root_move(&self, mv: MoveOf<E>, score: Score) {
        let mut root_moves = self.root_moves();
        if let Some(rm) = root_moves.iter_mut().find(|rm| rm.mv() == mv) {
            rm.score = score;
        }
    }

    /// Copies every score to `previous_score` and re-sorts the list.
    pub fn finish_iteration(&self) {
        let mut root_moves = self.root_moves();
        sort_root_moves(&mut root_moves);
        for rm in root_moves.iter_mut() {
            rm.previous_score = rm.score;
        }
    }

    /// Locks and returns the undo storage handed over at search start.
    pub fn setup_states(&self) -> MutexGuard<'_, Option<E::StateStack>> {
        self.setup_states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Instant at which the current search was started.
    pub fn search_time(&self) -> Instant {
        *self.search_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since the current search was started.
    pub fn elapsed(&self) -> Duration {
        self.search_time().elapsed()
    }
}
