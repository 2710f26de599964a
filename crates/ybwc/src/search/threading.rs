//! Thread pool and the split protocol.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use log::{debug, trace};

use crate::constants::{MAX_SPLITPOINTS_PER_THREAD, MAX_THREADS};
use crate::error::PoolError;
use crate::position::Position;
use crate::search::options::PoolOptions;
use crate::search::search_context::SearchContext;
use crate::search::signals::Signals;
use crate::search::split_point::SplitParams;
use crate::search::thread::{Thread, ThreadRole};
use crate::search::timer::TimerThread;
use crate::search::{Engine, MoveOf, SearchLimits};
use crate::types::{Depth, Score};

/// Pool of search threads sharing one search tree.
///
/// Thread 0 is the main thread: it runs [`Engine::think`] for every search
/// started with [`ThreadPool::begin_search`]. The other threads wait in their
/// idle loop until a searching thread recruits them through
/// [`ThreadPool::split`].
pub struct ThreadPool<E: Engine> {
    self_ref: Weak<ThreadPool<E>>,
    engine: E,

    threads: RwLock<Vec<Arc<Thread<E>>>>,
    timer: Mutex<Option<Arc<TimerThread>>>,

    /// Serializes recruitment so that two masters never book the same thread.
    mutex: Mutex<()>,

    /// Notified by the main thread, under its own mutex, whenever it parks.
    sleep_condition: Condvar,

    min_split_depth: AtomicI32,
    max_threads_per_split_point: AtomicUsize,
    use_sleeping_threads: AtomicBool,
    late_join: AtomicBool,

    signals: Signals,
    context: SearchContext<E>,
}

impl<E: Engine> ThreadPool<E> {
    /// Creates the pool: the timer, the main thread, and as many workers as
    /// `options` asks for.
    pub fn new(engine: E, options: &PoolOptions) -> Result<PoolGuard<E>, PoolError> {
        options.validate()?;

        let pool = Arc::new_cyclic(|weak| ThreadPool {
            self_ref: weak.clone(),
            engine,
            threads: RwLock::new(Vec::with_capacity(options.threads)),
            timer: Mutex::new(None),
            mutex: Mutex::new(()),
            sleep_condition: Condvar::new(),
            min_split_depth: AtomicI32::new(options.min_split_depth),
            max_threads_per_split_point: AtomicUsize::new(options.max_threads_per_split_point),
            use_sleeping_threads: AtomicBool::new(options.use_sleeping_threads),
            late_join: AtomicBool::new(options.late_join),
            signals: Signals::default(),
            context: SearchContext::new(),
        });

        // On failure the guard shuts down whatever was already started.
        let guard = PoolGuard { pool };
        guard.init(options)?;
        Ok(guard)
    }

    fn init(&self, options: &PoolOptions) -> Result<(), PoolError> {
        let pool = self.shared();

        let timer = TimerThread::spawn(Arc::clone(&pool))?;
        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(timer);

        let main = Thread::spawn(0, ThreadRole::Main, pool)?;
        self.threads_mut().push(main);
        self.wait_for_search_finished();

        self.read_options(options)
    }

    /// Applies live configuration values and resizes the pool.
    pub fn read_options(&self, options: &PoolOptions) -> Result<(), PoolError> {
        options.validate()?;

        self.min_split_depth
            .store(options.min_split_depth, Ordering::Relaxed);
        self.max_threads_per_split_point
            .store(options.max_threads_per_split_point, Ordering::Relaxed);
        self.use_sleeping_threads
            .store(options.use_sleeping_threads, Ordering::Relaxed);
        self.late_join.store(options.late_join, Ordering::Relaxed);

        self.resize(options.threads)
    }

    /// Current configuration, thread count included.
    pub fn options(&self) -> PoolOptions {
        PoolOptions {
            threads: self.size(),
            min_split_depth: self.min_split_depth(),
            max_threads_per_split_point: self.max_threads_per_split_point(),
            use_sleeping_threads: self.use_sleeping_threads(),
            late_join: self.late_join(),
        }
    }

    /// Grows or shrinks the pool to `requested` threads.
    ///
    /// Threads below `requested` are kept; new ones are appended and excess
    /// ones are destroyed from the end. Waits for a running search to finish
    /// first.
    pub fn resize(&self, requested: usize) -> Result<(), PoolError> {
        if requested == 0 {
            return Err(PoolError::NoThreads);
        }
        if requested > MAX_THREADS {
            return Err(PoolError::TooManyThreads {
                requested,
                max: MAX_THREADS,
            });
        }

        self.wait_for_search_finished();

        let (previous, removed) = {
            let mut threads = self.threads_mut();
            let previous = threads.len();

            if previous < requested {
                let pool = self.shared();
                for idx in previous..requested {
                    threads.push(Thread::spawn(idx, ThreadRole::Worker, Arc::clone(&pool))?);
                }
            }

            let keep = requested.min(threads.len());
            let removed = threads.split_off(keep);
            (previous, removed)
        };

        // Joined outside the write lock: a worker finishing a late-join scan
        // may still need to read the thread list.
        for thread in removed {
            thread.terminate();
        }

        if previous != requested {
            debug!("resized thread pool from {previous} to {requested} threads");
        }
        Ok(())
    }

    /// Stops the timer and destroys every thread.
    ///
    /// The timer goes first since its callback may read thread data. Calling
    /// this again is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if a search is still running.
    pub fn shutdown(&self) {
        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(timer) = timer {
            timer.terminate();
        }

        let threads = std::mem::take(&mut *self.threads_mut());
        if threads.is_empty() {
            return;
        }

        let count = threads.len();
        for thread in threads {
            thread.terminate();
        }
        debug!("thread pool shut down, {count} threads joined");
    }

    /// Marks every thread unparked at the start of a search.
    ///
    /// Without sleeping threads they are also woken right away; otherwise
    /// they stay asleep until a split recruits them.
    pub(crate) fn wake_all_for_new_search(&self) {
        let wake = !self.use_sleeping_threads();
        for thread in self.threads().iter() {
            thread.reset_max_ply();
            thread.set_do_sleep(false);
            if wake {
                thread.wake_up();
            }
        }
    }

    /// Marks every thread except the main one parked after a search.
    ///
    /// The main thread parks itself in its own loop, which avoids racing with
    /// the next `begin_search()`.
    pub(crate) fn park_all_but_main(&self) {
        for thread in self.threads().iter().skip(1) {
            thread.set_do_sleep(true);
        }
    }

    /// Returns true if at least one thread could help `master` right now.
    ///
    /// A cheap unlocked hint that lets the search skip a split that would
    /// recruit nobody.
    pub fn any_available_to(&self, master: &Thread<E>) -> bool {
        self.threads().iter().any(|th| th.is_available_to(master))
    }

    /// Distributes the remaining moves of a node among available threads.
    ///
    /// Called by the search with the master's position, its current bounds and
    /// the move picker of the node; the picker is shared by all participants
    /// and handed back when the call returns. Returns the best value found,
    /// which is `params.best_value` unchanged if no participant improved on it
    /// or the split was refused. `best_move` receives the best move.
    ///
    /// A split is refused when the master's split point stack is full. With
    /// `FAKE` set no other thread is recruited, but the master runs the same
    /// bookkeeping and searches the node through its idle loop.
    pub fn split<const FAKE: bool>(
        &self,
        master: &Arc<Thread<E>>,
        pos: &mut E::Position,
        params: SplitParams<MoveOf<E>>,
        best_move: &mut Option<MoveOf<E>>,
        move_picker: &mut E::MovePicker,
    ) -> Score {
        debug_assert!(params.best_value <= params.alpha);
        debug_assert!(params.alpha < params.beta);
        debug_assert!(params.depth > 0);
        debug_assert!(master.is_searching());

        let size = master.split_points_size();
        if size >= MAX_SPLITPOINTS_PER_THREAD {
            trace!("thread {} refused split: split point stack full", master.idx());
            return params.best_value;
        }

        // Pick the next available split point from the split point stack.
        let sp = Arc::clone(master.split_point_slot(size));
        let parent = master.active_split_point();

        // Booking must be done under lock protection to avoid concurrent
        // allocation of the same slave by another master.
        let recruited = {
            let _coord = self.coordination_lock();
            let mut guard = sp.lock();

            guard.load(&params, *best_move, move_picker, pos);
            guard.reset(parent.clone());
            master.set_active_split_point(Some(Arc::clone(&sp)));

            let mut recruited = 0;
            if !FAKE {
                let max = self.max_threads_per_split_point();
                for th in self.threads().iter() {
                    // The master is always included.
                    if recruited + 1 >= max {
                        break;
                    }
                    if th.is_available_to(master) {
                        guard.add_participant(th.idx());
                        th.set_active_split_point(Some(Arc::clone(&sp)));
                        th.set_searching(true);
                        th.wake_up();
                        recruited += 1;
                    }
                }
            }

            if recruited == 0 {
                guard.close_to_late_joiners();
            }

            master.set_split_points_size(size + 1);
            recruited
        };

        // The master enters the idle loop and searches at once since it is
        // still flagged as searching. It returns when every participant is
        // done with this split point.
        if recruited > 0 || FAKE {
            trace!(
                "thread {} split at depth {} with {recruited} helpers",
                master.idx(),
                params.depth
            );
            master.idle_loop(self);

            // All participants are finished, so a helpful master cannot be
            // booked any more.
            debug_assert!(!master.is_searching());
        }

        // Restoring the master under lock avoids a race with is_available_to().
        let _coord = self.coordination_lock();
        let mut guard = sp.lock();

        assert!(
            sp.is_master_only(),
            "split point {}/{} merged with participants {:?}",
            sp.master_idx(),
            sp.slot(),
            sp.participant_indices()
        );

        master.set_searching(true);
        master.set_split_points_size(size);
        master.set_active_split_point(parent);
        pos.set_nodes_searched(pos.nodes_searched() + guard.nodes());
        *best_move = guard.best_move;
        let best_value = guard.best_value;

        guard.unload(move_picker);
        guard.release();
        best_value
    }

    /// Sets the timer to call [`Engine::check_time`] every `ms` milliseconds;
    /// 0 stops it.
    pub fn set_timer(&self, ms: u64) {
        if let Some(timer) = self.timer() {
            timer.set_interval(ms);
            debug!("timer interval set to {ms}ms");
        }
    }

    /// Blocks until the main thread has finished searching and parked.
    pub fn wait_for_search_finished(&self) {
        if let Some(main) = self.main_thread() {
            main.wait_until_parked(&self.sleep_condition);
        }
    }

    /// Called by the main thread, under its mutex, when it parks.
    pub(crate) fn notify_search_finished(&self) {
        self.sleep_condition.notify_all();
    }

    /// Starts a new search on the main thread and returns immediately.
    ///
    /// Waits for the previous search to finish, resets the signals, installs
    /// the position and limits, and builds the root move list from the legal
    /// moves of `pos`, restricted to `search_moves` unless it is empty.
    /// `states` is the caller's undo history, which the pool keeps for the
    /// duration of the search.
    pub fn begin_search(
        &self,
        pos: &E::Position,
        limits: &SearchLimits,
        search_moves: &[MoveOf<E>],
        states: Option<E::StateStack>,
    ) {
        self.wait_for_search_finished();

        self.signals.reset();
        self.context.install(pos, limits, search_moves, states);

        let Some(main) = self.main_thread() else {
            return;
        };
        debug!(
            "search started: {} root moves, depth limit {}",
            self.context.root_moves().len(),
            limits.depth
        );
        main.set_do_sleep(false);
        main.wake_up();
    }

    /// Raises the stop signal and wakes the main thread if it is holding its
    /// result.
    pub fn stop(&self) {
        self.signals.set_stop(true);
        if let Some(main) = self.main_thread() {
            main.wake_up();
        }
    }

    /// Ends pondering: stops a search that has already finished its work,
    /// otherwise lets it continue under normal time management.
    pub fn ponder_hit(&self) {
        if self.signals.stop_on_ponderhit() {
            self.stop();
        } else {
            self.context.clear_ponder();
        }
    }

    /// Holds a finished search until it is stopped, if it runs in ponder or
    /// infinite mode.
    ///
    /// The engine calls this on the main thread before reporting its result.
    pub fn hold_result_until_stopped(&self, thread: &Thread<E>) {
        if self.signals.stop() {
            return;
        }

        let limits = self.context.limits();
        if limits.ponder || limits.infinite {
            self.signals.set_stop_on_ponderhit(true);
            thread.wait_for_stop(&self.signals);
        }
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    #[inline]
    pub fn context(&self) -> &SearchContext<E> {
        &self.context
    }

    /// Number of search threads, main thread included.
    pub fn size(&self) -> usize {
        self.threads().len()
    }

    pub fn main_thread(&self) -> Option<Arc<Thread<E>>> {
        self.thread(0)
    }

    pub fn thread(&self, idx: usize) -> Option<Arc<Thread<E>>> {
        self.threads().get(idx).cloned()
    }

    pub fn timer(&self) -> Option<Arc<TimerThread>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[inline]
    pub fn min_split_depth(&self) -> Depth {
        self.min_split_depth.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_threads_per_split_point(&self) -> usize {
        self.max_threads_per_split_point.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn use_sleeping_threads(&self) -> bool {
        self.use_sleeping_threads.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn late_join(&self) -> bool {
        self.late_join.load(Ordering::Relaxed)
    }

    pub(crate) fn threads(&self) -> RwLockReadGuard<'_, Vec<Arc<Thread<E>>>> {
        self.threads.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn threads_mut(&self) -> RwLockWriteGuard<'_, Vec<Arc<Thread<E>>>> {
        self.threads.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn coordination_lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn shared(&self) -> Arc<ThreadPool<E>> {
        self.self_ref
            .upgrade()
            .expect("thread pool used while being dropped")
    }
}

/// Owning handle of a [`ThreadPool`].
///
/// Dereferences to the pool. Dropping it stops any running search, waits for
/// the main thread to park and shuts the pool down.
pub struct PoolGuard<E: Engine> {
    pool: Arc<ThreadPool<E>>,
}

impl<E: Engine> PoolGuard<E> {
    /// Shared handle to the pool, e.g. for a thread that calls `stop()`.
    pub fn pool(&self) -> &Arc<ThreadPool<E>> {
        &self.pool
    }
}

impl<E: Engine> Deref for PoolGuard<E> {
    type Target = ThreadPool<E>;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

impl<E: Engine> Drop for PoolGuard<E> {
    fn drop(&mut self) {
        self.pool.stop();
        self.pool.wait_for_search_finished();
        self.pool.shutdown();
    }
}
