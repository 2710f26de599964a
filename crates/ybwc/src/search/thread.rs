//! Search threads and their idle loops.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;

use log::{debug, error, trace};

use crate::constants::MAX_SPLITPOINTS_PER_THREAD;
use crate::error::PoolError;
use crate::position::Position;
use crate::search::Engine;
use crate::search::signals::Signals;
use crate::search::split_point::SplitPoint;
use crate::search::threading::ThreadPool;
use crate::util::spinlock::SpinLock;

/// Loop a native thread runs for its whole life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThreadRole {
    /// Runs [`Engine::think`] once per search.
    Main,
    /// Waits to be recruited into split points.
    Worker,
}

/// A search thread of the pool.
pub struct Thread<E: Engine> {
    /// Index in the pool; also the thread's bit in participant masks.
    idx: usize,

    /// Mutex paired with `sleep_condition`.
    mutex: Mutex<()>,
    sleep_condition: Condvar,

    /// Set while the thread executes search work, its own or a split point's.
    searching: AtomicBool,

    /// Set while parked between searches.
    do_sleep: AtomicBool,

    /// Asks the native thread to return from its loop.
    do_exit: AtomicBool,

    /// Deepest ply reached in the current search.
    max_ply: AtomicUsize,

    /// Stack of split points this thread is master of.
    split_points: [Arc<SplitPoint<E>>; MAX_SPLITPOINTS_PER_THREAD],
    split_points_size: AtomicUsize,

    /// Innermost split point the thread is contributing to.
    active_split_point: SpinLock<Option<Arc<SplitPoint<E>>>>,

    native_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Engine> Thread<E> {
    fn new(idx: usize, role: ThreadRole, weak: &Weak<Thread<E>>) -> Thread<E> {
        Thread {
            idx,
            mutex: Mutex::new(()),
            sleep_condition: Condvar::new(),
            searching: AtomicBool::new(false),
            // The main thread parks itself in main_loop(); starting it awake
            // avoids a race with an early begin_search().
            do_sleep: AtomicBool::new(role == ThreadRole::Worker),
            do_exit: AtomicBool::new(false),
            max_ply: AtomicUsize::new(0),
            split_points: std::array::from_fn(|slot| {
                Arc::new(SplitPoint::new(weak.clone(), idx, slot))
            }),
            split_points_size: AtomicUsize::new(0),
            active_split_point: SpinLock::new(None),
            native_thread: Mutex::new(None),
        }
    }

    /// Creates a thread and starts its native thread in the loop for `role`.
    pub(crate) fn spawn(
        idx: usize,
        role: ThreadRole,
        pool: Arc<ThreadPool<E>>,
    ) -> Result<Arc<Thread<E>>, PoolError> {
        let thread = Arc::new_cyclic(|weak| Thread::new(idx, role, weak));
        let runner = Arc::clone(&thread);

        let handle = std::thread::Builder::new()
            .name(format!("ybwc-worker-{idx}"))
            .spawn(move || match role {
                ThreadRole::Main => runner.main_loop(&pool),
                ThreadRole::Worker => runner.idle_loop(&pool),
            })?;

        *thread
            .native_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(thread)
    }

    /// Signals the native thread to exit and waits for it.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not parked.
    pub(crate) fn terminate(&self) {
        assert!(
            self.do_sleep(),
            "thread {} destroyed while not parked",
            self.idx
        );

        {
            let _lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
            self.do_exit.store(true, Ordering::Release);
            self.sleep_condition.notify_one();
        }

        let handle = self
            .native_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("search thread {} panicked", self.idx);
        }
    }

    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    #[inline]
    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_searching(&self, value: bool) {
        self.searching.store(value, Ordering::Release);
    }

    #[inline]
    pub fn do_sleep(&self) -> bool {
        self.do_sleep.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_do_sleep(&self, value: bool) {
        self.do_sleep.store(value, Ordering::Release);
    }

    #[inline]
    fn do_exit(&self) -> bool {
        self.do_exit.load(Ordering::Acquire)
    }

    /// Deepest ply reported through [`Thread::update_max_ply`] in this search.
    #[inline]
    pub fn max_ply(&self) -> usize {
        self.max_ply.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn update_max_ply(&self, ply: usize) {
        self.max_ply.fetch_max(ply, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn reset_max_ply(&self) {
        self.max_ply.store(0, Ordering::Relaxed);
    }

    /// Number of split points this thread is currently master of.
    #[inline]
    pub fn split_points_size(&self) -> usize {
        self.split_points_size.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_split_points_size(&self, size: usize) {
        debug_assert!(size <= MAX_SPLITPOINTS_PER_THREAD);
        self.split_points_size.store(size, Ordering::Release);
    }

    /// Split point slot `slot` of this thread's stack.
    #[inline]
    pub(crate) fn split_point_slot(&self, slot: usize) -> &Arc<SplitPoint<E>> {
        &self.split_points[slot]
    }

    /// Innermost split point this thread is master of.
    pub fn top_split_point(&self) -> Option<Arc<SplitPoint<E>>> {
        let size = self.split_points_size();
        (size > 0).then(|| Arc::clone(&self.split_points[size - 1]))
    }

    /// Innermost split point this thread is contributing to.
    pub fn active_split_point(&self) -> Option<Arc<SplitPoint<E>>> {
        self.active_split_point.lock().clone()
    }

    #[inline]
    pub(crate) fn set_active_split_point(&self, sp: Option<Arc<SplitPoint<E>>>) {
        *self.active_split_point.lock() = sp;
    }

    /// Wakes the thread if it is waiting on its sleep condition.
    pub fn wake_up(&self) {
        let _lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.sleep_condition.notify_one();
    }

    /// Blocks until the thread is parked, waiting on the pool's `condition`.
    ///
    /// The main thread notifies `condition` while holding its own mutex, so
    /// checking the flag under that mutex cannot miss the notification.
    pub(crate) fn wait_until_parked(&self, condition: &Condvar) {
        let lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = condition
            .wait_while(lock, |_| !self.do_sleep())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until `signals` carries a stop request.
    ///
    /// Used when the search is finished while pondering or in infinite mode:
    /// the result must not be reported before the protocol layer says so.
    pub fn wait_for_stop(&self, signals: &Signals) {
        let lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self
            .sleep_condition
            .wait_while(lock, |_| !signals.stop())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Check if a beta cutoff has occurred in the current or an ancestor split point.
    pub fn cutoff_occurred(&self) -> bool {
        let mut current = self.active_split_point();
        while let Some(sp) = current {
            if sp.cutoff() {
                return true;
            }
            current = sp.parent();
        }
        false
    }

    /// Check if this thread can help `master` at a split point.
    ///
    /// The thread must be idle. If it is itself the master of active split
    /// points, it may only help threads working on the innermost of them
    /// (the "helpful master" concept).
    pub fn is_available_to(&self, master: &Thread<E>) -> bool {
        self.is_available_to_index(master.idx)
    }

    pub(crate) fn is_available_to_index(&self, master_idx: usize) -> bool {
        if self.is_searching() {
            return false;
        }

        // Local copy so the count cannot drop to zero between the test and the index.
        let size = self.split_points_size();
        size == 0 || self.split_points[size - 1].has_participant(master_idx)
    }

    /// Loop of the main thread: park, run one search when woken, repeat.
    fn main_loop(self: &Arc<Self>, pool: &ThreadPool<E>) {
        loop {
            {
                let mut lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
                self.set_do_sleep(true);
                self.set_searching(false);

                while self.do_sleep() && !self.do_exit() {
                    pool.notify_search_finished();
                    lock = self
                        .sleep_condition
                        .wait(lock)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }

            if self.do_exit() {
                return;
            }

            self.set_searching(true);
            pool.wake_all_for_new_search();
            pool.engine().think(pool, self);
            pool.park_all_but_main();
            debug!("search finished, max ply {}", self.max_ply());

            debug_assert!(self.is_searching());
        }
    }

    /// Loop of worker threads, also entered by a master from `split()`.
    ///
    /// A worker runs it for its whole life, waiting to be recruited. A master
    /// runs it for the duration of one split: it first searches its own share,
    /// may then help its recruits, and returns once all of them are done.
    pub(crate) fn idle_loop(self: &Arc<Self>, pool: &ThreadPool<E>) {
        // Set only when called from split(), in which case we are its master.
        let this_sp = if self.split_points_size() > 0 {
            self.active_split_point()
        } else {
            None
        };
        debug_assert!(
            this_sp
                .as_ref()
                .is_none_or(|sp| sp.master_idx() == self.idx && self.is_searching())
        );

        let split_done = |sp: &Option<Arc<SplitPoint<E>>>| {
            sp.as_ref().is_some_and(|sp| sp.is_master_only())
        };

        loop {
            if self.is_searching() {
                self.search_assigned(pool);
                if pool.late_join() {
                    self.try_late_join(pool);
                }
                continue;
            }

            if split_done(&this_sp) {
                return;
            }

            if self.do_exit() {
                debug_assert!(this_sp.is_none());
                return;
            }

            // Recheck under the lock: a master may have booked us and called
            // wake_up() before we got here.
            let lock = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
            let _lock = self
                .sleep_condition
                .wait_while(lock, |_| {
                    !self.do_exit() && !self.is_searching() && !split_done(&this_sp)
                })
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Searches the split point this thread has been assigned to.
    fn search_assigned(self: &Arc<Self>, pool: &ThreadPool<E>) {
        let Some(sp) = self.active_split_point() else {
            unreachable!("thread {} is searching without a split point", self.idx);
        };
        let Some(mut pos) = sp.lock().position_for_participant() else {
            unreachable!(
                "split point {}/{} has no position",
                sp.master_idx(),
                sp.slot()
            );
        };

        pool.engine().search_split_point(pool, self, &sp, &mut pos);

        let mut guard = sp.lock();
        guard.remove_participant(self.idx);
        guard.close_to_late_joiners();
        guard.add_nodes(pos.nodes_searched());

        // Point back at our own split before becoming available, so a master
        // booking us afterwards is never overwritten.
        self.set_active_split_point(self.top_split_point());
        self.set_searching(false);

        // The last recruit wakes the master so that it can leave its idle loop.
        if self.idx != sp.master_idx()
            && sp.is_master_only()
            && let Some(master) = sp.master()
        {
            master.wake_up();
        }
    }

    /// Joins another active split point after finishing our share of one.
    ///
    /// Prefers the split point closest to the root among those that still have
    /// room and whose recruits are all still searching.
    fn try_late_join(self: &Arc<Self>, pool: &ThreadPool<E>) {
        if self.is_searching() {
            return;
        }

        let max = pool.max_threads_per_split_point();
        let joinable = |sp: &SplitPoint<E>| {
            sp.all_slaves_searching()
                && sp.participant_count() < max
                && self.is_available_to_index(sp.master_idx())
        };

        let candidate = pool
            .threads()
            .iter()
            .filter_map(|th| th.top_split_point())
            .filter(|sp| joinable(sp))
            .min_by_key(|sp| sp.nesting_level());

        let Some(sp) = candidate else {
            return;
        };

        // Recheck the conditions under lock protection.
        let _coord = pool.coordination_lock();
        let mut guard = sp.lock();
        if joinable(&sp) {
            guard.add_participant(self.idx);
            self.set_active_split_point(Some(Arc::clone(&sp)));
            self.set_searching(true);
            trace!(
                "thread {} late-joined split point {}/{}",
                self.idx,
                sp.master_idx(),
                sp.slot()
            );
        }
    }
}
