//! Pool lifecycle: creation, sizing, configuration and teardown.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{options, tree_pool, wait_until};
use ybwc::constants::MAX_THREADS;
use ybwc::search::SearchLimits;
use ybwc::synthetic::{TreePosition, TreeSearch};
use ybwc::{PoolError, PoolOptions, ThreadPool};

#[test]
fn test_new_pool_is_parked() {
    let pool = tree_pool(&options(3));

    assert_eq!(pool.size(), 3);
    for idx in 0..3 {
        let thread = pool.thread(idx).unwrap();
        assert_eq!(thread.idx(), idx);
        assert!(thread.do_sleep());
        assert!(!thread.is_searching());
        assert_eq!(thread.split_points_size(), 0);
        assert!(thread.active_split_point().is_none());
    }
    assert!(pool.thread(3).is_none());
    assert_eq!(pool.timer().unwrap().interval(), 0);
}

#[test]
fn test_new_rejects_invalid_options() {
    let result = ThreadPool::new(TreeSearch::new(), &PoolOptions::new(0));
    assert!(matches!(result, Err(PoolError::NoThreads)));

    let result = ThreadPool::new(TreeSearch::new(), &PoolOptions::new(MAX_THREADS + 1));
    assert!(matches!(result, Err(PoolError::TooManyThreads { .. })));

    let result = ThreadPool::new(
        TreeSearch::new(),
        &PoolOptions::new(2).with_max_threads_per_split_point(0),
    );
    assert!(matches!(result, Err(PoolError::InvalidSplitWidth { .. })));
}

#[test]
fn test_resize_keeps_existing_threads() {
    let pool = tree_pool(&options(2));
    let main = pool.main_thread().unwrap();
    let first = pool.thread(1).unwrap();

    pool.resize(4).unwrap();
    assert_eq!(pool.size(), 4);
    assert!(Arc::ptr_eq(&main, &pool.main_thread().unwrap()));
    assert!(Arc::ptr_eq(&first, &pool.thread(1).unwrap()));
    assert_eq!(pool.thread(3).unwrap().idx(), 3);

    let before: Vec<_> = (0..4).map(|idx| pool.thread(idx).unwrap()).collect();
    pool.resize(4).unwrap();
    for (idx, thread) in before.iter().enumerate() {
        assert!(Arc::ptr_eq(thread, &pool.thread(idx).unwrap()));
    }

    pool.resize(1).unwrap();
    assert_eq!(pool.size(), 1);
    assert!(Arc::ptr_eq(&main, &pool.main_thread().unwrap()));
}

#[test]
fn test_resize_rejects_degenerate_counts() {
    let pool = tree_pool(&options(2));

    assert!(matches!(pool.resize(0), Err(PoolError::NoThreads)));
    assert!(matches!(
        pool.resize(MAX_THREADS + 1),
        Err(PoolError::TooManyThreads { requested, max }) if requested == MAX_THREADS + 1 && max == MAX_THREADS
    ));
    assert_eq!(pool.size(), 2);
}

#[test]
fn test_shrunk_threads_are_joined() {
    let pool = tree_pool(&options(4));
    let removed: Vec<_> = (2..4)
        .map(|idx| Arc::downgrade(&pool.thread(idx).unwrap()))
        .collect();

    pool.resize(2).unwrap();

    for weak in removed {
        assert!(weak.upgrade().is_none());
    }
}

#[test]
fn test_read_options_applies_values() {
    let pool = tree_pool(&options(1));
    let updated = PoolOptions::new(3)
        .with_min_split_depth(5)
        .with_max_threads_per_split_point(2)
        .with_sleeping_threads(false)
        .with_late_join(false);

    pool.read_options(&updated).unwrap();

    assert_eq!(pool.options(), updated);
    assert_eq!(pool.size(), 3);

    let invalid = PoolOptions::new(2).with_min_split_depth(0);
    assert!(matches!(
        pool.read_options(&invalid),
        Err(PoolError::InvalidSplitDepth(0))
    ));
    assert_eq!(pool.options(), updated);
}

#[test]
fn test_teardown_joins_every_thread() {
    let pool = tree_pool(&options(4));
    let pool_ref = Arc::downgrade(pool.pool());
    let threads: Vec<_> = (0..4)
        .map(|idx| Arc::downgrade(&pool.thread(idx).unwrap()))
        .collect();
    let timer = Arc::downgrade(&pool.timer().unwrap());

    pool.begin_search(&TreePosition::new(1, 6), &SearchLimits::with_depth(5), &[], None);
    drop(pool);

    assert!(pool_ref.upgrade().is_none());
    assert!(timer.upgrade().is_none());
    for weak in threads {
        assert!(weak.upgrade().is_none());
    }
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = tree_pool(&options(2));
    pool.shutdown();
    assert_eq!(pool.size(), 0);
    assert!(pool.timer().is_none());
    pool.shutdown();
}

#[test]
fn test_timer_fires_while_enabled() {
    let pool = tree_pool(&options(1));
    let timer = pool.timer().unwrap();

    pool.set_timer(2);
    assert_eq!(timer.interval(), 2);
    assert!(wait_until(|| timer.checks() >= 3));

    pool.set_timer(0);
    thread::sleep(Duration::from_millis(20));
    let stopped = timer.checks();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(timer.checks(), stopped);
}

#[test]
fn test_proactive_wake_mode() {
    let pool = tree_pool(&options(4).with_sleeping_threads(false));
    let pos = TreePosition::new(17, 6);

    pool.begin_search(&pos, &SearchLimits::with_depth(6), &[], None);
    pool.wait_for_search_finished();

    let result = pool.engine().last_result().unwrap();
    assert_eq!(result.score, ybwc::synthetic::minimax(&pos, 6));
}
