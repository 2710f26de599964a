#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use ybwc::synthetic::TreeSearch;
use ybwc::{PoolGuard, PoolOptions, ThreadPool};

/// Polls `condition` every millisecond until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub fn options(threads: usize) -> PoolOptions {
    PoolOptions::new(threads)
        .with_min_split_depth(2)
        .with_max_threads_per_split_point(4)
}

pub fn tree_pool(options: &PoolOptions) -> PoolGuard<TreeSearch> {
    ThreadPool::new(TreeSearch::new(), options).expect("failed to create pool")
}
