//! Periodic time checks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::error;

use crate::error::PoolError;
use crate::search::Engine;
use crate::search::threading::ThreadPool;

/// Thread that calls [`Engine::check_time`] at a fixed interval.
///
/// An interval of 0 disables the timer; it then only wakes when the interval
/// changes or the pool exits.
pub struct TimerThread {
    interval_ms: Mutex<u64>,
    sleep_condition: Condvar,
    do_exit: AtomicBool,
    checks: AtomicU64,
    native_thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerThread {
    pub(crate) fn spawn<E: Engine>(pool: Arc<ThreadPool<E>>) -> Result<Arc<TimerThread>, PoolError> {
        let timer = Arc::new(TimerThread {
            interval_ms: Mutex::new(0),
            sleep_condition: Condvar::new(),
            do_exit: AtomicBool::new(false),
            checks: AtomicU64::new(0),
            native_thread: Mutex::new(None),
        });

        let runner = Arc::clone(&timer);
        let handle = std::thread::Builder::new()
            .name("ybwc-timer".to_string())
            .spawn(move || runner.timer_loop(&pool))?;

        *timer
            .native_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(timer)
    }

    fn timer_loop<E: Engine>(&self, pool: &ThreadPool<E>) {
        let mut interval = self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner);

        while !self.do_exit.load(Ordering::Acquire) {
            let ms = *interval;
            interval = if ms == 0 {
                self.sleep_condition
                    .wait(interval)
                    .unwrap_or_else(PoisonError::into_inner)
            } else {
                self.sleep_condition
                    .wait_timeout(interval, Duration::from_millis(ms))
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            };

            if self.do_exit.load(Ordering::Acquire) {
                break;
            }

            drop(interval);
            self.checks.fetch_add(1, Ordering::Relaxed);
            pool.engine().check_time(pool);
            interval = self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sets the interval in milliseconds and wakes the timer; 0 disables it.
    pub fn set_interval(&self, ms: u64) {
        let mut interval = self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner);
        *interval = ms;
        self.sleep_condition.notify_one();
    }

    pub fn interval(&self) -> u64 {
        *self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of times the timer has called [`Engine::check_time`].
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    pub(crate) fn terminate(&self) {
        {
            let _interval = self.interval_ms.lock().unwrap_or_else(PoisonError::into_inner);
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
            error!("timer thread panicked");
        }
    }
}
