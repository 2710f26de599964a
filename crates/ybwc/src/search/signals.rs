//! Cooperative cancellation flags shared by all search threads.

use std::sync::atomic::{AtomicBool, Ordering};

/// Flags raised by the protocol layer or the engine and polled between moves.
#[derive(Debug, Default)]
pub struct Signals {
    stop: AtomicBool,
    stop_on_ponderhit: AtomicBool,
    first_root_move: AtomicBool,
    failed_low_at_root: AtomicBool,
}

impl Signals {
    /// Clears every flag. Called when a new search starts.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Release);
        self.stop_on_ponderhit.store(false, Ordering::Release);
        self.first_root_move.store(false, Ordering::Release);
        self.failed_low_at_root.store(false, Ordering::Release);
    }

    #[inline]
    pub fn stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_stop(&self, value: bool) {
        self.stop.store(value, Ordering::Release);
    }

    #[inline]
    pub fn stop_on_ponderhit(&self) -> bool {
        self.stop_on_ponderhit.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_stop_on_ponderhit(&self, value: bool) {
        self.stop_on_ponderhit.store(value, Ordering::Release);
    }

    #[inline]
    pub fn first_root_move(&self) -> bool {
        self.first_root_move.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_first_root_move(&self, value: bool) {
        self.first_root_move.store(value, Ordering::Release);
    }

    #[inline]
    pub fn failed_low_at_root(&self) -> bool {
        self.failed_low_at_root.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_failed_low_at_root(&self, value: bool) {
        self.failed_low_at_root.store(value, Ordering::Release);
    }
}
