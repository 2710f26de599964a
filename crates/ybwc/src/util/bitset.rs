//! Fixed-width thread index set.

use std::sync::atomic::{AtomicU64, Ordering};

/// 64-bit set of thread indices.
///
/// Reads are lock-free and may be stale; writers are expected to hold the
/// lock of the structure that owns the set.
#[derive(Default)]
pub struct AtomicBitSet {
    data: AtomicU64,
}

impl AtomicBitSet {
    /// Creates an empty set.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            data: AtomicU64::new(0),
        }
    }

    /// Returns the raw bits.
    #[inline(always)]
    pub fn bits(&self) -> u64 {
        self.data.load(Ordering::Acquire)
    }

    /// Returns the number of indices in the set.
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Adds `index` to the set.
    #[inline(always)]
    pub fn set(&self, index: usize) {
        debug_assert!(index < 64);
        self.data.fetch_or(1 << index, Ordering::AcqRel);
    }

    /// Removes `index` from the set.
    #[inline(always)]
    pub fn reset(&self, index: usize) {
        debug_assert!(index < 64);
        self.data.fetch_and(!(1 << index), Ordering::AcqRel);
    }

    /// Returns `true` if `index` is in the set.
    #[inline(always)]
    pub fn test(&self, index: usize) -> bool {
        index < 64 && (self.bits() >> index) & 1 != 0
    }

    /// Returns `true` if the set holds exactly `index` and nothing else.
    #[inline(always)]
    pub fn is_only(&self, index: usize) -> bool {
        debug_assert!(index < 64);
        self.bits() == 1 << index
    }

    /// Replaces the contents with the single index `index`.
    #[inline(always)]
    pub fn assign_only(&self, index: usize) {
        debug_assert!(index < 64);
        self.data.store(1 << index, Ordering::Release);
    }

    /// Iterates over the indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let mut bits = self.bits();
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let bitset = AtomicBitSet::new();
        assert_eq!(bitset.count(), 0);
        assert_eq!(bitset.bits(), 0);
    }

    #[test]
    fn test_set_and_reset() {
        let bitset = AtomicBitSet::new();
        bitset.set(0);
        bitset.set(5);
        bitset.set(63);
        assert!(bitset.test(0));
        assert!(bitset.test(5));
        assert!(bitset.test(63));
        assert!(!bitset.test(6));
        assert_eq!(bitset.count(), 3);

        bitset.reset(5);
        assert!(!bitset.test(5));
        assert_eq!(bitset.count(), 2);
    }

    #[test]
    fn test_out_of_range_is_absent() {
        let bitset = AtomicBitSet::new();
        bitset.set(63);
        assert!(!bitset.test(64));
    }

    #[test]
    fn test_is_only() {
        let bitset = AtomicBitSet::new();
        bitset.assign_only(3);
        assert!(bitset.is_only(3));

        bitset.set(7);
        assert!(!bitset.is_only(3));

        bitset.reset(7);
        assert!(bitset.is_only(3));

        bitset.reset(3);
        assert!(!bitset.is_only(3));
    }

    #[test]
    fn test_iter() {
        let bitset = AtomicBitSet::new();
        for i in [1, 4, 9, 40] {
            bitset.set(i);
        }
        assert_eq!(bitset.iter().collect::<Vec<_>>(), vec![1, 4, 9, 40]);
    }

    #[test]
    fn test_concurrent_set() {
        use std::sync::Arc;
        use std::thread;

        let bitset = Arc::new(AtomicBitSet::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bitset = Arc::clone(&bitset);
                thread::spawn(move || bitset.set(i * 8))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bitset.count(), 8);
    }
}
