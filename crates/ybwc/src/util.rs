pub mod bitset;
pub mod spinlock;
