//! First-fit bitmap allocator for small dense integer id spaces.
//!
//! Adapted from the scheduler's `ReadyBitmap` (which scans from a random
//! starting block for fairness across worker threads). The CIC pool, the
//! TEI/SAPI pool, and the RTP port pool all need the opposite property —
//! deterministic *lowest-id-first* allocation, so that
//! `release(c); allocate() == c` whenever no smaller id is free — so
//! this scans ascending from block zero instead.

use core::sync::atomic::{AtomicU64, Ordering};

const BITS_PER_BLOCK: usize = 64;

/// A pool of `count` ids, numbered `0..count`, allocated lowest-first.
pub struct IdPool {
    blocks: Box<[AtomicU64]>,
    count: usize,
}

impl IdPool {
    /// Create a pool where every id in `0..count` starts out free.
    pub fn new(count: usize) -> Self {
        let num_blocks = (count + BITS_PER_BLOCK - 1) / BITS_PER_BLOCK;
        let blocks: Vec<AtomicU64> = (0..num_blocks)
            .map(|block_idx| {
                let base = block_idx * BITS_PER_BLOCK;
                let bits_in_block = count.saturating_sub(base).min(BITS_PER_BLOCK);
                let word = if bits_in_block == BITS_PER_BLOCK {
                    u64::MAX
                } else {
                    (1u64 << bits_in_block) - 1
                };
                AtomicU64::new(word)
            })
            .collect();
        Self {
            blocks: blocks.into_boxed_slice(),
            count,
        }
    }

    /// Allocate the lowest-numbered free id, or `None` if exhausted.
    pub fn allocate(&self) -> Option<usize> {
        for block_idx in 0..self.blocks.len() {
            loop {
                let current = self.blocks[block_idx].load(Ordering::Acquire);
                if current == 0 {
                    break;
                }
                let bit_idx = current.trailing_zeros() as usize;
                let mask = 1u64 << bit_idx;
                match self.blocks[block_idx].compare_exchange_weak(
                    current,
                    current & !mask,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Some(block_idx * BITS_PER_BLOCK + bit_idx),
                    Err(_) => continue,
                }
            }
        }
        None
    }

    /// Allocate a specific id if it is free. Used for resuming a held
    /// reservation (e.g. re-claiming CIC 1 at pool edge tests).
    pub fn allocate_exact(&self, id: usize) -> bool {
        if id >= self.count {
            return false;
        }
        let block_idx = id / BITS_PER_BLOCK;
        let mask = 1u64 << (id % BITS_PER_BLOCK);
        loop {
            let current = self.blocks[block_idx].load(Ordering::Acquire);
            if current & mask == 0 {
                return false;
            }
            match self.blocks[block_idx].compare_exchange_weak(
                current,
                current & !mask,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Return an id to the pool. Returning an id twice, or one never
    /// allocated, is a no-op aside from making it allocatable.
    pub fn release(&self, id: usize) {
        if id >= self.count {
            return;
        }
        let block_idx = id / BITS_PER_BLOCK;
        let mask = 1u64 << (id % BITS_PER_BLOCK);
        self.blocks[block_idx].fetch_or(mask, Ordering::AcqRel);
    }

    pub fn is_free(&self, id: usize) -> bool {
        if id >= self.count {
            return false;
        }
        let block_idx = id / BITS_PER_BLOCK;
        let mask = 1u64 << (id % BITS_PER_BLOCK);
        self.blocks[block_idx].load(Ordering::Acquire) & mask != 0
    }

    pub fn capacity(&self) -> usize {
        self.count
    }

    pub fn free_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_ascending() {
        let pool = IdPool::new(10);
        assert_eq!(pool.allocate(), Some(0));
        assert_eq!(pool.allocate(), Some(1));
        assert_eq!(pool.allocate(), Some(2));
    }

    #[test]
    fn release_then_allocate_returns_lowest_free() {
        let pool = IdPool::new(10);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        let _c = pool.allocate().unwrap();
        pool.release(a);
        assert_eq!(pool.allocate(), Some(a));
        pool.release(b);
        // b is now the lowest free again (a was just reclaimed above)
        assert_eq!(pool.allocate(), Some(b));
    }

    #[test]
    fn exhaustion_returns_none() {
        let pool = IdPool::new(2);
        pool.allocate().unwrap();
        pool.allocate().unwrap();
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn edges_of_range_are_allocatable() {
        let pool = IdPool::new(1000);
        for _ in 0..999 {
            pool.allocate().unwrap();
        }
        assert_eq!(pool.allocate(), Some(999));
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn allocate_exact_claims_specific_id() {
        let pool = IdPool::new(10);
        assert!(pool.allocate_exact(5));
        assert!(!pool.is_free(5));
        assert!(!pool.allocate_exact(5));
    }

    #[test]
    fn concurrent_allocation_yields_unique_ids() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(IdPool::new(4000));
        let mut handles = vec![];
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                let mut ids = vec![];
                for _ in 0..1000 {
                    ids.push(pool.allocate().unwrap());
                }
                ids
            }));
        }
        let mut all: Vec<usize> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
    }
}
