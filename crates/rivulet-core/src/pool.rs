//! Fixed-size pools: the only heap-like resources touched after start-up.
//!
//! - [`FixedPool`] counts slots of some resource (queued events, buffer
//!   descriptors, lock objects). Acquisition is a lock-free compare-and-swap
//!   and returns an RAII [`PoolSlot`]; exhaustion returns `None`.
//! - [`BlockPool`] pre-allocates a fixed number of equally sized data blocks
//!   and hands them out through a lock-protected free list.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::sync::Mutex;

/// Counting pool with a fixed capacity.
#[derive(Debug)]
pub struct FixedPool {
    name: &'static str,
    capacity: usize,
    in_use: AtomicUsize,
    high_water: AtomicUsize,
}

impl FixedPool {
    /// Creates a pool of `capacity` slots.
    pub fn new(name: &'static str, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            capacity,
            in_use: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        })
    }

    /// Pool name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use.load(Ordering::Acquire)
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Highest simultaneous usage observed.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Takes one slot, or `None` when the pool is exhausted.
    pub fn try_acquire(self: &Arc<Self>) -> Option<PoolSlot> {
        self.take(1).then(|| PoolSlot {
            pool: Arc::clone(self),
        })
    }

    /// Takes `n` slots at once, or none of them.
    pub fn try_reserve(self: &Arc<Self>, n: usize) -> Option<Reservation> {
        self.take(n).then(|| Reservation {
            pool: Arc::clone(self),
            remaining: n,
        })
    }

    fn take(&self, n: usize) -> bool {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            let Some(next) = current.checked_add(n).filter(|&v| v <= self.capacity) else {
                return false;
            };
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.high_water.fetch_max(next, Ordering::Relaxed);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn give_back(&self, n: usize) {
        let prev = self.in_use.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "pool {} released more than it handed out", self.name);
    }
}

/// One slot of a [`FixedPool`], returned on drop.
#[derive(Debug)]
pub struct PoolSlot {
    pool: Arc<FixedPool>,
}

impl PoolSlot {
    /// The pool this slot belongs to.
    pub fn pool(&self) -> &Arc<FixedPool> {
        &self.pool
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.pool.give_back(1);
    }
}

/// Several slots taken together; unused ones are returned on drop.
#[derive(Debug)]
pub struct Reservation {
    pool: Arc<FixedPool>,
    remaining: usize,
}

impl Reservation {
    /// Converts one reserved slot into an individual [`PoolSlot`].
    pub fn take_one(&mut self) -> Option<PoolSlot> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(PoolSlot {
            pool: Arc::clone(&self.pool),
        })
    }

    /// Slots still held by the reservation.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.remaining > 0 {
            self.pool.give_back(self.remaining);
        }
    }
}

/// Pre-allocated blocks of `block_len` elements.
#[derive(Debug)]
pub struct BlockPool<T> {
    block_len: usize,
    capacity: usize,
    free: Mutex<Vec<Box<[T]>>>,
}

impl<T: Copy + Default + Send> BlockPool<T> {
    /// Allocates `blocks` blocks of `block_len` elements up front.
    pub fn new(blocks: usize, block_len: usize) -> Arc<Self> {
        let mut free = Vec::with_capacity(blocks);
        for _ in 0..blocks {
            free.push(vec![T::default(); block_len].into_boxed_slice());
        }
        Arc::new(Self {
            block_len,
            capacity: blocks,
            free: Mutex::new(free),
        })
    }

    /// Element count of every block.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of blocks owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks currently on the free list.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Hands out a block, or `None` when all are in use.
    pub fn acquire(&self) -> Option<Box<[T]>> {
        self.free.lock().pop()
    }

    /// Returns a block to the free list.
    ///
    /// Blocks of the wrong length or beyond the pool's capacity are dropped.
    pub fn release(&self, block: Box<[T]>) {
        debug_assert_eq!(block.len(), self.block_len, "foreign block returned to pool");
        if block.len() != self.block_len {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(block);
        }
    }
}
