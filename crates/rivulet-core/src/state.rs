//! Runtime-wide resources.
//!
//! [`RuntimeState`] owns the three fixed pools every graph draws from:
//! queued events, buffer descriptors and lock objects. It is constructed
//! once at start-up and passed by reference to graph builders; nothing in
//! the core reaches for global state.

#[cfg(feature = "std")]
use std::sync::Arc;
#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::pool::FixedPool;
use crate::tensor::TensorPools;

/// Default number of slots in each pool.
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Pool sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSizes {
    /// Events that can be queued at once, across all graphs.
    pub events: usize,
    /// Live buffer handles.
    pub buffers: usize,
    /// Lock objects (one per live buffer handle).
    pub locks: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            events: DEFAULT_POOL_SIZE,
            buffers: DEFAULT_POOL_SIZE,
            locks: DEFAULT_POOL_SIZE,
        }
    }
}

/// Snapshot of pool usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolUsage {
    /// Queued events.
    pub events: usize,
    /// Live buffer handles.
    pub buffers: usize,
    /// Held lock objects.
    pub locks: usize,
}

/// Pools shared by every graph of a runtime.
#[derive(Debug)]
pub struct RuntimeState {
    events: Arc<FixedPool>,
    tensors: TensorPools,
    torn_down: AtomicBool,
}

impl RuntimeState {
    /// Creates the pools.
    pub fn new(sizes: PoolSizes) -> Self {
        Self {
            events: FixedPool::new("events", sizes.events),
            tensors: TensorPools::new(
                FixedPool::new("buffers", sizes.buffers),
                FixedPool::new("locks", sizes.locks),
            ),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Event pool.
    pub fn events(&self) -> &Arc<FixedPool> {
        &self.events
    }

    /// Buffer descriptor and lock pools.
    pub fn tensors(&self) -> &TensorPools {
        &self.tensors
    }

    /// Configured pool sizes.
    pub fn sizes(&self) -> PoolSizes {
        PoolSizes {
            events: self.events.capacity(),
            buffers: self.tensors.descriptors().capacity(),
            locks: self.tensors.locks().capacity(),
        }
    }

    /// Slots currently held in each pool.
    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            events: self.events.in_use(),
            buffers: self.tensors.descriptors().in_use(),
            locks: self.tensors.locks().in_use(),
        }
    }

    /// Marks the runtime torn down. Returns `false` if it already was.
    ///
    /// Pools stay valid until the last slot is returned; teardown only
    /// records that no new graph should be started.
    pub fn teardown(&self) -> bool {
        let first = !self.torn_down.swap(true, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        {
            let usage = self.usage();
            tracing::debug!(
                first,
                events = usage.events,
                buffers = usage.buffers,
                locks = usage.locks,
                "runtime state teardown"
            );
        }
        first
    }

    /// `true` after [`teardown`](Self::teardown).
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new(PoolSizes::default())
    }
}
