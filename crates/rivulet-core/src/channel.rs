//! Fixed-capacity ring buffers connecting nodes.
//!
//! A [`Fifo`] owns its backing storage, supplied once at construction and
//! never grown. Producers ask for a contiguous window of free slots with
//! [`write_buffer`](Fifo::write_buffer), consumers for a contiguous window of
//! committed slots with [`read_buffer`](Fifo::read_buffer). Both calls commit
//! immediately, so a node checks [`will_overflow_with`](Fifo::will_overflow_with)
//! and [`will_underflow_with`](Fifo::will_underflow_with) first (typically in
//! its `prepare` step). Violating those predicates is a programming error and
//! is only caught by debug assertions.
//!
//! # Cursors
//!
//! Read and write cursors are kept in `0..2 * capacity` so that
//! `write - read` is the fill level and `cursor % capacity` the physical
//! index. When a requested window would straddle the physical end of the
//! storage, the live region is rotated to the front first. Channels whose
//! capacity is a multiple of every block size never rotate.
//!
//! [`Channel`] is the shared handle nodes hold: the producer and the consumer
//! each keep a clone, and the owning graph keeps a type-erased clone so it can
//! [`reset`](ResetChannel::reset) every channel while paused.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::sync::{Mutex, MutexGuard};

/// Fixed-capacity circular buffer of `T`.
#[derive(Debug)]
pub struct Fifo<T> {
    storage: Box<[T]>,
    read: usize,
    write: usize,
}

impl<T: Copy + Default> Fifo<T> {
    /// Creates a FIFO with `capacity` default-initialized slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_storage(vec![T::default(); capacity].into_boxed_slice())
    }

    /// Creates a FIFO over caller-supplied storage.
    ///
    /// # Panics
    ///
    /// Panics if `storage` is empty.
    pub fn with_storage(storage: Box<[T]>) -> Self {
        assert!(!storage.is_empty(), "channel capacity must be non-zero");
        Self {
            storage,
            read: 0,
            write: 0,
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of committed, unread elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.write - self.read
    }

    /// `true` when nothing is waiting to be read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// Number of free slots.
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// `true` if writing `n` more elements would exceed the capacity.
    #[inline]
    pub fn will_overflow_with(&self, n: usize) -> bool {
        n > self.free()
    }

    /// `true` if fewer than `n` elements are available to read.
    #[inline]
    pub fn will_underflow_with(&self, n: usize) -> bool {
        n > self.len()
    }

    /// Commits and returns a contiguous window of `n` free slots.
    ///
    /// The caller produces into the returned slice.
    pub fn write_buffer(&mut self, n: usize) -> &mut [T] {
        debug_assert!(
            !self.will_overflow_with(n),
            "write of {n} overflows channel ({} free)",
            self.free()
        );
        let cap = self.capacity();
        let mut start = self.write % cap;
        if start + n > cap {
            self.linearize();
            start = self.write;
        }
        self.write += n;
        &mut self.storage[start..start + n]
    }

    /// Consumes and returns a contiguous window of `n` committed slots.
    pub fn read_buffer(&mut self, n: usize) -> &[T] {
        debug_assert!(
            !self.will_underflow_with(n),
            "read of {n} underflows channel ({} available)",
            self.len()
        );
        let cap = self.capacity();
        let mut start = self.read % cap;
        if start + n > cap {
            self.linearize();
            start = 0;
        }
        self.read += n;
        if self.read >= cap {
            self.read -= cap;
            self.write -= cap;
        }
        &self.storage[start..start + n]
    }

    /// Zeroes both cursors and, with `zero_fill`, the storage.
    ///
    /// Only meaningful while the owning graph is paused.
    pub fn reset(&mut self, zero_fill: bool) {
        self.read = 0;
        self.write = 0;
        if zero_fill {
            self.storage.fill(T::default());
        }
    }

    /// Moves the live region to the start of storage.
    fn linearize(&mut self) {
        let len = self.len();
        let offset = self.read % self.capacity();
        self.storage.rotate_left(offset);
        self.read = 0;
        self.write = len;
    }
}

/// Shared handle to a [`Fifo`] owned by a graph.
///
/// Cloning the handle does not copy the buffer.
#[derive(Debug)]
pub struct Channel<T> {
    fifo: Arc<Mutex<Fifo<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            fifo: Arc::clone(&self.fifo),
        }
    }
}

impl<T: Copy + Default> Channel<T> {
    /// Creates a channel with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self::from_fifo(Fifo::new(capacity))
    }

    /// Wraps an existing FIFO.
    pub fn from_fifo(fifo: Fifo<T>) -> Self {
        Self {
            fifo: Arc::new(Mutex::new(fifo)),
        }
    }

    /// Locks the underlying FIFO for the duration of the guard.
    pub fn lock(&self) -> MutexGuard<'_, Fifo<T>> {
        self.fifo.lock()
    }

    /// See [`Fifo::capacity`].
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// See [`Fifo::len`].
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// See [`Fifo::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// See [`Fifo::will_overflow_with`].
    pub fn will_overflow_with(&self, n: usize) -> bool {
        self.lock().will_overflow_with(n)
    }

    /// See [`Fifo::will_underflow_with`].
    pub fn will_underflow_with(&self, n: usize) -> bool {
        self.lock().will_underflow_with(n)
    }

    /// Commits `n` slots and lets `fill` produce into them.
    pub fn write_with<R>(&self, n: usize, fill: impl FnOnce(&mut [T]) -> R) -> R {
        let mut fifo = self.lock();
        fill(fifo.write_buffer(n))
    }

    /// Consumes `n` elements and lets `drain` read them.
    pub fn read_with<R>(&self, n: usize, drain: impl FnOnce(&[T]) -> R) -> R {
        let mut fifo = self.lock();
        drain(fifo.read_buffer(n))
    }
}

/// Policy applied to a graph's channels after its nodes are paused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelReset {
    /// Leave cursors and contents untouched.
    Keep,
    /// Zero the cursors; stale samples stay in storage but are unreachable.
    #[default]
    Cursors,
    /// Zero the cursors and fill the storage with default values.
    Zeroed,
}

/// Type-erased view of a channel used by graphs for bulk resets.
pub trait ResetChannel: Send + Sync {
    /// Applies `policy` to the channel.
    fn reset(&self, policy: ChannelReset);

    /// Current fill level in elements.
    fn fill_level(&self) -> usize;
}

impl<T: Copy + Default + Send> ResetChannel for Channel<T> {
    fn reset(&self, policy: ChannelReset) {
        match policy {
            ChannelReset::Keep => {}
            ChannelReset::Cursors => self.lock().reset(false),
            ChannelReset::Zeroed => self.lock().reset(true),
        }
    }

    fn fill_level(&self) -> usize {
        self.len()
    }
}
