//! Reference-counted, lockable data blocks shared between nodes.
//!
//! A [`BufferHandle`] wraps a [`Block`] of typed elements together with its
//! [`Shape`]. Moving a handle transfers ownership; cloning it extends the
//! reference count so one block can fan out to several consumers without a
//! copy. When the last handle is dropped the block's [`Release`] policy runs
//! exactly once: by default the block goes back to its origin [`BlockPool`],
//! and driver-owned blocks can carry a custom callback that re-arms the
//! peripheral.
//!
//! Access goes through scoped callbacks. [`lock_shared`](BufferHandle::lock_shared)
//! admits any number of readers, [`lock_exclusive`](BufferHandle::lock_exclusive)
//! a single writer, and neither ever blocks: contention is reported as
//! [`TensorError::Contended`].
//!
//! ```rust
//! use rivulet_core::{Block, BlockPool, BufferHandle, RuntimeState};
//!
//! let state = RuntimeState::default();
//! let blocks = BlockPool::<f32>::new(2, 6);
//! let block = Block::from_pool(&blocks).unwrap();
//! let tensor = BufferHandle::create_with(state.tensors(), 2, &[2, 3], block).unwrap();
//!
//! tensor.lock_exclusive(|data| data.fill(0.25)).unwrap();
//! let fan_out = tensor.clone();
//! assert_eq!(fan_out.lock_shared(|data| data.iter().sum::<f32>()).unwrap(), 1.5);
//!
//! drop(tensor);
//! drop(fan_out);
//! assert_eq!(blocks.available(), 2);
//! ```

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc};
use core::fmt;
use core::mem;
use core::ops::{Deref, DerefMut};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::pool::{BlockPool, FixedPool, PoolSlot};
use crate::sync::{Mutex, RwLock};

/// Highest supported tensor rank.
pub const MAX_RANK: usize = 4;

/// Rank and per-dimension extents of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    rank: u8,
    dims: [usize; MAX_RANK],
}

impl Shape {
    /// Builds a shape, checking that `dims` has exactly `rank` entries and
    /// that the rank is between 1 and [`MAX_RANK`].
    pub fn new(rank: u8, dims: &[usize]) -> Result<Self, TensorError> {
        let r = rank as usize;
        if r == 0 || r > MAX_RANK || dims.len() != r {
            return Err(TensorError::InvalidRank { rank });
        }
        let mut stored = [1; MAX_RANK];
        stored[..r].copy_from_slice(dims);
        Ok(Self { rank, dims: stored })
    }

    /// Number of dimensions.
    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Extents, one per dimension.
    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.rank as usize]
    }

    /// Product of all extents.
    pub fn element_count(&self) -> usize {
        self.dims().iter().product()
    }
}

/// What happens to a block when its last handle goes away.
pub enum Release<T> {
    /// Free the allocation.
    Discard,
    /// Return the block to the pool it came from.
    ToPool(Arc<BlockPool<T>>),
    /// Hand the block to a callback, e.g. to give it back to a driver.
    Custom(Box<dyn FnOnce(Box<[T]>) + Send>),
}

impl<T: Copy + Default + Send> Release<T> {
    fn run(self, block: Box<[T]>) {
        match self {
            Release::Discard => {}
            Release::ToPool(pool) => pool.release(block),
            Release::Custom(callback) => callback(block),
        }
    }
}

impl<T> fmt::Debug for Release<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Release::Discard => f.write_str("Discard"),
            Release::ToPool(_) => f.write_str("ToPool"),
            Release::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// A data block together with its release policy.
///
/// Dropping an unwrapped block runs the policy too, so a block obtained from
/// a pool always finds its way back.
pub struct Block<T: Copy + Default + Send> {
    data: Box<[T]>,
    release: Option<Release<T>>,
}

impl<T: Copy + Default + Send> Block<T> {
    /// Takes a block from `pool`; it returns there on final release.
    pub fn from_pool(pool: &Arc<BlockPool<T>>) -> Option<Self> {
        pool.acquire().map(|data| Self {
            data,
            release: Some(Release::ToPool(Arc::clone(pool))),
        })
    }

    /// Wraps a heap block that is simply freed on release.
    pub fn from_boxed(data: Box<[T]>) -> Self {
        Self {
            data,
            release: Some(Release::Discard),
        }
    }

    /// Wraps a block whose release is handled by `callback`.
    pub fn with_release(data: Box<[T]>, callback: impl FnOnce(Box<[T]>) + Send + 'static) -> Self {
        Self {
            data,
            release: Some(Release::Custom(Box::new(callback))),
        }
    }

    fn into_parts(mut self) -> (Box<[T]>, Option<Release<T>>) {
        (mem::take(&mut self.data), self.release.take())
    }
}

impl<T: Copy + Default + Send> Deref for Block<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy + Default + Send> DerefMut for Block<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy + Default + Send> Drop for Block<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release.run(mem::take(&mut self.data));
        }
    }
}

/// Descriptor and lock pools every handle draws from.
#[derive(Clone, Debug)]
pub struct TensorPools {
    descriptors: Arc<FixedPool>,
    locks: Arc<FixedPool>,
}

impl TensorPools {
    /// Creates tensor pools over existing counting pools.
    pub fn new(descriptors: Arc<FixedPool>, locks: Arc<FixedPool>) -> Self {
        Self { descriptors, locks }
    }

    /// Buffer descriptor pool.
    pub fn descriptors(&self) -> &Arc<FixedPool> {
        &self.descriptors
    }

    /// Lock object pool.
    pub fn locks(&self) -> &Arc<FixedPool> {
        &self.locks
    }
}

/// Errors from creating or locking a [`BufferHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorError {
    /// Rank is zero, above [`MAX_RANK`], or disagrees with the extents given.
    InvalidRank {
        /// Requested rank.
        rank: u8,
    },
    /// Product of extents differs from the block length.
    ShapeMismatch {
        /// Element count implied by the shape.
        expected: usize,
        /// Element count of the block.
        actual: usize,
    },
    /// The buffer descriptor pool is exhausted.
    DescriptorsExhausted,
    /// The lock object pool is exhausted.
    LocksExhausted,
    /// The lock is held in a conflicting mode.
    Contended,
    /// Exclusive access was requested on a read-only handle.
    ReadOnly,
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRank { rank } => write!(f, "invalid tensor rank {rank}"),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape needs {expected} elements, block has {actual}")
            }
            Self::DescriptorsExhausted => write!(f, "buffer descriptor pool exhausted"),
            Self::LocksExhausted => write!(f, "lock pool exhausted"),
            Self::Contended => write!(f, "tensor lock contended"),
            Self::ReadOnly => write!(f, "tensor is read-only"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TensorError {}

struct Shared<T: Copy + Default + Send> {
    shape: Shape,
    read_only: bool,
    data: RwLock<Box<[T]>>,
    release: Mutex<Option<Release<T>>>,
    _descriptor: PoolSlot,
    _lock: PoolSlot,
}

impl<T: Copy + Default + Send> Drop for Shared<T> {
    fn drop(&mut self) {
        let data = mem::take(self.data.get_mut());
        if let Some(release) = self.release.get_mut().take() {
            #[cfg(feature = "tracing")]
            tracing::trace!(len = data.len(), ?release, "tensor released");
            release.run(data);
        }
    }
}

/// Shared-ownership handle to a shaped block of `T`.
pub struct BufferHandle<T: TensorElement> {
    shared: Arc<Shared<T>>,
}

impl<T: TensorElement> BufferHandle<T> {
    /// Wraps `block` with a `rank`-dimensional shape.
    ///
    /// Draws one descriptor slot and one lock slot from `pools`. On failure
    /// the block is released through its own policy.
    pub fn create_with(
        pools: &TensorPools,
        rank: u8,
        dims: &[usize],
        block: Block<T>,
    ) -> Result<Self, TensorError> {
        Self::create(pools, rank, dims, block, false)
    }

    /// Like [`create_with`](Self::create_with) but refuses exclusive locks.
    pub fn create_read_only(
        pools: &TensorPools,
        rank: u8,
        dims: &[usize],
        block: Block<T>,
    ) -> Result<Self, TensorError> {
        Self::create(pools, rank, dims, block, true)
    }

    fn create(
        pools: &TensorPools,
        rank: u8,
        dims: &[usize],
        block: Block<T>,
        read_only: bool,
    ) -> Result<Self, TensorError> {
        let shape = Shape::new(rank, dims)?;
        if shape.element_count() != block.len() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.element_count(),
                actual: block.len(),
            });
        }
        let descriptor = pools
            .descriptors
            .try_acquire()
            .ok_or(TensorError::DescriptorsExhausted)?;
        let lock = pools.locks.try_acquire().ok_or(TensorError::LocksExhausted)?;
        let (data, release) = block.into_parts();
        Ok(Self {
            shared: Arc::new(Shared {
                shape,
                read_only,
                data: RwLock::new(data),
                release: Mutex::new(release),
                _descriptor: descriptor,
                _lock: lock,
            }),
        })
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> Shape {
        self.shared.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shared.shape.element_count()
    }

    /// `true` for a tensor with no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if exclusive locks are refused.
    pub fn is_read_only(&self) -> bool {
        self.shared.read_only
    }

    /// Number of live handles to this block.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// `true` if both handles point at the same block.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Runs `f` with read access to the elements.
    pub fn lock_shared<R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R, TensorError> {
        let guard = self.shared.data.try_read().ok_or(TensorError::Contended)?;
        Ok(f(&guard))
    }

    /// Runs `f` with write access to the elements.
    pub fn lock_exclusive<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Result<R, TensorError> {
        if self.shared.read_only {
            return Err(TensorError::ReadOnly);
        }
        let mut guard = self.shared.data.try_write().ok_or(TensorError::Contended)?;
        Ok(f(&mut guard))
    }
}

impl<T: TensorElement> Clone for BufferHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: TensorElement> fmt::Debug for BufferHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("element", &T::ELEMENT)
            .field("shape", &self.shared.shape.dims())
            .field("read_only", &self.shared.read_only)
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Element types a tensor can carry through an event payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// `f32`
    F32,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `u8`
    U8,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::F32 => "f32",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::U8 => "u8",
        })
    }
}

/// A tensor of any supported element type, as carried by an event.
#[derive(Clone, Debug)]
pub enum TensorPayload {
    /// `f32` tensor.
    F32(BufferHandle<f32>),
    /// `i16` tensor.
    I16(BufferHandle<i16>),
    /// `i32` tensor.
    I32(BufferHandle<i32>),
    /// `u8` tensor.
    U8(BufferHandle<u8>),
}

impl TensorPayload {
    /// Element type of the carried tensor.
    pub fn element(&self) -> ElementType {
        match self {
            Self::F32(_) => ElementType::F32,
            Self::I16(_) => ElementType::I16,
            Self::I32(_) => ElementType::I32,
            Self::U8(_) => ElementType::U8,
        }
    }

    /// Shape of the carried tensor.
    pub fn shape(&self) -> Shape {
        match self {
            Self::F32(t) => t.shape(),
            Self::I16(t) => t.shape(),
            Self::I32(t) => t.shape(),
            Self::U8(t) => t.shape(),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Element types usable in a [`BufferHandle`].
pub trait TensorElement: Copy + Default + Send + Sync + 'static + sealed::Sealed {
    /// Runtime tag for this element type.
    const ELEMENT: ElementType;

    /// Erases the element type.
    fn into_payload(handle: BufferHandle<Self>) -> TensorPayload;

    /// Recovers a typed handle, or gives the payload back on mismatch.
    fn from_payload(payload: TensorPayload) -> Result<BufferHandle<Self>, TensorPayload>;
}

macro_rules! tensor_element {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl TensorElement for $ty {
            const ELEMENT: ElementType = ElementType::$variant;

            fn into_payload(handle: BufferHandle<Self>) -> TensorPayload {
                TensorPayload::$variant(handle)
            }

            fn from_payload(payload: TensorPayload) -> Result<BufferHandle<Self>, TensorPayload> {
                match payload {
                    TensorPayload::$variant(handle) => Ok(handle),
                    other => Err(other),
                }
            }
        }
    };
}

tensor_element!(f32, F32);
tensor_element!(i16, I16);
tensor_element!(i32, I32);
tensor_element!(u8, U8);
