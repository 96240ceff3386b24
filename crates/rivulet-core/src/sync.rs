//! Lock primitives used throughout the core.
//!
//! With `std` the locks come from `parking_lot`; without it they are `spin`
//! locks, which need no operating system. Both expose the same
//! `lock`/`try_lock`/`read`/`try_read`/`write`/`try_write` surface and neither
//! poisons, so the rest of the crate is written once against these names.

#[cfg(feature = "std")]
pub use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(not(feature = "std"))]
pub use spin::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
