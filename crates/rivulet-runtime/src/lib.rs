//! Rivulet Runtime - std host for rivulet graphs
//!
//! Wraps `rivulet-core` with the threads a board port would provide: a
//! data-flow thread running the scheduler, an event thread draining the
//! active graph's queue, and a control thread that switches between graphs
//! when its event flags say so.
//!
//! # Capabilities
//!
//! - [`Spawner`] / [`StdSpawner`] - thread creation
//! - [`EventFlags`] - bit flags posted from driver callbacks, waited on by
//!   runtime threads
//! - [`WallClock`] - millisecond tick source for wall-clock TTLs
//!
//! # Orchestration
//!
//! - [`Runtime`] - owns the pools, the graphs and the threads
//! - [`RuntimeHandle`] - switch or stop from any thread
//! - [`Report`] - scheduler exits, completed switches, shutdown

pub mod clock;
pub mod error;
pub mod flags;
pub mod report;
pub mod runtime;
pub mod spawn;

pub use clock::WallClock;
pub use error::RuntimeError;
pub use flags::EventFlags;
pub use report::Report;
pub use runtime::{DEFAULT_EVENT_POLL, Runtime, RuntimeBuilder, RuntimeHandle};
pub use spawn::{Spawner, StdSpawner, Task, TaskHandle};
