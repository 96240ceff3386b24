//! Rivulet Core - synchronous data-flow runtime for microcontrollers
//!
//! This crate executes a fixed graph of processing nodes over statically sized
//! ring buffers, while a control plane delivers prioritized, time-limited
//! events between nodes. Everything after start-up draws from fixed-size
//! pools; nothing grows in the hot path.
//!
//! # Core Abstractions
//!
//! ## Data Plane
//!
//! - [`Fifo`] / [`Channel`] - fixed-capacity ring buffers between nodes
//! - [`Node`] - the unit of work: `init`, `prepare`, `run`, events, subscriptions
//! - [`Scheduler`] - cooperative loop over a graph's fixed schedule
//!
//! ## Control Plane
//!
//! - [`Event`] / [`Payload`] - prioritized, TTL-limited notifications
//! - [`EventQueue`] - per-graph mailbox, drained by the event thread
//! - [`EventOutput`] - producer side: `send_sync` and `send_async`
//!
//! ## Shared Buffers
//!
//! - [`BufferHandle`] - reference-counted tensor with shared/exclusive locks
//! - [`Block`] / [`BlockPool`] - pooled data blocks with a release policy
//!
//! ## Graphs
//!
//! - [`GraphBuilder`] / [`Graph`] - construction, lookup, reset, teardown
//! - [`SwitchState`] - pause/resume protocol for time-sharing graphs
//! - [`RuntimeState`] - event, descriptor and lock pools
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature to swap `parking_lot` locks for `spin` locks:
//!
//! ```toml
//! [dependencies]
//! rivulet-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{
//!     Channel, GraphBuilder, Node, Progress, RunResult, RuntimeState, ScheduleSignal,
//!     Scheduler,
//! };
//!
//! struct Ones(Channel<f32>);
//! impl Node for Ones {
//!     fn run(&mut self) -> RunResult {
//!         if self.0.will_overflow_with(4) {
//!             return Ok(Progress::Skip);
//!         }
//!         self.0.write_with(4, |w| w.fill(1.0));
//!         Ok(Progress::Done)
//!     }
//! }
//!
//! struct Drain(Channel<f32>, f32);
//! impl Node for Drain {
//!     fn run(&mut self) -> RunResult {
//!         if self.0.will_underflow_with(4) {
//!             return Ok(Progress::Skip);
//!         }
//!         self.1 += self.0.read_with(4, |r| r.iter().sum::<f32>());
//!         Ok(Progress::Done)
//!     }
//! }
//!
//! let state = RuntimeState::default();
//! let mut builder = GraphBuilder::new("ones", &state);
//! let ch = builder.channel::<f32>("ch", 4);
//! builder.add_node(0, Ones(ch.clone())).unwrap();
//! builder.add_node(1, Drain(ch, 0.0)).unwrap();
//! builder.schedule(&[0, 1]);
//! let graph = builder.build().unwrap();
//! graph.activate();
//!
//! let exit = Scheduler::new(&graph).max_cycles(8).run(&ScheduleSignal::new());
//! assert_eq!(exit.cycles, 8);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod channel;
pub mod event;
pub mod graph;
pub mod node;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod switch;
pub mod sync;
pub mod tensor;

pub use channel::{Channel, ChannelReset, Fifo, ResetChannel};
pub use event::{Event, EventId, Payload, Priority, Ttl};
pub use graph::{BuildError, Graph, GraphBuilder, NodeSlot};
pub use node::{
    Capabilities, ContextSwitch, Destination, Node, NodeCell, NodeId, NodeState, Port,
};
pub use pool::{BlockPool, FixedPool, PoolSlot, Reservation};
pub use queue::{
    CycleClock, EventOutput, EventQueue, PushError, QueueStats, QueueWaker, TickSource,
};
pub use scheduler::{ExitReason, Interrupt, ScheduleSignal, Scheduler, SchedulerExit};
pub use state::{DEFAULT_POOL_SIZE, PoolSizes, PoolUsage, RuntimeState};
pub use status::{InitError, NodeError, Progress, RunResult, Status};
pub use switch::{SwitchReport, SwitchState};
pub use tensor::{
    Block, BufferHandle, ElementType, MAX_RANK, Release, Shape, TensorElement, TensorError,
    TensorPayload, TensorPools,
};
