//! Reference nodes and the node registry for rivulet graphs.
//!
//! This crate provides a small set of generic nodes and a registry that
//! builds graphs from [`rivulet_config`] descriptors, so a configuration file
//! is all it takes to get a runtime going.
//!
//! # Nodes
//!
//! | kind                | category  | does                                            |
//! |---------------------|-----------|-------------------------------------------------|
//! | `ramp_source`       | source    | writes a linear ramp                            |
//! | `simulated_capture` | source    | capture driver with pause/resume                |
//! | `gain`              | transform | multiplies by a constant                        |
//! | `null_sink`         | sink      | discards its input                              |
//! | `level_meter`       | sink      | publishes peaks as float events                 |
//! | `tensor_publisher`  | sink      | publishes blocks as pooled, shared tensors      |
//! | `event_logger`      | event     | logs every event it receives                    |
//!
//! All sample channels carry `f32`. Common parameters: `block` (samples per
//! run, default 4), `every` (publish one block in N), `priority`
//! (`high`/`normal`/`low`), `ttl` (ticks of the graph's TTL clock).
//!
//! # Example
//!
//! ```rust
//! use rivulet_config::builtin;
//! use rivulet_core::{RuntimeState, ScheduleSignal, Scheduler};
//! use rivulet_nodes::NodeRegistry;
//!
//! let config = builtin("pipeline").unwrap();
//! let state = RuntimeState::new(config.pool_sizes());
//! let graph = NodeRegistry::new()
//!     .build_graph(config.graph("pipeline").unwrap(), &state)
//!     .unwrap();
//! graph.activate();
//! let exit = Scheduler::new(&graph).max_cycles(16).run(&ScheduleSignal::new());
//! assert!(!exit.is_failure());
//! graph.teardown();
//! ```

pub mod context;
pub mod error;
pub mod logger;
pub mod publish;
pub mod registry;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use context::{AnyChannel, DEFAULT_BLOCK, NodeContext};
pub use error::{Direction, FactoryError};
pub use logger::{EventLogger, LoggerStats};
pub use publish::{PublisherStats, TensorPublisher};
pub use registry::{NodeCategory, NodeDescriptor, NodeFactory, NodeRegistry};
pub use sinks::{CollectSink, Collected, LevelMeter, MeterStats, NullSink};
pub use sources::{DriverStats, RampSource, SimulatedCapture};
pub use transform::Gain;
