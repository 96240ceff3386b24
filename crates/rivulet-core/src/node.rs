//! The node contract.
//!
//! A node is a unit of work with a small integer [`NodeId`], an `init` step,
//! a per-cycle `run` step, an optional event handler and optional event
//! outputs other nodes subscribe to. Nodes that drive hardware also implement
//! [`ContextSwitch`] so their graph can be paused and resumed while another
//! graph owns the CPU.
//!
//! Each node lives in its own lock ([`NodeCell`]). The data-flow thread locks
//! it to call `run`; the event thread locks it to call `process_event`; the
//! two never alias.
//!
//! ```rust
//! use rivulet_core::{Capabilities, Event, Node, Port, Progress, RunResult};
//!
//! #[derive(Default)]
//! struct Counter {
//!     runs: u32,
//!     events: u32,
//! }
//!
//! impl Node for Counter {
//!     fn name(&self) -> &str {
//!         "counter"
//!     }
//!
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::RUN.union(Capabilities::EVENTS)
//!     }
//!
//!     fn run(&mut self) -> RunResult {
//!         self.runs += 1;
//!         Ok(Progress::Done)
//!     }
//!
//!     fn process_event(&mut self, _port: Port, _event: Event) {
//!         self.events += 1;
//!     }
//! }
//! ```

#[cfg(not(feature = "std"))]
use alloc::sync::Weak;
use core::fmt;
#[cfg(feature = "std")]
use std::sync::Weak;

use crate::event::Event;
use crate::status::{InitError, NodeError, Progress, RunResult};
use crate::sync::Mutex;

/// Identifier of a node within its graph.
///
/// Identifiers are dense, start at zero, and double as the node's index in
/// the graph's identification table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u16);

impl NodeId {
    /// Creates an identifier.
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw numeric identifier.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Position in the identification table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Event input or output port number on a node.
pub type Port = u16;

/// What a node can do, queried once when it joins a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Nothing.
    pub const NONE: Self = Self(0);
    /// Does data-flow work in `run()`.
    pub const RUN: Self = Self(1 << 0);
    /// Handles events in `process_event()`.
    pub const EVENTS: Self = Self(1 << 1);
    /// Implements [`ContextSwitch`].
    pub const CONTEXT_SWITCH: Self = Self(1 << 2);
    /// Has event outputs other nodes may subscribe to.
    pub const PUBLISH: Self = Self(1 << 3);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two capability sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::RUN
    }
}

/// Pause/resume capability for nodes that own hardware or timers.
///
/// Implementations must tolerate being called for a node that never ran: a
/// driver that was never started is not stopped again.
pub trait ContextSwitch {
    /// Quiesces the node: stop peripherals, drop pending hardware work.
    fn pause(&mut self) -> Result<(), NodeError>;

    /// Restores the node. Returning is the postcondition for "ready to
    /// receive events".
    fn resume(&mut self) -> Result<(), NodeError>;
}

/// A processing node.
///
/// Only [`run`](Node::run) is normally overridden by data-flow nodes and only
/// [`process_event`](Node::process_event) by event-only nodes; every method
/// has a default.
pub trait Node: Send {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "node"
    }

    /// Capabilities, cached by the graph at construction.
    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN
    }

    /// One-time initialization, run in ID order when the graph is built.
    fn init(&mut self) -> Result<(), InitError> {
        Ok(())
    }

    /// Cheap readiness check made by the scheduler before `run`. Returning
    /// `false` skips the node for this cycle.
    fn prepare(&mut self) -> bool {
        true
    }

    /// One scheduling step.
    fn run(&mut self) -> RunResult {
        Ok(Progress::Skip)
    }

    /// Handles an event delivered to input `port`.
    fn process_event(&mut self, port: Port, event: Event) {
        let _ = (port, event);
    }

    /// Registers `destination` as a listener of event output `output`.
    ///
    /// Returns `false` if the node has no such output.
    fn subscribe(&mut self, output: Port, destination: Destination) -> bool {
        let _ = (output, destination);
        false
    }

    /// The node's pause/resume capability, if it has one.
    fn context_switch(&mut self) -> Option<&mut dyn ContextSwitch> {
        None
    }
}

/// Lock around one node.
pub type NodeCell = Mutex<dyn Node>;

/// Where an event goes: an input port on a node of the same graph.
///
/// The node is held weakly so queued events never keep a torn-down graph
/// alive.
#[derive(Clone)]
pub struct Destination {
    node: Weak<NodeCell>,
    id: NodeId,
    port: Port,
}

impl Destination {
    pub(crate) fn new(node: Weak<NodeCell>, id: NodeId, port: Port) -> Self {
        Self { node, id, port }
    }

    /// Target node.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Target input port.
    pub fn port(&self) -> Port {
        self.port
    }

    /// Calls the target's event handler on the current thread.
    ///
    /// Returns `false` if the target no longer exists. Delivering to a node
    /// whose lock the caller already holds deadlocks.
    pub fn deliver(&self, event: Event) -> bool {
        let Some(cell) = self.node.upgrade() else {
            return false;
        };
        cell.lock().process_event(self.port, event);
        true
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("node", &self.id)
            .field("port", &self.port)
            .finish()
    }
}

/// Lifecycle of a node slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    /// Constructed, `init` not yet called.
    Uninitialized = 0,
    /// `init` succeeded.
    Initialized = 1,
    /// Part of the active graph.
    Running = 2,
    /// Quiesced by a context switch.
    Paused = 3,
    /// The owning graph was torn down.
    TornDown = 4,
}

impl NodeState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::Running,
            3 => Self::Paused,
            _ => Self::TornDown,
        }
    }
}
