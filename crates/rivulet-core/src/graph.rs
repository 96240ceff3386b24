//! Graph construction and the execution context of one graph.
//!
//! A [`GraphBuilder`] collects channels, nodes, subscriptions and the fixed
//! schedule, then [`build`](GraphBuilder::build)s a [`Graph`]:
//!
//! 1. node identifiers are checked to be dense from zero,
//! 2. the schedule is checked to name existing nodes (its order is taken as
//!    given),
//! 3. subscriptions are wired by calling each producer's `subscribe`,
//! 4. every node's `init` runs in identifier order; the first failure aborts
//!    construction.
//!
//! A freshly built graph is [`SwitchState::Paused`](crate::SwitchState) with
//! a closed event queue. Activating it (see [`crate::switch`]) opens the
//! queue and marks its nodes running.
//!
//! ```rust
//! use rivulet_core::{Channel, GraphBuilder, Node, Progress, RunResult, RuntimeState};
//!
//! struct Emit(Channel<i16>);
//! impl Node for Emit {
//!     fn run(&mut self) -> RunResult {
//!         if self.0.will_overflow_with(2) {
//!             return Ok(Progress::Skip);
//!         }
//!         self.0.write_with(2, |w| w.fill(1));
//!         Ok(Progress::Done)
//!     }
//! }
//!
//! let state = RuntimeState::default();
//! let mut builder = GraphBuilder::new("demo", &state);
//! let ch = builder.channel::<i16>("samples", 4);
//! builder.add_node(0, Emit(ch.clone())).unwrap();
//! builder.schedule(&[0]);
//! let graph = builder.build().unwrap();
//! assert_eq!(graph.node_count(), 1);
//! ```

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::channel::{Channel, ChannelReset, ResetChannel};
use crate::node::{Capabilities, Destination, Node, NodeCell, NodeId, NodeState, Port};
use crate::queue::{CycleClock, EventQueue, TickSource};
use crate::state::RuntimeState;
use crate::status::InitError;
use crate::switch::SwitchState;
use crate::sync::{Mutex, MutexGuard};

/// Errors that abort graph construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The graph has no nodes.
    EmptyGraph,
    /// Two nodes were added with the same identifier.
    DuplicateNode(NodeId),
    /// Identifiers are not dense: this one is missing.
    MissingNode(NodeId),
    /// The schedule names a node that does not exist.
    UnknownScheduledNode(NodeId),
    /// A subscription names a node that does not exist.
    UnknownSubscriptionNode(NodeId),
    /// A producer refused a subscription to one of its outputs.
    SubscribeRefused {
        /// Producer node.
        node: NodeId,
        /// Output port requested.
        output: Port,
    },
    /// A node's `init` failed.
    Init {
        /// Failing node.
        node: NodeId,
        /// Reported failure.
        error: InitError,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGraph => write!(f, "graph has no nodes"),
            Self::DuplicateNode(id) => write!(f, "node {id} added twice"),
            Self::MissingNode(id) => write!(f, "node identifiers are not dense: {id} missing"),
            Self::UnknownScheduledNode(id) => write!(f, "schedule names unknown node {id}"),
            Self::UnknownSubscriptionNode(id) => {
                write!(f, "subscription names unknown node {id}")
            }
            Self::SubscribeRefused { node, output } => {
                write!(f, "node {node} has no event output {output}")
            }
            Self::Init { node, error } => write!(f, "init of node {node} failed: {error}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

#[derive(Clone, Copy, Debug)]
struct Subscription {
    from: NodeId,
    output: Port,
    to: NodeId,
    input: Port,
}

/// Collects the pieces of a graph before it is built.
pub struct GraphBuilder<'s> {
    name: String,
    state: &'s RuntimeState,
    clock: Arc<CycleClock>,
    queue: Arc<EventQueue>,
    nodes: Vec<(NodeId, Arc<NodeCell>)>,
    channels: Vec<(String, Box<dyn ResetChannel>)>,
    subscriptions: Vec<Subscription>,
    schedule: Vec<NodeId>,
    reset: ChannelReset,
}

impl<'s> GraphBuilder<'s> {
    /// Starts a graph whose event TTLs count scheduler cycles.
    pub fn new(name: impl Into<String>, state: &'s RuntimeState) -> Self {
        let clock = Arc::new(CycleClock::new());
        let ticks: Arc<dyn TickSource> = clock.clone();
        Self::with_clock(name, state, clock, ticks)
    }

    /// Starts a graph whose event TTLs count ticks of `ticks`.
    pub fn with_tick_source(
        name: impl Into<String>,
        state: &'s RuntimeState,
        ticks: Arc<dyn TickSource>,
    ) -> Self {
        Self::with_clock(name, state, Arc::new(CycleClock::new()), ticks)
    }

    fn with_clock(
        name: impl Into<String>,
        state: &'s RuntimeState,
        clock: Arc<CycleClock>,
        ticks: Arc<dyn TickSource>,
    ) -> Self {
        Self {
            name: name.into(),
            state,
            clock,
            queue: EventQueue::new(Arc::clone(state.events()), ticks),
            nodes: Vec::new(),
            channels: Vec::new(),
            subscriptions: Vec::new(),
            schedule: Vec::new(),
            reset: ChannelReset::default(),
        }
    }

    /// The runtime state the graph draws from.
    pub fn state(&self) -> &'s RuntimeState {
        self.state
    }

    /// The graph's event queue, for nodes that publish events.
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Allocates a channel owned by the graph.
    pub fn channel<T: Copy + Default + Send + 'static>(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
    ) -> Channel<T> {
        let channel = Channel::new(capacity);
        self.channels.push((name.into(), Box::new(channel.clone())));
        channel
    }

    /// Adds a node under identifier `id`.
    pub fn add_node<N: Node + 'static>(&mut self, id: u16, node: N) -> Result<NodeId, BuildError> {
        self.add_boxed(id, Arc::new(Mutex::new(node)))
    }

    /// Adds an already type-erased node.
    pub fn add_boxed(&mut self, id: u16, cell: Arc<NodeCell>) -> Result<NodeId, BuildError> {
        let id = NodeId::new(id);
        if self.nodes.iter().any(|(existing, _)| *existing == id) {
            return Err(BuildError::DuplicateNode(id));
        }
        self.nodes.push((id, cell));
        Ok(id)
    }

    /// Subscribes input `input` of node `to` to event output `output` of
    /// node `from`.
    pub fn subscribe(&mut self, from: u16, output: Port, to: u16, input: Port) -> &mut Self {
        self.subscriptions.push(Subscription {
            from: NodeId::new(from),
            output,
            to: NodeId::new(to),
            input,
        });
        self
    }

    /// Sets the execution order of one scheduling cycle.
    pub fn schedule(&mut self, order: &[u16]) -> &mut Self {
        self.schedule = order.iter().copied().map(NodeId::new).collect();
        self
    }

    /// Sets what happens to channels when the graph is paused.
    pub fn channel_reset(&mut self, policy: ChannelReset) -> &mut Self {
        self.reset = policy;
        self
    }

    /// Validates, wires and initializes the graph.
    pub fn build(mut self) -> Result<Graph, BuildError> {
        if self.nodes.is_empty() {
            return Err(BuildError::EmptyGraph);
        }
        self.nodes.sort_by_key(|(id, _)| *id);
        if let Some(pos) = self
            .nodes
            .iter()
            .enumerate()
            .position(|(i, (id, _))| id.index() != i)
        {
            return Err(BuildError::MissingNode(NodeId::new(pos as u16)));
        }
        let count = self.nodes.len();
        if let Some(&bad) = self.schedule.iter().find(|id| id.index() >= count) {
            return Err(BuildError::UnknownScheduledNode(bad));
        }

        let slots: Vec<NodeSlot> = self
            .nodes
            .into_iter()
            .map(|(id, cell)| NodeSlot::new(id, cell))
            .collect();

        for sub in &self.subscriptions {
            for id in [sub.from, sub.to] {
                if id.index() >= count {
                    return Err(BuildError::UnknownSubscriptionNode(id));
                }
            }
            let destination = slots[sub.to.index()].destination(sub.input);
            if !slots[sub.from.index()].lock().subscribe(sub.output, destination) {
                return Err(BuildError::SubscribeRefused {
                    node: sub.from,
                    output: sub.output,
                });
            }
        }

        for slot in &slots {
            if let Err(error) = slot.lock().init() {
                #[cfg(feature = "tracing")]
                tracing::warn!(graph = %self.name, node = %slot.id, %error, "node init failed");
                return Err(BuildError::Init {
                    node: slot.id,
                    error,
                });
            }
            slot.set_state(NodeState::Initialized);
        }

        self.queue.close();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            graph = %self.name,
            nodes = slots.len(),
            channels = self.channels.len(),
            scheduled = self.schedule.len(),
            "graph built"
        );

        Ok(Graph {
            name: self.name,
            slots,
            schedule: self.schedule,
            channels: self.channels,
            queue: self.queue,
            clock: self.clock,
            reset: self.reset,
            switch: AtomicU8::new(SwitchState::Paused as u8),
        })
    }
}

/// One entry of a graph's identification table.
pub struct NodeSlot {
    id: NodeId,
    name: String,
    cell: Arc<NodeCell>,
    caps: Capabilities,
    state: AtomicU8,
}

impl NodeSlot {
    fn new(id: NodeId, cell: Arc<NodeCell>) -> Self {
        let (name, caps) = {
            let node = cell.lock();
            (node.name().to_string(), node.capabilities())
        };
        Self {
            id,
            name,
            cell,
            caps,
            state: AtomicU8::new(NodeState::Uninitialized as u8),
        }
    }

    /// Node identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node name, captured at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Locks the node.
    pub fn lock(&self) -> MutexGuard<'_, dyn Node> {
        self.cell.lock()
    }

    /// Address of input `port` on this node.
    pub fn destination(&self, port: Port) -> Destination {
        Destination::new(Arc::downgrade(&self.cell), self.id, port)
    }
}

impl fmt::Debug for NodeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSlot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("caps", &self.caps)
            .field("state", &self.state())
            .finish()
    }
}

/// Execution context of one graph.
pub struct Graph {
    pub(crate) name: String,
    pub(crate) slots: Vec<NodeSlot>,
    pub(crate) schedule: Vec<NodeId>,
    pub(crate) channels: Vec<(String, Box<dyn ResetChannel>)>,
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) clock: Arc<CycleClock>,
    pub(crate) reset: ChannelReset,
    pub(crate) switch: AtomicU8,
}

impl Graph {
    /// Graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of identified nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Looks a node up by identifier.
    pub fn node(&self, id: NodeId) -> Option<&NodeSlot> {
        self.slots.get(id.index())
    }

    /// Identification table in identifier order.
    pub fn nodes(&self) -> &[NodeSlot] {
        &self.slots
    }

    /// Execution order of one cycle.
    pub fn schedule(&self) -> &[NodeId] {
        &self.schedule
    }

    /// The graph's event queue.
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Cycle clock advanced by the scheduler.
    pub fn clock(&self) -> &Arc<CycleClock> {
        &self.clock
    }

    /// Address of input `port` on node `id`, for events injected from
    /// outside the graph.
    pub fn destination(&self, id: NodeId, port: Port) -> Option<Destination> {
        self.node(id).map(|slot| slot.destination(port))
    }

    /// Channel policy applied on pause.
    pub fn channel_reset(&self) -> ChannelReset {
        self.reset
    }

    /// Applies `policy` to every channel of the graph.
    pub fn reset_channels(&self, policy: ChannelReset) {
        for (_name, channel) in &self.channels {
            channel.reset(policy);
        }
    }

    /// Channel names with their fill levels.
    pub fn channel_levels(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.channels
            .iter()
            .map(|(name, ch)| (name.as_str(), ch.fill_level()))
    }

    /// Permanently closes the event queue and marks every node torn down.
    pub fn teardown(&self) {
        let _discarded = self.queue.teardown();
        for slot in &self.slots {
            slot.set_state(NodeState::TornDown);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(graph = %self.name, discarded = _discarded, "graph torn down");
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        if !self.queue.is_torn_down() {
            self.teardown();
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.slots)
            .field("schedule", &self.schedule)
            .field("switch", &self.switch_state())
            .finish_non_exhaustive()
    }
}
