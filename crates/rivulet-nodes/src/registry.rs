//! Node registry and graph factory.
//!
//! The registry maps the `kind` string of a [`NodeConfig`] to a factory that
//! builds the node from its channels and parameters. [`NodeRegistry::build_graph`]
//! turns a whole [`GraphConfig`] into a [`Graph`].

use std::collections::HashMap;
use std::sync::Arc;

use rivulet_config::{
    GraphConfig, NodeConfig, RuntimeConfig, TtlClock, ValidationError, validate_graph,
};
use rivulet_core::sync::Mutex;
use rivulet_core::{Graph, GraphBuilder, Node, NodeCell, RuntimeState, TickSource};
use rivulet_runtime::{Runtime, WallClock};

use crate::context::{AnyChannel, NodeContext};
use crate::error::FactoryError;
use crate::logger::EventLogger;
use crate::publish::TensorPublisher;
use crate::sinks::{LevelMeter, NullSink};
use crate::sources::{RampSource, SimulatedCapture};
use crate::transform::Gain;

/// Role of a node in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Produces samples.
    Source,
    /// Reads one channel and writes another.
    Transform,
    /// Consumes samples.
    Sink,
    /// Only handles events.
    Event,
}

impl NodeCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            NodeCategory::Source => "Source",
            NodeCategory::Transform => "Transform",
            NodeCategory::Sink => "Sink",
            NodeCategory::Event => "Event",
        }
    }
}

/// Describes a node kind in the registry.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Value of `kind` in configuration files.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for listing.
    pub category: NodeCategory,
    /// Input channels consumed.
    pub inputs: usize,
    /// Output channels produced.
    pub outputs: usize,
    /// Recognized parameters.
    pub params: &'static [&'static str],
}

/// Factory function type for creating nodes.
pub type NodeFactory = fn(&NodeContext<'_>) -> Result<Arc<NodeCell>, FactoryError>;

struct RegistryEntry {
    descriptor: NodeDescriptor,
    factory: NodeFactory,
}

/// Registry of node kinds.
pub struct NodeRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn cell<N: Node + 'static>(node: N) -> Arc<NodeCell> {
    Arc::new(Mutex::new(node))
}

fn resolve<'a>(
    graph: &GraphConfig,
    channels: &HashMap<&str, AnyChannel>,
    node: &NodeConfig,
    names: &'a [String],
) -> Result<Vec<(&'a str, AnyChannel)>, FactoryError> {
    names
        .iter()
        .map(|name| {
            channels
                .get(name.as_str())
                .map(|ch| (name.as_str(), ch.clone()))
                .ok_or_else(|| {
                    FactoryError::from(ValidationError::UnknownChannel {
                        graph: graph.name.clone(),
                        node: node.id,
                        channel: name.clone(),
                    })
                })
        })
        .collect()
}

impl NodeRegistry {
    /// Registry with every built-in node kind.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(7),
        };
        registry.register_builtin_nodes();
        registry
    }

    /// Registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn register_builtin_nodes(&mut self) {
        self.register(
            NodeDescriptor {
                id: "ramp_source",
                name: "Ramp Source",
                description: "Writes a linear ramp, one block per run",
                category: NodeCategory::Source,
                inputs: 0,
                outputs: 1,
                params: &["block", "start", "step"],
            },
            |ctx| {
                let ramp = RampSource::new(ctx.output_f32(0)?, ctx.block()?)
                    .with_start(ctx.config().param_f32("start")?.unwrap_or(0.0))
                    .with_step(ctx.config().param_f32("step")?.unwrap_or(1.0));
                Ok(cell(ramp))
            },
        );

        self.register(
            NodeDescriptor {
                id: "simulated_capture",
                name: "Simulated Capture",
                description: "Square-wave capture driver, started on resume and stopped on pause",
                category: NodeCategory::Source,
                inputs: 0,
                outputs: 1,
                params: &["block", "period", "fail_after"],
            },
            |ctx| {
                let mut capture = SimulatedCapture::new(ctx.output_f32(0)?, ctx.block()?);
                if let Some(period) = ctx.config().param_usize("period")? {
                    let period = u32::try_from(period)
                        .map_err(|_| ctx.invalid("period does not fit 32 bits"))?;
                    capture = capture.with_period(period);
                }
                if let Some(frames) = ctx.config().param_usize("fail_after")? {
                    let frames = u32::try_from(frames)
                        .map_err(|_| ctx.invalid("fail_after does not fit 32 bits"))?;
                    capture = capture.with_fail_after(frames);
                }
                Ok(cell(capture))
            },
        );

        self.register(
            NodeDescriptor {
                id: "gain",
                name: "Gain",
                description: "Multiplies every sample by a constant factor",
                category: NodeCategory::Transform,
                inputs: 1,
                outputs: 1,
                params: &["block", "factor"],
            },
            |ctx| {
                let gain = Gain::new(ctx.input_f32(0)?, ctx.output_f32(0)?, ctx.block()?)
                    .with_factor(ctx.config().param_f32("factor")?.unwrap_or(1.0));
                Ok(cell(gain))
            },
        );

        self.register(
            NodeDescriptor {
                id: "null_sink",
                name: "Null Sink",
                description: "Discards one block per run",
                category: NodeCategory::Sink,
                inputs: 1,
                outputs: 0,
                params: &["block"],
            },
            |ctx| Ok(cell(NullSink::new(ctx.input_f32(0)?, ctx.block()?))),
        );

        self.register(
            NodeDescriptor {
                id: "level_meter",
                name: "Level Meter",
                description: "Publishes the absolute peak of its input as a float event",
                category: NodeCategory::Sink,
                inputs: 1,
                outputs: 0,
                params: &["block", "every", "priority", "ttl"],
            },
            |ctx| {
                let meter = LevelMeter::new(ctx.input_f32(0)?, ctx.block()?, ctx.event_output())
                    .with_every(ctx.every()?)
                    .with_priority(ctx.priority()?)
                    .with_ttl(ctx.ttl()?);
                Ok(cell(meter))
            },
        );

        self.register(
            NodeDescriptor {
                id: "tensor_publisher",
                name: "Tensor Publisher",
                description: "Sends input blocks as pooled, shared tensors",
                category: NodeCategory::Sink,
                inputs: 1,
                outputs: 0,
                params: &["block", "blocks", "every", "priority", "ttl"],
            },
            |ctx| {
                let blocks = ctx.config().param_usize("blocks")?.unwrap_or(2);
                if blocks == 0 {
                    return Err(ctx.invalid("blocks must be at least 1"));
                }
                let publisher = TensorPublisher::new(
                    ctx.input_f32(0)?,
                    ctx.block()?,
                    blocks,
                    ctx.tensors().clone(),
                    ctx.event_output(),
                )
                .with_every(ctx.every()?)
                .with_priority(ctx.priority()?)
                .with_ttl(ctx.ttl()?);
                Ok(cell(publisher))
            },
        );

        self.register(
            NodeDescriptor {
                id: "event_logger",
                name: "Event Logger",
                description: "Logs every event it receives",
                category: NodeCategory::Event,
                inputs: 0,
                outputs: 0,
                params: &["label"],
            },
            |ctx| {
                let label = match ctx.config().param_str("label")? {
                    Some(label) => label.to_string(),
                    None => format!("node{}", ctx.id()),
                };
                Ok(cell(EventLogger::new(label)))
            },
        );
    }

    /// Register a node kind. A later registration of the same id wins.
    pub fn register(&mut self, descriptor: NodeDescriptor, factory: NodeFactory) {
        self.entries.retain(|e| e.descriptor.id != descriptor.id);
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors for all registered kinds.
    pub fn all_nodes(&self) -> Vec<&NodeDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for kinds in a specific category.
    pub fn nodes_in_category(&self, category: NodeCategory) -> Vec<&NodeDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by kind.
    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create one node from its context.
    pub fn create(&self, ctx: &NodeContext<'_>) -> Result<Arc<NodeCell>, FactoryError> {
        let config = ctx.config();
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == config.kind)
            .ok_or_else(|| FactoryError::UnknownKind {
                node: config.id,
                kind: config.kind.clone(),
            })?;
        (entry.factory)(ctx)
    }

    /// Returns the number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds, wires and initializes the graph `config` describes.
    ///
    /// Nodes are created in ID order; their `init` runs when the graph is
    /// built. The returned graph is paused.
    pub fn build_graph(
        &self,
        config: &GraphConfig,
        state: &RuntimeState,
    ) -> Result<Graph, FactoryError> {
        validate_graph(config)?;

        let mut builder = match config.ttl_clock {
            TtlClock::Cycles => GraphBuilder::new(config.name.as_str(), state),
            TtlClock::Millis => {
                let clock: Arc<dyn TickSource> = Arc::new(WallClock::new());
                GraphBuilder::with_tick_source(config.name.as_str(), state, clock)
            }
        };

        let mut channels: HashMap<&str, AnyChannel> = HashMap::new();
        for channel in &config.channels {
            let allocated = AnyChannel::allocate(
                &mut builder,
                &channel.name,
                channel.element,
                channel.capacity,
            );
            channels.insert(channel.name.as_str(), allocated);
        }

        let mut nodes: Vec<&NodeConfig> = config.nodes.iter().collect();
        nodes.sort_by_key(|n| n.id);
        let mut cells = Vec::with_capacity(nodes.len());
        for node in nodes {
            let ctx = NodeContext::new(
                node,
                resolve(config, &channels, node, &node.inputs)?,
                resolve(config, &channels, node, &node.outputs)?,
                Arc::clone(builder.queue()),
                state.tensors().clone(),
            );
            cells.push((node.id, self.create(&ctx)?));
        }
        for (id, cell) in cells {
            builder
                .add_boxed(id, cell)
                .map_err(|e| FactoryError::build(&config.name, e))?;
        }

        for sub in &config.subscriptions {
            builder.subscribe(sub.from, sub.output, sub.to, sub.input);
        }
        builder
            .schedule(&config.schedule)
            .channel_reset(config.channel_reset.into());

        let graph = builder
            .build()
            .map_err(|e| FactoryError::build(&config.name, e))?;
        tracing::info!(
            graph = %config.name,
            nodes = config.nodes.len(),
            channels = config.channels.len(),
            "graph built"
        );
        Ok(graph)
    }

    /// Builds every graph of `config` and registers it with `runtime`, in
    /// file order.
    pub fn load_into(
        &self,
        config: &RuntimeConfig,
        runtime: &mut Runtime,
    ) -> Result<Vec<Arc<Graph>>, FactoryError> {
        config.validate()?;
        let mut graphs = Vec::with_capacity(config.graphs.len());
        for graph in &config.graphs {
            let built = self.build_graph(graph, runtime.state())?;
            graphs.push(runtime.add_graph(built)?);
        }
        Ok(graphs)
    }
}
