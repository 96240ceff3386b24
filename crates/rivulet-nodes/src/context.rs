//! What a node factory gets to work with.

use std::sync::Arc;

use rivulet_config::{ElementKind, NodeConfig};
use rivulet_core::{
    Channel, ElementType, EventOutput, EventQueue, GraphBuilder, Priority, TensorPools, Ttl,
};

use crate::error::{Direction, FactoryError};

/// Block size used when a node has no `block` parameter.
pub const DEFAULT_BLOCK: usize = 4;

/// A graph channel of any supported element type.
#[derive(Clone, Debug)]
pub enum AnyChannel {
    /// `f32` elements.
    F32(Channel<f32>),
    /// `i16` elements.
    I16(Channel<i16>),
    /// `i32` elements.
    I32(Channel<i32>),
    /// `u8` elements.
    U8(Channel<u8>),
}

impl AnyChannel {
    /// Allocates a channel on `builder`.
    pub fn allocate(
        builder: &mut GraphBuilder<'_>,
        name: &str,
        element: ElementKind,
        capacity: usize,
    ) -> Self {
        match element {
            ElementKind::F32 => AnyChannel::F32(builder.channel(name, capacity)),
            ElementKind::I16 => AnyChannel::I16(builder.channel(name, capacity)),
            ElementKind::I32 => AnyChannel::I32(builder.channel(name, capacity)),
            ElementKind::U8 => AnyChannel::U8(builder.channel(name, capacity)),
        }
    }

    /// Element type carried.
    pub fn element(&self) -> ElementType {
        match self {
            AnyChannel::F32(_) => ElementType::F32,
            AnyChannel::I16(_) => ElementType::I16,
            AnyChannel::I32(_) => ElementType::I32,
            AnyChannel::U8(_) => ElementType::U8,
        }
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        match self {
            AnyChannel::F32(c) => c.capacity(),
            AnyChannel::I16(c) => c.capacity(),
            AnyChannel::I32(c) => c.capacity(),
            AnyChannel::U8(c) => c.capacity(),
        }
    }
}

/// Everything a factory needs to construct one node.
pub struct NodeContext<'a> {
    config: &'a NodeConfig,
    inputs: Vec<(&'a str, AnyChannel)>,
    outputs: Vec<(&'a str, AnyChannel)>,
    queue: Arc<EventQueue>,
    tensors: TensorPools,
}

impl<'a> NodeContext<'a> {
    /// Context for `config` with its channels already resolved.
    pub fn new(
        config: &'a NodeConfig,
        inputs: Vec<(&'a str, AnyChannel)>,
        outputs: Vec<(&'a str, AnyChannel)>,
        queue: Arc<EventQueue>,
        tensors: TensorPools,
    ) -> Self {
        Self {
            config,
            inputs,
            outputs,
            queue,
            tensors,
        }
    }

    /// The node's descriptor.
    pub fn config(&self) -> &NodeConfig {
        self.config
    }

    /// Node identifier.
    pub fn id(&self) -> u16 {
        self.config.id
    }

    fn channel(
        &self,
        direction: Direction,
        index: usize,
    ) -> Result<&(&'a str, AnyChannel), FactoryError> {
        let list = match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        };
        list.get(index).ok_or_else(|| FactoryError::MissingChannel {
            node: self.config.id,
            kind: self.config.kind.clone(),
            direction,
            index,
        })
    }

    fn f32_channel(
        &self,
        direction: Direction,
        index: usize,
    ) -> Result<Channel<f32>, FactoryError> {
        let (name, channel) = self.channel(direction, index)?;
        match channel {
            AnyChannel::F32(c) => Ok(c.clone()),
            other => Err(FactoryError::ChannelType {
                node: self.config.id,
                channel: (*name).to_string(),
                expected: ElementType::F32,
                actual: other.element(),
            }),
        }
    }

    /// Input channel `index`, which must carry `f32`.
    pub fn input_f32(&self, index: usize) -> Result<Channel<f32>, FactoryError> {
        self.f32_channel(Direction::Input, index)
    }

    /// Output channel `index`, which must carry `f32`.
    pub fn output_f32(&self, index: usize) -> Result<Channel<f32>, FactoryError> {
        self.f32_channel(Direction::Output, index)
    }

    /// A fresh event output on the graph's queue.
    pub fn event_output(&self) -> EventOutput {
        EventOutput::new(self.queue.clone())
    }

    /// Runtime tensor pools.
    pub fn tensors(&self) -> &TensorPools {
        &self.tensors
    }

    /// Rejects the node with `reason`.
    pub fn invalid(&self, reason: impl Into<String>) -> FactoryError {
        FactoryError::InvalidNode {
            node: self.config.id,
            kind: self.config.kind.clone(),
            reason: reason.into(),
        }
    }

    /// `block` parameter, non-zero, defaulting to [`DEFAULT_BLOCK`].
    ///
    /// Checked against the capacity of every attached channel.
    pub fn block(&self) -> Result<usize, FactoryError> {
        let block = self.config.param_usize("block")?.unwrap_or(DEFAULT_BLOCK);
        if block == 0 {
            return Err(self.invalid("block must be at least 1"));
        }
        for (name, channel) in self.inputs.iter().chain(&self.outputs) {
            if channel.capacity() < block {
                return Err(self.invalid(format!(
                    "block {block} does not fit channel '{name}' of capacity {}",
                    channel.capacity()
                )));
            }
        }
        Ok(block)
    }

    /// `every` parameter: act on one block in `every`, default 1.
    pub fn every(&self) -> Result<u32, FactoryError> {
        let every = self.config.param_usize("every")?.unwrap_or(1);
        u32::try_from(every)
            .ok()
            .filter(|&e| e > 0)
            .ok_or_else(|| self.invalid("every must be between 1 and u32::MAX"))
    }

    /// `priority` parameter: `"high"`, `"normal"` (default) or `"low"`.
    pub fn priority(&self) -> Result<Priority, FactoryError> {
        match self.config.param_str("priority")? {
            None | Some("normal") => Ok(Priority::Normal),
            Some("high") => Ok(Priority::High),
            Some("low") => Ok(Priority::Low),
            Some(other) => Err(self.invalid(format!("unknown priority '{other}'"))),
        }
    }

    /// `ttl` parameter in ticks of the graph's TTL clock; absent means
    /// forever.
    pub fn ttl(&self) -> Result<Ttl, FactoryError> {
        match self.config.param_usize("ttl")? {
            None => Ok(Ttl::Forever),
            Some(ticks) => u32::try_from(ticks)
                .map(Ttl::Ticks)
                .map_err(|_| self.invalid("ttl does not fit 32 bits")),
        }
    }
}
