//! Graph descriptor types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use rivulet_core::{ChannelReset, ElementType};
use toml::Value;

use crate::error::ConfigError;

/// Element type of a channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// 32-bit float samples.
    #[default]
    F32,
    /// 16-bit PCM.
    I16,
    /// 32-bit integers.
    I32,
    /// Bytes.
    U8,
}

impl From<ElementKind> for ElementType {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::F32 => ElementType::F32,
            ElementKind::I16 => ElementType::I16,
            ElementKind::I32 => ElementType::I32,
            ElementKind::U8 => ElementType::U8,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ElementType::from(*self).fmt(f)
    }
}

/// What happens to a graph's channels when it is paused.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Leave cursors and contents alone.
    Keep,
    /// Zero the cursors.
    #[default]
    Cursors,
    /// Zero the cursors and the storage.
    Zeroed,
}

impl From<ResetPolicy> for ChannelReset {
    fn from(policy: ResetPolicy) -> Self {
        match policy {
            ResetPolicy::Keep => ChannelReset::Keep,
            ResetPolicy::Cursors => ChannelReset::Cursors,
            ResetPolicy::Zeroed => ChannelReset::Zeroed,
        }
    }
}

/// Unit in which event TTLs are counted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TtlClock {
    /// Scheduler cycles of the owning graph.
    #[default]
    Cycles,
    /// Wall-clock milliseconds.
    Millis,
}

/// A channel between nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Unique name within the graph.
    pub name: String,

    /// Element type.
    #[serde(default)]
    pub element: ElementKind,

    /// Capacity in elements.
    pub capacity: usize,
}

impl ChannelConfig {
    /// `f32` channel.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            element: ElementKind::F32,
            capacity,
        }
    }

    /// Set the element type.
    pub fn with_element(mut self, element: ElementKind) -> Self {
        self.element = element;
        self
    }
}

/// One node of a graph.
///
/// `params` is a free-form table read by the node's factory through the
/// typed `param_*` accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Identifier, dense from 0 within the graph.
    pub id: u16,

    /// Registry kind (e.g. `"ramp_source"`).
    pub kind: String,

    /// Channels read, by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Channels written, by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,

    /// Node-specific settings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl NodeConfig {
    /// Node with no channels and no parameters.
    pub fn new(id: u16, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    /// Add an input channel.
    pub fn with_input(mut self, channel: impl Into<String>) -> Self {
        self.inputs.push(channel.into());
        self
    }

    /// Add an output channel.
    pub fn with_output(mut self, channel: impl Into<String>) -> Self {
        self.outputs.push(channel.into());
        self
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn invalid(&self, param: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            node: self.id,
            kind: self.kind.clone(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Integer parameter that must fit a `usize`.
    pub fn param_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Integer(i)) => usize::try_from(*i)
                .map(Some)
                .map_err(|_| self.invalid(key, format!("{i} is not a valid count"))),
            Some(other) => Err(self.invalid(
                key,
                format!("expected an integer, got {}", other.type_str()),
            )),
        }
    }

    /// Integer parameter that must fit an `i32`.
    pub fn param_i32(&self, key: &str) -> Result<Option<i32>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Integer(i)) => i32::try_from(*i)
                .map(Some)
                .map_err(|_| self.invalid(key, format!("{i} does not fit 32 bits"))),
            Some(other) => Err(self.invalid(
                key,
                format!("expected an integer, got {}", other.type_str()),
            )),
        }
    }

    /// Numeric parameter; integers are accepted.
    pub fn param_f32(&self, key: &str) -> Result<Option<f32>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Float(f)) => Ok(Some(*f as f32)),
            Some(Value::Integer(i)) => Ok(Some(*i as f32)),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a number, got {}", other.type_str()),
            )),
        }
    }

    /// Boolean parameter.
    pub fn param_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a boolean, got {}", other.type_str()),
            )),
        }
    }

    /// String parameter.
    pub fn param_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a string, got {}", other.type_str()),
            )),
        }
    }
}

/// Event wiring from an output port of one node to an input port of another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Publishing node.
    pub from: u16,
    /// Output port on `from`.
    #[serde(default)]
    pub output: u16,
    /// Receiving node.
    pub to: u16,
    /// Input port on `to`.
    #[serde(default)]
    pub input: u16,
}

impl SubscriptionConfig {
    /// Port 0 to port 0.
    pub fn new(from: u16, to: u16) -> Self {
        Self {
            from,
            output: 0,
            to,
            input: 0,
        }
    }

    /// Set both ports.
    pub fn with_ports(mut self, output: u16, input: u16) -> Self {
        self.output = output;
        self.input = input;
        self
    }
}

/// One independently scheduled graph.
///
/// # TOML Format
///
/// ```toml
/// [[graphs]]
/// name = "appa"
/// schedule = [0, 1, 2]
/// channel_reset = "cursors"
/// ttl_clock = "cycles"
///
/// [[graphs.channels]]
/// name = "raw"
/// element = "f32"
/// capacity = 4
///
/// [[graphs.nodes]]
/// id = 0
/// kind = "ramp_source"
/// outputs = ["raw"]
/// [graphs.nodes.params]
/// block = 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Unique graph name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Node IDs in execution order of one cycle.
    #[serde(default)]
    pub schedule: Vec<u16>,

    /// Channel policy on pause.
    #[serde(default)]
    pub channel_reset: ResetPolicy,

    /// TTL unit for the graph's events.
    #[serde(default)]
    pub ttl_clock: TtlClock,

    /// Channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    /// Nodes.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Event wiring.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl GraphConfig {
    /// Empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            schedule: Vec::new(),
            channel_reset: ResetPolicy::default(),
            ttl_clock: TtlClock::default(),
            channels: Vec::new(),
            nodes: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the schedule.
    pub fn with_schedule(mut self, schedule: impl IntoIterator<Item = u16>) -> Self {
        self.schedule = schedule.into_iter().collect();
        self
    }

    /// Set the channel reset policy.
    pub fn with_channel_reset(mut self, policy: ResetPolicy) -> Self {
        self.channel_reset = policy;
        self
    }

    /// Set the TTL clock.
    pub fn with_ttl_clock(mut self, clock: TtlClock) -> Self {
        self.ttl_clock = clock;
        self
    }

    /// Add a channel.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channels.push(channel);
        self
    }

    /// Add a node.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a subscription.
    pub fn with_subscription(mut self, subscription: SubscriptionConfig) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Channel by name.
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Node by identifier.
    pub fn node(&self, id: u16) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
