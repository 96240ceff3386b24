//! Error types for building graphs from configuration.

use std::fmt;

use rivulet_config::{ConfigError, ValidationError};
use rivulet_core::{BuildError, ElementType};
use rivulet_runtime::RuntimeError;
use thiserror::Error;

/// Side of a node a channel is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read by the node.
    Input,
    /// Written by the node.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Input => "input",
            Direction::Output => "output",
        })
    }
}

/// Errors that can occur while turning a descriptor into a graph.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No factory is registered for this kind.
    #[error("unknown node kind '{kind}' for node {node}")]
    UnknownKind {
        /// Node identifier.
        node: u16,
        /// Requested kind.
        kind: String,
    },

    /// The node needs a channel the descriptor does not give it.
    #[error("node {node} ({kind}) needs {direction} channel {index}")]
    MissingChannel {
        /// Node identifier.
        node: u16,
        /// Node kind.
        kind: String,
        /// Input or output.
        direction: Direction,
        /// Position in the node's channel list.
        index: usize,
    },

    /// A channel carries a different element type than the node handles.
    #[error("channel '{channel}' of node {node} carries {actual}, expected {expected}")]
    ChannelType {
        /// Node identifier.
        node: u16,
        /// Channel name.
        channel: String,
        /// What the node handles.
        expected: ElementType,
        /// What the channel carries.
        actual: ElementType,
    },

    /// A node setting is unusable.
    #[error("node {node} ({kind}): {reason}")]
    InvalidNode {
        /// Node identifier.
        node: u16,
        /// Node kind.
        kind: String,
        /// What is wrong.
        reason: String,
    },

    /// Parameter access failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The descriptor is structurally invalid.
    #[error("invalid graph descriptor: {0}")]
    Validation(#[from] ValidationError),

    /// Wiring or node initialization failed.
    #[error("failed to build graph '{graph}': {source}")]
    Build {
        /// Graph name.
        graph: String,
        /// Underlying error.
        #[source]
        source: BuildError,
    },

    /// The runtime refused the graph.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl FactoryError {
    /// Create a build error.
    pub fn build(graph: impl Into<String>, source: BuildError) -> Self {
        FactoryError::Build {
            graph: graph.into(),
            source,
        }
    }
}
