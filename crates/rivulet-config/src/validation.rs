//! Structural validation of configuration files.
//!
//! Checks everything that can be decided without knowing the node kinds:
//! names are unique, node IDs are dense from 0, schedules and subscriptions
//! only name existing nodes, channels exist and have a capacity, pools are
//! not empty. Node kinds and their parameters are checked by the node
//! registry when the graph is built.
//!
//! # Example
//!
//! ```rust
//! use rivulet_config::{GraphConfig, NodeConfig, RuntimeConfig, ValidationError};
//!
//! let config = RuntimeConfig::new()
//!     .with_graph(GraphConfig::new("g").with_node(NodeConfig::new(1, "null_sink")));
//! assert_eq!(
//!     config.validate(),
//!     Err(ValidationError::MissingNode { graph: "g".into(), id: 0 })
//! );
//! ```

use std::collections::HashSet;
use thiserror::Error;

use crate::graph::GraphConfig;
use crate::runtime_config::RuntimeConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The file declares no graph.
    #[error("no graphs declared")]
    NoGraphs,

    /// A runtime pool has size zero.
    #[error("pool '{0}' must not be empty")]
    EmptyPool(&'static str),

    /// Two graphs share a name.
    #[error("duplicate graph name: {0}")]
    DuplicateGraph(String),

    /// A graph has no nodes.
    #[error("graph '{0}' has no nodes")]
    EmptyGraph(String),

    /// Two nodes share an identifier.
    #[error("graph '{graph}': duplicate node id {id}")]
    DuplicateNode {
        /// Graph name.
        graph: String,
        /// Repeated identifier.
        id: u16,
    },

    /// Node identifiers are not dense from 0.
    #[error("graph '{graph}': node ids must be contiguous from 0, missing {id}")]
    MissingNode {
        /// Graph name.
        graph: String,
        /// First missing identifier.
        id: u16,
    },

    /// The schedule names a node that does not exist.
    #[error("graph '{graph}': schedule names unknown node {id}")]
    UnknownScheduledNode {
        /// Graph name.
        graph: String,
        /// Unknown identifier.
        id: u16,
    },

    /// Two channels share a name.
    #[error("graph '{graph}': duplicate channel '{channel}'")]
    DuplicateChannel {
        /// Graph name.
        graph: String,
        /// Repeated name.
        channel: String,
    },

    /// A channel has capacity zero.
    #[error("graph '{graph}': channel '{channel}' has zero capacity")]
    ZeroCapacity {
        /// Graph name.
        graph: String,
        /// Channel name.
        channel: String,
    },

    /// A node references a channel that is not declared.
    #[error("graph '{graph}': node {node} references unknown channel '{channel}'")]
    UnknownChannel {
        /// Graph name.
        graph: String,
        /// Referencing node.
        node: u16,
        /// Unknown channel name.
        channel: String,
    },

    /// A subscription names a node that does not exist.
    #[error("graph '{graph}': subscription names unknown node {id}")]
    UnknownSubscriptionNode {
        /// Graph name.
        graph: String,
        /// Unknown identifier.
        id: u16,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Collapses a list of errors into `Ok`, the single error, or `Multiple`.
fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Validate a whole configuration.
pub fn validate_config(config: &RuntimeConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    let pools = config.runtime;
    for (name, size) in [
        ("event_pool", pools.event_pool),
        ("buffer_pool", pools.buffer_pool),
        ("lock_pool", pools.lock_pool),
    ] {
        if size == 0 {
            errors.push(ValidationError::EmptyPool(name));
        }
    }

    if config.graphs.is_empty() {
        errors.push(ValidationError::NoGraphs);
    }

    let mut names = HashSet::new();
    for graph in &config.graphs {
        if !names.insert(graph.name.as_str()) {
            errors.push(ValidationError::DuplicateGraph(graph.name.clone()));
        }
        graph_errors(graph, &mut errors);
    }

    collect(errors)
}

/// Validate a single graph.
pub fn validate_graph(graph: &GraphConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    graph_errors(graph, &mut errors);
    collect(errors)
}

fn graph_errors(graph: &GraphConfig, errors: &mut Vec<ValidationError>) {
    let name = || graph.name.clone();

    if graph.nodes.is_empty() {
        errors.push(ValidationError::EmptyGraph(name()));
        return;
    }

    let mut ids: Vec<u16> = graph.nodes.iter().map(|n| n.id).collect();
    ids.sort_unstable();
    for pair in ids.windows(2) {
        if pair[0] == pair[1] {
            errors.push(ValidationError::DuplicateNode {
                graph: name(),
                id: pair[0],
            });
        }
    }
    ids.dedup();
    if let Some(missing) = (0u16..).zip(&ids).find(|(want, have)| want != *have) {
        errors.push(ValidationError::MissingNode {
            graph: name(),
            id: missing.0,
        });
    }
    let known: HashSet<u16> = ids.iter().copied().collect();

    for &id in &graph.schedule {
        if !known.contains(&id) {
            errors.push(ValidationError::UnknownScheduledNode { graph: name(), id });
        }
    }

    let mut channels = HashSet::new();
    for channel in &graph.channels {
        if !channels.insert(channel.name.as_str()) {
            errors.push(ValidationError::DuplicateChannel {
                graph: name(),
                channel: channel.name.clone(),
            });
        }
        if channel.capacity == 0 {
            errors.push(ValidationError::ZeroCapacity {
                graph: name(),
                channel: channel.name.clone(),
            });
        }
    }

    for node in &graph.nodes {
        for channel in node.inputs.iter().chain(&node.outputs) {
            if !channels.contains(channel.as_str()) {
                errors.push(ValidationError::UnknownChannel {
                    graph: name(),
                    node: node.id,
                    channel: channel.clone(),
                });
            }
        }
    }

    for sub in &graph.subscriptions {
        for id in [sub.from, sub.to] {
            if !known.contains(&id) {
                errors.push(ValidationError::UnknownSubscriptionNode { graph: name(), id });
            }
        }
    }
}
