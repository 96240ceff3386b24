//! Configuration files for rivulet runtimes.
//!
//! A configuration declares the runtime pool sizes and one or more graphs:
//! their channels, nodes, event subscriptions, schedule, channel reset policy
//! and TTL clock. The node registry in `rivulet-nodes` turns a
//! [`GraphConfig`] into a running graph.
//!
//! # Features
//!
//! - **File format**: load and save TOML with serde
//! - **Builders**: construct configurations programmatically
//! - **Validation**: structural checks with every problem reported at once
//! - **Built-ins**: bundled configurations for demos and smoke tests
//!
//! # Example
//!
//! ```rust
//! use rivulet_config::{ChannelConfig, GraphConfig, NodeConfig, RuntimeConfig};
//!
//! let config = RuntimeConfig::new().with_graph(
//!     GraphConfig::new("appa")
//!         .with_channel(ChannelConfig::new("raw", 4))
//!         .with_node(NodeConfig::new(0, "ramp_source").with_output("raw").with_param("block", 4))
//!         .with_node(NodeConfig::new(1, "null_sink").with_input("raw").with_param("block", 4))
//!         .with_schedule([0, 1]),
//! );
//! config.validate().unwrap();
//!
//! let text = config.to_toml().unwrap();
//! assert_eq!(RuntimeConfig::from_toml(&text).unwrap(), config);
//! ```

mod error;
mod graph;
mod runtime_config;

/// Structural validation.
pub mod validation;

/// Configurations bundled with the library.
pub mod builtin;

pub use builtin::{BUILTIN_NAMES, builtin, builtin_configs, is_builtin};
pub use error::ConfigError;
pub use graph::{
    ChannelConfig, ElementKind, GraphConfig, NodeConfig, ResetPolicy, SubscriptionConfig,
    TtlClock,
};
pub use runtime_config::{PoolConfig, RuntimeConfig};
pub use validation::{ValidationError, ValidationResult, validate_config, validate_graph};

/// Parameter values as stored in [`NodeConfig::params`].
pub use toml::Value as ParamValue;
