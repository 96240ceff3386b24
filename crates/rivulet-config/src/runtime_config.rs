//! Top-level configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use rivulet_core::{DEFAULT_POOL_SIZE, PoolSizes};

use crate::error::ConfigError;
use crate::graph::GraphConfig;
use crate::validation::{self, ValidationResult};

/// Sizes of the runtime pools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Queued events across all graphs.
    #[serde(default = "default_pool")]
    pub event_pool: usize,

    /// Live buffer-handle descriptors.
    #[serde(default = "default_pool")]
    pub buffer_pool: usize,

    /// Live buffer-handle locks.
    #[serde(default = "default_pool")]
    pub lock_pool: usize,
}

fn default_pool() -> usize {
    DEFAULT_POOL_SIZE
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            event_pool: DEFAULT_POOL_SIZE,
            buffer_pool: DEFAULT_POOL_SIZE,
            lock_pool: DEFAULT_POOL_SIZE,
        }
    }
}

impl From<PoolConfig> for PoolSizes {
    fn from(pools: PoolConfig) -> Self {
        PoolSizes {
            events: pools.event_pool,
            buffers: pools.buffer_pool,
            locks: pools.lock_pool,
        }
    }
}

/// A rivulet configuration file: runtime pools plus one or more graphs.
///
/// # TOML Format
///
/// ```toml
/// [runtime]
/// event_pool = 20
/// buffer_pool = 20
/// lock_pool = 20
///
/// [[graphs]]
/// name = "appa"
/// schedule = [0, 1]
///
/// [[graphs.channels]]
/// name = "raw"
/// capacity = 4
///
/// [[graphs.nodes]]
/// id = 0
/// kind = "ramp_source"
/// outputs = ["raw"]
///
/// [[graphs.nodes]]
/// id = 1
/// kind = "null_sink"
/// inputs = ["raw"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Pool sizes.
    #[serde(default)]
    pub runtime: PoolConfig,

    /// Graphs, in switching order.
    #[serde(default)]
    pub graphs: Vec<GraphConfig>,
}

impl RuntimeConfig {
    /// Configuration with default pools and no graphs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool sizes.
    pub fn with_pools(mut self, pools: PoolConfig) -> Self {
        self.runtime = pools;
        self
    }

    /// Add a graph.
    pub fn with_graph(mut self, graph: GraphConfig) -> Self {
        self.graphs.push(graph);
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every rule in [`validation`].
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_config(self)
    }

    /// Pool sizes for `RuntimeState`.
    pub fn pool_sizes(&self) -> PoolSizes {
        self.runtime.into()
    }

    /// Graph by name.
    pub fn graph(&self, name: &str) -> Result<&GraphConfig, ConfigError> {
        self.graphs
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::GraphNotFound(name.to_string()))
    }

    /// Graph names in file order.
    pub fn graph_names(&self) -> Vec<&str> {
        self.graphs.iter().map(|g| g.name.as_str()).collect()
    }
}

impl FromStr for RuntimeConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(s)
    }
}
