//! Error types for the threaded runtime.

use thiserror::Error;

/// Errors raised while registering graphs, starting, switching or stopping.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A thread could not be created.
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A runtime thread panicked.
    #[error("thread '{0}' panicked")]
    Panicked(String),

    /// No graph with this name is registered.
    #[error("unknown graph: {0}")]
    UnknownGraph(String),

    /// A graph with this name is already registered.
    #[error("graph already registered: {0}")]
    DuplicateGraph(String),

    /// `start` was called with no graphs registered.
    #[error("no graphs registered")]
    NoGraphs,

    /// The operation needs a stopped runtime.
    #[error("runtime is already running")]
    AlreadyRunning,

    /// The operation needs a running runtime.
    #[error("runtime is not running")]
    NotRunning,
}

impl RuntimeError {
    /// Create a spawn error.
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        RuntimeError::Spawn {
            name: name.into(),
            source,
        }
    }
}
