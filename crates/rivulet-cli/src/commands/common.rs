//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use rivulet_config::{BUILTIN_NAMES, RuntimeConfig, builtin};

/// Load a configuration by built-in name or path.
///
/// Built-in names win over files of the same name in the working directory.
pub fn load_config(name: &str) -> anyhow::Result<RuntimeConfig> {
    if let Some(config) = builtin(name) {
        tracing::debug!(name, "using built-in configuration");
        return Ok(config);
    }

    let path = Path::new(name);
    if path.exists() {
        return Ok(RuntimeConfig::load(path)?);
    }

    anyhow::bail!(
        "Configuration '{}' not found. Pass a TOML file or one of the built-ins: {}",
        name,
        BUILTIN_NAMES.join(", ")
    )
}

/// Graph to start with: the requested one, or the first in the file.
pub fn initial_graph(config: &RuntimeConfig, requested: Option<&str>) -> anyhow::Result<String> {
    match requested {
        Some(name) => Ok(config.graph(name)?.name.clone()),
        None => config
            .graphs
            .first()
            .map(|g| g.name.clone())
            .ok_or_else(|| anyhow::anyhow!("configuration declares no graphs")),
    }
}
