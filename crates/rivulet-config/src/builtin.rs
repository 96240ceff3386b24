//! Configurations bundled with the library.
//!
//! Always available without external files; they double as documentation of
//! the file format and as smoke tests for the reference nodes.

use crate::RuntimeConfig;

/// Names of the bundled configurations.
pub static BUILTIN_NAMES: &[&str] = &["pipeline", "switching"];

static BUILTIN_TOML: &[(&str, &str)] = &[("pipeline", PIPELINE), ("switching", SWITCHING)];

/// Source, gain and meter; the meter reports peaks to a logger.
const PIPELINE: &str = r#"
[runtime]
event_pool = 20
buffer_pool = 20
lock_pool = 20

[[graphs]]
name = "pipeline"
description = "ramp source -> gain x2 -> level meter, peaks logged as events"
schedule = [0, 1, 2]

[[graphs.channels]]
name = "raw"
element = "f32"
capacity = 8

[[graphs.channels]]
name = "scaled"
element = "f32"
capacity = 8

[[graphs.nodes]]
id = 0
kind = "ramp_source"
outputs = ["raw"]
[graphs.nodes.params]
block = 4

[[graphs.nodes]]
id = 1
kind = "gain"
inputs = ["raw"]
outputs = ["scaled"]
[graphs.nodes.params]
block = 4
factor = 2.0

[[graphs.nodes]]
id = 2
kind = "level_meter"
inputs = ["scaled"]
[graphs.nodes.params]
block = 4
every = 256

[[graphs.nodes]]
id = 3
kind = "event_logger"
[graphs.nodes.params]
label = "meter"

[[graphs.subscriptions]]
from = 2
output = 0
to = 3
input = 0
"#;

/// Two graphs sharing the CPU: a capture graph publishing tensors, and a
/// plain processing graph.
const SWITCHING: &str = r#"
[runtime]
event_pool = 20
buffer_pool = 20
lock_pool = 20

[[graphs]]
name = "appa"
description = "simulated capture -> tensor publisher -> event logger"
schedule = [0, 1]
channel_reset = "cursors"
ttl_clock = "cycles"

[[graphs.channels]]
name = "frames"
element = "f32"
capacity = 16

[[graphs.nodes]]
id = 0
kind = "simulated_capture"
outputs = ["frames"]
[graphs.nodes.params]
block = 8

[[graphs.nodes]]
id = 1
kind = "tensor_publisher"
inputs = ["frames"]
[graphs.nodes.params]
block = 8
blocks = 4
ttl = 64
every = 64

[[graphs.nodes]]
id = 2
kind = "event_logger"
[graphs.nodes.params]
label = "frames"

[[graphs.subscriptions]]
from = 1
to = 2

[[graphs]]
name = "appb"
description = "ramp source -> gain x0.5 -> null sink"
schedule = [0, 1, 2]
channel_reset = "zeroed"

[[graphs.channels]]
name = "raw"
capacity = 8

[[graphs.channels]]
name = "half"
capacity = 8

[[graphs.nodes]]
id = 0
kind = "ramp_source"
outputs = ["raw"]

[[graphs.nodes]]
id = 1
kind = "gain"
inputs = ["raw"]
outputs = ["half"]
[graphs.nodes.params]
factor = 0.5

[[graphs.nodes]]
id = 2
kind = "null_sink"
inputs = ["half"]
"#;

/// Every bundled configuration, in [`BUILTIN_NAMES`] order.
pub fn builtin_configs() -> Vec<(&'static str, RuntimeConfig)> {
    BUILTIN_TOML
        .iter()
        .filter_map(|(name, toml)| RuntimeConfig::from_toml(toml).ok().map(|c| (*name, c)))
        .collect()
}

/// A bundled configuration by name (case-insensitive).
pub fn builtin(name: &str) -> Option<RuntimeConfig> {
    BUILTIN_TOML
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .and_then(|(_, toml)| RuntimeConfig::from_toml(toml).ok())
}

/// `true` if `name` is a bundled configuration.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
}
