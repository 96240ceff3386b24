//! Validate command: structural checks plus a trial build of every graph.

use clap::Args;
use rivulet_core::RuntimeState;
use rivulet_nodes::NodeRegistry;

use super::common::load_config;

#[derive(Args)]
pub struct ValidateArgs {
    /// Configuration file (TOML) or built-in name
    #[arg(value_name = "FILE")]
    config: String,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    config.validate()?;

    // Building runs every node's init, which catches unknown kinds, bad
    // parameters and channel type mismatches.
    let registry = NodeRegistry::new();
    let state = RuntimeState::new(config.pool_sizes());
    for graph_config in &config.graphs {
        let graph = registry
            .build_graph(graph_config, &state)
            .map_err(|e| anyhow::anyhow!("graph '{}': {}", graph_config.name, e))?;
        println!(
            "{}: {} node(s), {} channel(s), {} subscription(s), schedule {:?}",
            graph.name(),
            graph.node_count(),
            graph_config.channels.len(),
            graph_config.subscriptions.len(),
            graph_config.schedule
        );
        graph.teardown();
    }
    state.teardown();

    let usage = state.usage();
    println!(
        "OK: {} graph(s); pools events={} buffers={} locks={}",
        config.graphs.len(),
        config.runtime.event_pool,
        config.runtime.buffer_pool,
        config.runtime.lock_pool
    );
    tracing::debug!(
        events = usage.events,
        buffers = usage.buffers,
        locks = usage.locks,
        "pool slots still held after teardown"
    );
    Ok(())
}
