//! Node listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use rivulet_nodes::{NodeCategory, NodeRegistry};

#[derive(Args)]
pub struct NodesArgs {
    /// Show details for a specific node kind
    #[arg(value_name = "KIND")]
    kind: Option<String>,
}

pub fn run(args: NodesArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();

    if let Some(kind) = &args.kind {
        let node = registry
            .get(kind)
            .ok_or_else(|| anyhow::anyhow!("Unknown node kind: {}", kind))?;

        println!("{} ({})", node.name, node.id);
        println!("{}", "=".repeat(node.name.len() + node.id.len() + 3));
        println!();
        println!("{}", node.description);
        println!();
        println!("  Category: {}", node.category.name());
        println!("  Inputs:   {}", node.inputs);
        println!("  Outputs:  {}", node.outputs);
        println!("  Params:   {}", node.params.join(", "));
        return Ok(());
    }

    println!("Available Nodes");
    println!("===============");
    for category in [
        NodeCategory::Source,
        NodeCategory::Transform,
        NodeCategory::Sink,
        NodeCategory::Event,
    ] {
        let nodes = registry.nodes_in_category(category);
        if nodes.is_empty() {
            continue;
        }
        println!();
        println!("{}:", category.name());
        println!("  {:18}  {:3}  {:3}  {}", "Kind", "In", "Out", "Description");
        println!("  {:18}  {:3}  {:3}  {}", "----", "--", "---", "-----------");
        for node in nodes {
            println!(
                "  {:18}  {:3}  {:3}  {}",
                node.id, node.inputs, node.outputs, node.description
            );
        }
    }
    println!();
    println!("Use 'rivulet nodes <KIND>' for parameters.");
    Ok(())
}
