//! Rivulet CLI - run, validate and inspect rivulet data-flow configurations.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rivulet")]
#[command(author, version, about = "Rivulet data-flow runtime CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the graphs of a configuration on the threaded runtime
    Run(commands::run::RunArgs),

    /// Check a configuration and build every graph without running it
    Validate(commands::validate::ValidateArgs),

    /// List available node kinds and their parameters
    Nodes(commands::nodes::NodesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Nodes(args) => commands::nodes::run(args),
    }
}
