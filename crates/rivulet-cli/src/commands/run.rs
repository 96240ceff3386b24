//! Run command: hosts a configuration on the threaded runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use rivulet_core::ExitReason;
use rivulet_nodes::NodeRegistry;
use rivulet_runtime::{Report, Runtime};

use super::common::{initial_graph, load_config};

/// How often the command wakes up to check timers and Ctrl+C.
const POLL: Duration = Duration::from_millis(10);

#[derive(Args)]
pub struct RunArgs {
    /// Configuration file (TOML) or built-in name
    #[arg(value_name = "FILE")]
    config: String,

    /// Graph to activate first (default: the first in the file)
    #[arg(short, long)]
    graph: Option<String>,

    /// Scheduler cycles per activation (default: unlimited)
    #[arg(short, long)]
    cycles: Option<u32>,

    /// Switch to the next graph every MS milliseconds
    #[arg(long, value_name = "MS")]
    switch_every_ms: Option<u64>,

    /// Stop after MS milliseconds (default: until Ctrl+C)
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u64>,
}

/// Running totals printed when the command ends.
#[derive(Debug, Default)]
struct Summary {
    switches: usize,
    cycles: u64,
    skips: u64,
    failures: Vec<String>,
}

impl Summary {
    fn record(&mut self, report: &Report) {
        match report {
            Report::Switched {
                from,
                to,
                paused,
                resumed,
            } => {
                self.switches += 1;
                println!(
                    "switched {} -> {} (paused {}, resumed {}, discarded {})",
                    from.as_deref().unwrap_or("-"),
                    to,
                    paused.switched,
                    resumed.switched,
                    paused.discarded
                );
            }
            Report::Exited { graph, exit } => {
                self.cycles += u64::from(exit.cycles);
                self.skips += u64::from(exit.skips);
                let reason = match exit.reason {
                    ExitReason::Paused => "paused".to_string(),
                    ExitReason::Stopped => "stopped".to_string(),
                    ExitReason::Completed => "completed".to_string(),
                    ExitReason::Failed { node, error } => {
                        let failure = format!("{graph}: node {} failed: {error}", node.get());
                        self.failures.push(failure.clone());
                        failure
                    }
                };
                println!(
                    "{graph}: {} cycles, {} skips, {reason}",
                    exit.cycles, exit.skips
                );
            }
            Report::Stopped { graph, paused } => {
                println!(
                    "stopped {} (paused {}, discarded {})",
                    graph.as_deref().unwrap_or("-"),
                    paused.switched,
                    paused.discarded
                );
            }
        }
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    config.validate()?;
    let initial = initial_graph(&config, args.graph.as_deref())?;

    let mut builder = Runtime::builder().pools(config.pool_sizes());
    if let Some(cycles) = args.cycles {
        builder = builder.max_cycles(cycles);
    }
    let mut runtime = builder.build();
    NodeRegistry::new().load_into(&config, &mut runtime)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    println!(
        "Running {} graph(s): {}",
        config.graphs.len(),
        config.graph_names().join(", ")
    );
    if args.duration_ms.is_none() && args.cycles.is_none() {
        println!("Press Ctrl+C to stop...");
    }

    runtime.start(&initial)?;
    let handle = runtime.handle();
    let started = Instant::now();
    let deadline = args.duration_ms.map(|ms| started + Duration::from_millis(ms));
    let switch_every = args.switch_every_ms.map(Duration::from_millis);
    let mut next_switch = switch_every.map(|every| started + every);
    // Without a switch timer a bounded run ends with the first activation.
    let finish_on_exit = args.cycles.is_some() && switch_every.is_none();

    let mut summary = Summary::default();
    while running.load(Ordering::SeqCst) {
        match runtime.reports().recv_timeout(POLL) {
            Ok(report) => {
                summary.record(&report);
                if report.is_failure() {
                    break;
                }
                if finish_on_exit && matches!(report, Report::Exited { .. }) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }
        if let (Some(every), Some(at)) = (switch_every, next_switch)
            && now >= at
        {
            handle.switch_next();
            next_switch = Some(at + every);
        }
    }

    runtime.stop()?;
    for report in runtime.reports().try_iter() {
        summary.record(&report);
    }

    println!(
        "Done: {} switch(es), {} cycles, {} skips in {:.1?}",
        summary.switches,
        summary.cycles,
        summary.skips,
        started.elapsed()
    );
    if !summary.failures.is_empty() {
        anyhow::bail!("{}", summary.failures.join("; "));
    }
    Ok(())
}
