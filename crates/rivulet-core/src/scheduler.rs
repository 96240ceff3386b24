//! Static cooperative scheduler.
//!
//! Each cycle walks the graph's fixed schedule. Before every node the
//! scheduler polls the [`ScheduleSignal`] (a non-blocking atomic read); a
//! pending pause or stop ends the loop at that point. The node's `prepare`
//! predicate is consulted, then `run` is called:
//!
//! - `Ok(Progress::Done)` and `Ok(Progress::Skip)` continue the cycle,
//! - any `Err` ends the loop and is reported with the failing node.
//!
//! After a full cycle the cycle counter and the graph's cycle clock advance.
//! The schedule order is taken as given.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::graph::Graph;
use crate::node::NodeId;
use crate::status::{NodeError, Progress, Status};

const PAUSE: u8 = 1 << 0;
const STOP: u8 = 1 << 1;

/// Request posted to a running scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// Leave the loop so the graph can be switched out.
    Pause,
    /// Leave the loop for good.
    Stop,
}

/// Flags polled by the scheduler before each node.
#[derive(Debug, Default)]
pub struct ScheduleSignal {
    bits: AtomicU8,
}

impl ScheduleSignal {
    /// No request pending.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Asks the scheduler to pause.
    pub fn request_pause(&self) {
        self.bits.fetch_or(PAUSE, Ordering::AcqRel);
    }

    /// Asks the scheduler to stop.
    pub fn request_stop(&self) {
        self.bits.fetch_or(STOP, Ordering::AcqRel);
    }

    /// `true` if a request is pending.
    pub fn is_pending(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }

    /// Consumes the pending request. Stop wins over pause.
    pub fn take(&self) -> Option<Interrupt> {
        if self.bits.load(Ordering::Acquire) == 0 {
            return None;
        }
        let bits = self.bits.swap(0, Ordering::AcqRel);
        if bits & STOP != 0 {
            Some(Interrupt::Stop)
        } else if bits & PAUSE != 0 {
            Some(Interrupt::Pause)
        } else {
            None
        }
    }

    /// Drops any pending request.
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }
}

/// Why the scheduling loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// A pause request was observed.
    Paused,
    /// A stop request was observed.
    Stopped,
    /// The cycle budget was used up.
    Completed,
    /// A node reported an error.
    Failed {
        /// The failing node.
        node: NodeId,
        /// What it reported.
        error: NodeError,
    },
}

/// Result of one scheduling loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerExit {
    /// Completed cycles.
    pub cycles: u32,
    /// Node steps that returned skip.
    pub skips: u32,
    /// Why the loop ended.
    pub reason: ExitReason,
}

impl SchedulerExit {
    /// Flat status of the exit.
    pub fn status(&self) -> Status {
        match self.reason {
            ExitReason::Paused => Status::Paused,
            ExitReason::Stopped => Status::Stop,
            ExitReason::Completed => Status::Success,
            ExitReason::Failed { error, .. } => error.into(),
        }
    }

    /// `true` if a node failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.reason, ExitReason::Failed { .. })
    }
}

impl From<Interrupt> for ExitReason {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Pause => ExitReason::Paused,
            Interrupt::Stop => ExitReason::Stopped,
        }
    }
}

/// Drives one graph's schedule.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g Graph,
    max_cycles: Option<u32>,
}

impl<'g> Scheduler<'g> {
    /// Scheduler that runs until signalled.
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            max_cycles: None,
        }
    }

    /// Returns [`ExitReason::Completed`] after `cycles` full cycles.
    pub fn max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Runs cycles until a signal, an error, or the cycle budget ends the
    /// loop.
    pub fn run(&self, signal: &ScheduleSignal) -> SchedulerExit {
        let graph = self.graph;
        let mut cycles: u32 = 0;
        let mut skips: u32 = 0;
        let exit = |cycles, skips, reason| {
            let exit = SchedulerExit {
                cycles,
                skips,
                reason,
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(
                graph = %graph.name(),
                cycles,
                skips,
                reason = ?exit.reason,
                "scheduler exit"
            );
            exit
        };

        loop {
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                return exit(cycles, skips, ExitReason::Completed);
            }
            if graph.schedule.is_empty() {
                if let Some(interrupt) = signal.take() {
                    return exit(cycles, skips, interrupt.into());
                }
                core::hint::spin_loop();
            }
            for &id in &graph.schedule {
                if let Some(interrupt) = signal.take() {
                    return exit(cycles, skips, interrupt.into());
                }
                let slot = &graph.slots[id.index()];
                let result = {
                    let mut node = slot.lock();
                    if node.prepare() {
                        node.run()
                    } else {
                        Ok(Progress::Skip)
                    }
                };
                match result {
                    Ok(Progress::Done) => {}
                    Ok(Progress::Skip) => skips = skips.wrapping_add(1),
                    Err(error) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            graph = %graph.name(),
                            node = %id,
                            %error,
                            cycles,
                            "node failed"
                        );
                        return exit(cycles, skips, ExitReason::Failed { node: id, error });
                    }
                }
            }
            cycles = cycles.wrapping_add(1);
            graph.clock.advance();
        }
    }
}

/// Runs `graph` until signalled or failed.
pub fn run(graph: &Graph, signal: &ScheduleSignal) -> SchedulerExit {
    Scheduler::new(graph).run(signal)
}
