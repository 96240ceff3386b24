//! Reports sent from the runtime threads to the application.

use rivulet_core::{SchedulerExit, SwitchReport};

/// Something the application may want to know about.
///
/// Delivered over an unbounded crossbeam channel so runtime threads never
/// block on a slow reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    /// The scheduler returned for `graph`.
    Exited {
        /// Graph that was being scheduled.
        graph: String,
        /// Cycle count, skips and reason.
        exit: SchedulerExit,
    },
    /// A graph switch completed; `to` is now active.
    Switched {
        /// Previously active graph, if any.
        from: Option<String>,
        /// Newly active graph.
        to: String,
        /// Outcome of pausing `from`.
        paused: SwitchReport,
        /// Outcome of resuming `to`.
        resumed: SwitchReport,
    },
    /// The runtime shut down; `graph` was active at the time.
    Stopped {
        /// Graph that was paused on the way out.
        graph: Option<String>,
        /// Outcome of pausing it.
        paused: SwitchReport,
    },
}

impl Report {
    /// `true` for an exit caused by a node error.
    pub fn is_failure(&self) -> bool {
        matches!(self, Report::Exited { exit, .. } if exit.is_failure())
    }
}
