//! Pause/resume protocol letting several graphs share one CPU.
//!
//! Every graph carries a [`SwitchState`]. A switch from graph A to graph B
//! walks both through the state machine:
//!
//! | step | A          | B          | action                                          |
//! |------|------------|------------|-------------------------------------------------|
//! | 1    | `Pausing`  | `Paused`   | data-flow thread asked to stop                  |
//! | 2    | `Paused`   | `Paused`   | A's nodes paused in ID order, queue closed, channels reset |
//! | 3    | `Paused`   | `Resuming` | B's queue opened, B's nodes resumed in ID order |
//! | 4    | `Paused`   | `Active`   | B scheduled; B's events delivered               |
//!
//! Step 1 is [`Graph::begin_pause`]; the caller then waits for the scheduler
//! to return before step 2, [`Graph::complete_pause`]. Steps 3 and 4 are
//! [`Graph::begin_resume`] and [`Graph::complete_resume`]. Events pushed to B
//! are accepted from step 3 on but only delivered once B is `Active`, i.e.
//! after every `resume()` returned.
//!
//! A graph that was never scheduled starts out `Paused` and is brought in
//! with the same two steps, so its nodes are resumed exactly like those of a
//! graph that was switched out. Pausing a node that is already paused, or
//! resuming one that is already running, does not call into the node.

use core::sync::atomic::Ordering;

use crate::graph::Graph;
use crate::node::{Capabilities, NodeState};

/// Position of a graph in the pause/resume protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SwitchState {
    /// Scheduled; events are delivered.
    Active = 0,
    /// The data-flow thread has been asked to stop.
    Pausing = 1,
    /// Not scheduled; queue closed.
    Paused = 2,
    /// Queue accepting; nodes being resumed.
    Resuming = 3,
}

impl SwitchState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Pausing,
            2 => Self::Paused,
            _ => Self::Resuming,
        }
    }
}

/// Outcome of pausing or resuming one graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwitchReport {
    /// Nodes whose `pause`/`resume` was called.
    pub switched: usize,
    /// Calls that returned an error. The protocol carries on regardless.
    pub failed: usize,
    /// Pending events discarded when the queue closed.
    pub discarded: usize,
}

impl Graph {
    /// Current protocol state.
    pub fn switch_state(&self) -> SwitchState {
        SwitchState::from_u8(self.switch.load(Ordering::Acquire))
    }

    fn set_switch_state(&self, state: SwitchState) {
        self.switch.store(state as u8, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::debug!(graph = %self.name, ?state, "switch state");
    }

    /// `true` while the event thread may deliver this graph's events.
    pub fn is_delivering(&self) -> bool {
        self.switch_state() == SwitchState::Active
    }

    /// Step 1: marks the graph `Pausing`. Returns `false` unless it was
    /// `Active`.
    pub fn begin_pause(&self) -> bool {
        self.switch
            .compare_exchange(
                SwitchState::Active as u8,
                SwitchState::Pausing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Step 2: with the scheduler stopped, pauses every capable node in ID
    /// order, closes the queue (discarding pending events) and applies the
    /// channel reset policy.
    pub fn complete_pause(&self) -> SwitchReport {
        let mut report = self.pause_nodes();
        report.discarded = self.queue.close();
        self.reset_channels(self.reset);
        self.set_switch_state(SwitchState::Paused);
        #[cfg(feature = "tracing")]
        tracing::info!(
            graph = %self.name,
            paused = report.switched,
            failed = report.failed,
            discarded = report.discarded,
            "graph paused"
        );
        report
    }

    /// Step 3: opens the queue and marks the graph `Resuming`.
    pub fn begin_resume(&self) {
        self.queue.open();
        self.set_switch_state(SwitchState::Resuming);
    }

    /// Step 4: resumes every capable node in ID order and marks the graph
    /// `Active`.
    pub fn complete_resume(&self) -> SwitchReport {
        let report = self.resume_nodes();
        self.set_switch_state(SwitchState::Active);
        #[cfg(feature = "tracing")]
        tracing::info!(
            graph = %self.name,
            resumed = report.switched,
            failed = report.failed,
            "graph active"
        );
        report
    }

    /// Steps 3 and 4 back to back.
    pub fn activate(&self) -> SwitchReport {
        self.begin_resume();
        self.complete_resume()
    }

    /// Steps 1 and 2 back to back, for callers that know the scheduler is not
    /// running this graph.
    pub fn deactivate(&self) -> SwitchReport {
        self.begin_pause();
        self.complete_pause()
    }

    /// Calls `pause()` on every running node with the capability, in ID
    /// order, and marks all running nodes paused.
    pub fn pause_nodes(&self) -> SwitchReport {
        let mut report = SwitchReport::default();
        for slot in &self.slots {
            if slot.state() != NodeState::Running {
                continue;
            }
            if slot.capabilities().contains(Capabilities::CONTEXT_SWITCH) {
                let mut node = slot.lock();
                if let Some(cs) = node.context_switch() {
                    report.switched += 1;
                    if let Err(_err) = cs.pause() {
                        report.failed += 1;
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            graph = %self.name,
                            node = %slot.id(),
                            %_err,
                            "pause failed"
                        );
                    }
                }
            }
            slot.set_state(NodeState::Paused);
        }
        report
    }

    /// Calls `resume()` on every initialized or paused node with the
    /// capability, in ID order, and marks those nodes running.
    ///
    /// A freshly built graph goes through the same path as one that was
    /// switched out, so its first activation resumes every capable node.
    pub fn resume_nodes(&self) -> SwitchReport {
        let mut report = SwitchReport::default();
        for slot in &self.slots {
            if !matches!(slot.state(), NodeState::Initialized | NodeState::Paused) {
                continue;
            }
            if slot.capabilities().contains(Capabilities::CONTEXT_SWITCH) {
                let mut node = slot.lock();
                if let Some(cs) = node.context_switch() {
                    report.switched += 1;
                    if let Err(_err) = cs.resume() {
                        report.failed += 1;
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            graph = %self.name,
                            node = %slot.id(),
                            %_err,
                            "resume failed"
                        );
                    }
                }
            }
            slot.set_state(NodeState::Running);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::node::{ContextSwitch, Node};
    use crate::state::RuntimeState;
    use crate::status::NodeError;

    #[derive(Default)]
    struct Driver {
        started: bool,
        stops: u32,
        starts: u32,
    }

    impl ContextSwitch for Driver {
        fn pause(&mut self) -> Result<(), NodeError> {
            if self.started {
                self.started = false;
                self.stops += 1;
            }
            Ok(())
        }

        fn resume(&mut self) -> Result<(), NodeError> {
            self.starts += 1;
            Ok(())
        }
    }

    struct Capture(Driver);

    impl Node for Capture {
        fn capabilities(&self) -> Capabilities {
            Capabilities::RUN.union(Capabilities::CONTEXT_SWITCH)
        }

        fn context_switch(&mut self) -> Option<&mut dyn ContextSwitch> {
            Some(&mut self.0)
        }
    }

    fn graph(state: &RuntimeState) -> Graph {
        let mut b = GraphBuilder::new("g", state);
        b.add_node(0, Capture(Driver::default())).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_fresh_graph_is_paused() {
        let state = RuntimeState::default();
        let g = graph(&state);
        assert_eq!(g.switch_state(), SwitchState::Paused);
        assert!(!g.begin_pause());
    }

    #[test]
    fn test_first_activation_resumes() {
        let state = RuntimeState::default();
        let g = graph(&state);
        let report = g.activate();
        assert_eq!(report.switched, 1);
        assert_eq!(g.switch_state(), SwitchState::Active);
        assert!(g.queue().is_open());
        assert_eq!(g.nodes()[0].state(), NodeState::Running);
    }

    #[test]
    fn test_fresh_graph_resumed_like_a_switched_out_one() {
        let state = RuntimeState::default();
        let a = graph(&state);
        let b = graph(&state);
        a.activate();
        assert_eq!(a.deactivate().switched, 1);
        // b never ran: the switch still resumes its driver
        assert_eq!(b.activate().switched, 1);
        assert_eq!(b.nodes()[0].state(), NodeState::Running);
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let state = RuntimeState::default();
        let g = graph(&state);
        assert_eq!(g.activate().switched, 1);
        assert_eq!(g.resume_nodes().switched, 0);
        assert_eq!(g.pause_nodes().switched, 1);
        assert_eq!(g.pause_nodes().switched, 0);
        assert_eq!(g.resume_nodes().switched, 1);
        assert_eq!(g.resume_nodes().switched, 0);
    }

    #[test]
    fn test_full_cycle_states() {
        let state = RuntimeState::default();
        let g = graph(&state);
        g.activate();
        assert!(g.begin_pause());
        assert_eq!(g.switch_state(), SwitchState::Pausing);
        assert!(!g.is_delivering());
        g.complete_pause();
        assert_eq!(g.switch_state(), SwitchState::Paused);
        assert!(!g.queue().is_open());
        g.begin_resume();
        assert_eq!(g.switch_state(), SwitchState::Resuming);
        assert!(g.queue().is_open());
        assert!(!g.is_delivering());
        g.complete_resume();
        assert!(g.is_delivering());
    }
}
