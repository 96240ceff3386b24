//! Nodes that produce samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use rivulet_core::{Capabilities, Channel, ContextSwitch, Node, NodeError, Progress, RunResult};

/// Writes a linear ramp: `start`, `start + step`, `start + 2 * step`, ...
#[derive(Debug)]
pub struct RampSource {
    output: Channel<f32>,
    block: usize,
    next: f32,
    step: f32,
}

impl RampSource {
    /// Ramp starting at `0.0` with step `1.0`.
    pub fn new(output: Channel<f32>, block: usize) -> Self {
        Self {
            output,
            block,
            next: 0.0,
            step: 1.0,
        }
    }

    /// First value written.
    pub fn with_start(mut self, start: f32) -> Self {
        self.next = start;
        self
    }

    /// Increment between consecutive values.
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }
}

impl Node for RampSource {
    fn name(&self) -> &str {
        "ramp_source"
    }

    fn run(&mut self) -> RunResult {
        if self.output.will_overflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        let (mut next, step) = (self.next, self.step);
        self.output.write_with(self.block, |out| {
            for sample in out {
                *sample = next;
                next += step;
            }
        });
        self.next = next;
        Ok(Progress::Done)
    }
}

/// Counters kept by a [`SimulatedCapture`] driver.
#[derive(Debug, Default)]
pub struct DriverStats {
    starts: AtomicU32,
    stops: AtomicU32,
    frames: AtomicU32,
    running: AtomicBool,
}

impl DriverStats {
    /// Times the driver was started.
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::Relaxed)
    }

    /// Times the driver was stopped.
    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::Relaxed)
    }

    /// Frames delivered since construction.
    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::Relaxed)
    }

    /// `true` while the driver is started.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Stand-in for a capture peripheral (microphone, ADC, camera line).
///
/// The simulated driver is idle after `init`; it is started when the graph is
/// resumed and stopped when it is paused. Pause and resume are idempotent: a
/// stopped driver is never stopped twice and a running one never started
/// twice. Each frame is one block of a square wave whose sign flips every
/// `period` samples.
#[derive(Debug)]
pub struct SimulatedCapture {
    output: Channel<f32>,
    block: usize,
    period: u32,
    phase: u32,
    fail_after: Option<u32>,
    stats: Arc<DriverStats>,
}

impl SimulatedCapture {
    /// Capture writing `block` samples per frame.
    pub fn new(output: Channel<f32>, block: usize) -> Self {
        Self {
            output,
            block,
            period: 16,
            phase: 0,
            fail_after: None,
            stats: Arc::new(DriverStats::default()),
        }
    }

    /// Half-period of the square wave, in samples.
    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period.max(1);
        self
    }

    /// Make the driver report an OS fault after `frames` frames.
    pub fn with_fail_after(mut self, frames: u32) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Shared driver counters.
    pub fn stats(&self) -> Arc<DriverStats> {
        Arc::clone(&self.stats)
    }

    fn start_driver(&mut self) {
        if !self.stats.running.swap(true, Ordering::Relaxed) {
            self.stats.starts.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(starts = self.stats.starts(), "capture driver started");
        }
    }

    fn stop_driver(&mut self) {
        if self.stats.running.swap(false, Ordering::Relaxed) {
            self.stats.stops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(stops = self.stats.stops(), "capture driver stopped");
        }
    }
}

impl Node for SimulatedCapture {
    fn name(&self) -> &str {
        "simulated_capture"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN.union(Capabilities::CONTEXT_SWITCH)
    }

    fn prepare(&mut self) -> bool {
        self.stats.is_running()
    }

    fn run(&mut self) -> RunResult {
        if self
            .fail_after
            .is_some_and(|limit| self.stats.frames() >= limit)
        {
            tracing::warn!(frames = self.stats.frames(), "capture driver fault");
            return Err(NodeError::Os);
        }
        if self.output.will_overflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        let (mut phase, period) = (self.phase, self.period);
        self.output.write_with(self.block, |out| {
            for sample in out {
                *sample = if (phase / period) % 2 == 0 { 0.5 } else { -0.5 };
                phase = phase.wrapping_add(1);
            }
        });
        self.phase = phase;
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        Ok(Progress::Done)
    }

    fn context_switch(&mut self) -> Option<&mut dyn ContextSwitch> {
        Some(self)
    }
}

impl ContextSwitch for SimulatedCapture {
    fn pause(&mut self) -> Result<(), NodeError> {
        self.stop_driver();
        Ok(())
    }

    fn resume(&mut self) -> Result<(), NodeError> {
        self.start_driver();
        Ok(())
    }
}
