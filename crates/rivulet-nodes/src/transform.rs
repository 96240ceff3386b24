//! Nodes that read one channel and write another.

use rivulet_core::{Channel, Node, Progress, RunResult};

/// Multiplies every sample by a constant factor.
#[derive(Debug)]
pub struct Gain {
    input: Channel<f32>,
    output: Channel<f32>,
    block: usize,
    factor: f32,
}

impl Gain {
    /// Unity gain between `input` and `output`.
    pub fn new(input: Channel<f32>, output: Channel<f32>, block: usize) -> Self {
        Self {
            input,
            output,
            block,
            factor: 1.0,
        }
    }

    /// Linear gain factor.
    pub fn with_factor(mut self, factor: f32) -> Self {
        self.factor = factor;
        self
    }
}

impl Node for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn run(&mut self) -> RunResult {
        if self.input.will_underflow_with(self.block) || self.output.will_overflow_with(self.block)
        {
            return Ok(Progress::Skip);
        }
        // Both channel locks are held only one at a time.
        let mut scratch = [0.0f32; 64];
        let mut remaining = self.block;
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            self.input.read_with(n, |r| scratch[..n].copy_from_slice(r));
            let factor = self.factor;
            self.output.write_with(n, |w| {
                for (out, inp) in w.iter_mut().zip(&scratch[..n]) {
                    *out = inp * factor;
                }
            });
            remaining -= n;
        }
        Ok(Progress::Done)
    }
}
