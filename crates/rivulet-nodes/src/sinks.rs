//! Nodes that consume samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use rivulet_core::{
    Capabilities, Channel, Destination, Event, EventId, EventOutput, Node, Payload, Port,
    Priority, Progress, RunResult, Ttl,
};

/// Discards one block per run.
#[derive(Debug)]
pub struct NullSink {
    input: Channel<f32>,
    block: usize,
}

impl NullSink {
    /// Sink draining `block` samples per run.
    pub fn new(input: Channel<f32>, block: usize) -> Self {
        Self { input, block }
    }
}

impl Node for NullSink {
    fn name(&self) -> &str {
        "null_sink"
    }

    fn run(&mut self) -> RunResult {
        if self.input.will_underflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        self.input.read_with(self.block, |_| ());
        Ok(Progress::Done)
    }
}

/// Samples gathered by a [`CollectSink`].
pub type Collected = Arc<Mutex<Vec<f32>>>;

/// Keeps everything it reads, for tests and inspection.
///
/// Stops consuming once `limit` samples are held so the upstream sees
/// backpressure instead of unbounded growth.
#[derive(Debug)]
pub struct CollectSink {
    input: Channel<f32>,
    block: usize,
    limit: usize,
    samples: Collected,
}

impl CollectSink {
    /// Collector holding at most `limit` samples, plus the shared view.
    pub fn new(input: Channel<f32>, block: usize, limit: usize) -> (Self, Collected) {
        let samples: Collected = Arc::new(Mutex::new(Vec::with_capacity(limit)));
        let sink = Self {
            input,
            block,
            limit,
            samples: Arc::clone(&samples),
        };
        (sink, samples)
    }
}

impl Node for CollectSink {
    fn name(&self) -> &str {
        "collect_sink"
    }

    fn run(&mut self) -> RunResult {
        if self.input.will_underflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        let mut samples = self.samples.lock();
        if samples.len() + self.block > self.limit {
            return Ok(Progress::Skip);
        }
        self.input
            .read_with(self.block, |r| samples.extend_from_slice(r));
        Ok(Progress::Done)
    }
}

/// Counters kept by a [`LevelMeter`].
#[derive(Debug, Default)]
pub struct MeterStats {
    published: AtomicU32,
    dropped: AtomicU32,
    last_peak: AtomicU32,
}

impl MeterStats {
    /// Peak events accepted by the queue.
    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Relaxed)
    }

    /// Peak events the queue refused.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Most recent peak measured.
    pub fn last_peak(&self) -> f32 {
        f32::from_bits(self.last_peak.load(Ordering::Relaxed))
    }
}

/// Tracks the absolute peak of its input and publishes it as a
/// [`Payload::Float`] on event output 0 once every `every` blocks.
#[derive(Debug)]
pub struct LevelMeter {
    input: Channel<f32>,
    block: usize,
    every: u32,
    counted: u32,
    peak: f32,
    priority: Priority,
    ttl: Ttl,
    output: EventOutput,
    stats: Arc<MeterStats>,
}

impl LevelMeter {
    /// Meter reporting once per block through `output`.
    pub fn new(input: Channel<f32>, block: usize, output: EventOutput) -> Self {
        Self {
            input,
            block,
            every: 1,
            counted: 0,
            peak: 0.0,
            priority: Priority::Normal,
            ttl: Ttl::Forever,
            output,
            stats: Arc::new(MeterStats::default()),
        }
    }

    /// Report once every `blocks` blocks.
    pub fn with_every(mut self, blocks: u32) -> Self {
        self.every = blocks.max(1);
        self
    }

    /// Priority of the peak events.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Lifetime of the peak events.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<MeterStats> {
        Arc::clone(&self.stats)
    }

    fn publish(&mut self) {
        let peak = std::mem::take(&mut self.peak);
        self.stats.last_peak.store(peak.to_bits(), Ordering::Relaxed);
        if !self.output.has_subscribers() {
            return;
        }
        let event = Event::new(EventId::VALUE)
            .with_priority(self.priority)
            .with_ttl(self.ttl)
            .with_payload(Payload::Float(peak));
        if self.output.send_async(event) {
            self.stats.published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Node for LevelMeter {
    fn name(&self) -> &str {
        "level_meter"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN.union(Capabilities::PUBLISH)
    }

    fn run(&mut self) -> RunResult {
        if self.input.will_underflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        let peak = self
            .input
            .read_with(self.block, |r| r.iter().fold(0.0f32, |m, v| m.max(v.abs())));
        self.peak = self.peak.max(peak);
        self.counted += 1;
        if self.counted >= self.every {
            self.counted = 0;
            self.publish();
        }
        Ok(Progress::Done)
    }

    fn subscribe(&mut self, output: Port, destination: Destination) -> bool {
        if output != 0 {
            return false;
        }
        self.output.subscribe(destination);
        true
    }
}
