//! Publishes channel blocks as shared tensors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rivulet_core::{
    Block, BlockPool, BufferHandle, Capabilities, Channel, Destination, Event, EventId,
    EventOutput, Node, Payload, Port, Priority, Progress, RunResult, TensorPools, Ttl,
};

/// Counters kept by a [`TensorPublisher`].
#[derive(Debug, Default)]
pub struct PublisherStats {
    published: AtomicU32,
    dropped: AtomicU32,
    starved: AtomicU32,
}

impl PublisherStats {
    /// Tensors accepted by the queue.
    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Relaxed)
    }

    /// Tensors built but refused by the queue or the descriptor pools.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Runs skipped because every block was still held by a listener.
    pub fn starved(&self) -> u32 {
        self.starved.load(Ordering::Relaxed)
    }
}

/// Copies one block in `every` from its input into a pooled tensor and
/// sends it asynchronously on event output 0.
///
/// Blocks come from a private [`BlockPool`] and go back there when the last
/// listener drops its handle. When the pool is empty the publisher skips
/// without consuming, which backs pressure up to its producer.
#[derive(Debug)]
pub struct TensorPublisher {
    input: Channel<f32>,
    block: usize,
    every: u32,
    counted: u32,
    priority: Priority,
    ttl: Ttl,
    blocks: Arc<BlockPool<f32>>,
    tensors: TensorPools,
    output: EventOutput,
    stats: Arc<PublisherStats>,
}

impl TensorPublisher {
    /// Publisher owning `pool_blocks` blocks of `block` samples.
    pub fn new(
        input: Channel<f32>,
        block: usize,
        pool_blocks: usize,
        tensors: TensorPools,
        output: EventOutput,
    ) -> Self {
        Self {
            input,
            block,
            every: 1,
            counted: 0,
            priority: Priority::Normal,
            ttl: Ttl::Forever,
            blocks: BlockPool::new(pool_blocks, block),
            tensors,
            output,
            stats: Arc::new(PublisherStats::default()),
        }
    }

    /// Publish one block in `blocks`; the others are drained.
    pub fn with_every(mut self, blocks: u32) -> Self {
        self.every = blocks.max(1);
        self
    }

    /// Priority of the tensor events.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Lifetime of the tensor events.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<PublisherStats> {
        Arc::clone(&self.stats)
    }

    /// Blocks not currently lent to a tensor.
    pub fn free_blocks(&self) -> usize {
        self.blocks.available()
    }

    fn publish(&self, data: Block<f32>) {
        let handle = match BufferHandle::create_with(&self.tensors, 1, &[self.block], data) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::debug!(%err, "tensor not created");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let event = Event::new(EventId::VALUE)
            .with_priority(self.priority)
            .with_ttl(self.ttl)
            .with_payload(Payload::tensor(handle));
        if self.output.send_async(event) {
            self.stats.published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Node for TensorPublisher {
    fn name(&self) -> &str {
        "tensor_publisher"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN.union(Capabilities::PUBLISH)
    }

    fn run(&mut self) -> RunResult {
        if self.input.will_underflow_with(self.block) {
            return Ok(Progress::Skip);
        }
        // saturates at `every` so a graph without listeners can run forever
        self.counted = self.counted.saturating_add(1).min(self.every);
        let due = self.counted >= self.every && self.output.has_subscribers();
        if !due {
            self.input.read_with(self.block, |_| ());
            return Ok(Progress::Done);
        }
        let Some(mut data) = Block::from_pool(&self.blocks) else {
            self.stats.starved.fetch_add(1, Ordering::Relaxed);
            return Ok(Progress::Skip);
        };
        self.counted = 0;
        self.input
            .read_with(self.block, |r| data.copy_from_slice(r));
        self.publish(data);
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
