//! Event-only node that logs what it receives.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rivulet_core::{Capabilities, Event, Node, Payload, Port, TensorPayload};

/// Counters kept by an [`EventLogger`].
#[derive(Debug, Default)]
pub struct LoggerStats {
    received: AtomicU32,
    values: AtomicU32,
    tensors: AtomicU32,
    last_value: AtomicU32,
}

impl LoggerStats {
    /// Events handled.
    pub fn received(&self) -> u32 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events with an inline value.
    pub fn values(&self) -> u32 {
        self.values.load(Ordering::Relaxed)
    }

    /// Events carrying a tensor.
    pub fn tensors(&self) -> u32 {
        self.tensors.load(Ordering::Relaxed)
    }

    /// Last inline value, or the sum of the last `f32` tensor.
    pub fn last_value(&self) -> f32 {
        f32::from_bits(self.last_value.load(Ordering::Relaxed))
    }
}

/// Logs every event at `info` level under its label.
///
/// `f32` tensors are read under a shared lock and summarized; the handle is
/// dropped on return, releasing this listener's reference.
#[derive(Debug)]
pub struct EventLogger {
    label: String,
    stats: Arc<LoggerStats>,
}

impl EventLogger {
    /// Logger tagging its output with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stats: Arc::new(LoggerStats::default()),
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<LoggerStats> {
        Arc::clone(&self.stats)
    }

    fn record(&self, value: f32) {
        self.stats.last_value.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Node for EventLogger {
    fn name(&self) -> &str {
        "event_logger"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::EVENTS
    }

    fn process_event(&mut self, port: Port, event: Event) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let label = self.label.as_str();
        match event.payload {
            Payload::Empty => tracing::info!(label, port, id = %event.id, "event"),
            Payload::Int(v) => {
                self.stats.values.fetch_add(1, Ordering::Relaxed);
                self.record(v as f32);
                tracing::info!(label, port, id = %event.id, value = v, "event");
            }
            Payload::Float(v) => {
                self.stats.values.fetch_add(1, Ordering::Relaxed);
                self.record(v);
                tracing::info!(label, port, id = %event.id, value = v, "event");
            }
            Payload::Tensor(TensorPayload::F32(handle)) => {
                self.stats.tensors.fetch_add(1, Ordering::Relaxed);
                let shape = handle.shape();
                match handle.lock_shared(|data| data.iter().sum::<f32>()) {
                    Ok(sum) => {
                        self.record(sum);
                        tracing::info!(
                            label,
                            port,
                            id = %event.id,
                            dims = ?shape.dims(),
                            sum,
                            "tensor"
                        );
                    }
                    Err(err) => tracing::warn!(label, port, %err, "tensor unreadable"),
                }
            }
            Payload::Tensor(other) => {
                self.stats.tensors.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    label,
                    port,
                    id = %event.id,
                    element = %other.element(),
                    dims = ?other.shape().dims(),
                    "tensor"
                );
            }
        }
    }
}
