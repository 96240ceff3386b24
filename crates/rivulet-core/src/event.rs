//! Events exchanged on the control plane.
//!
//! An [`Event`] carries an identifier, a [`Priority`], a time-to-live and a
//! [`Payload`]. Inline payloads are plain values; tensor payloads move a
//! [`BufferHandle`] so that the queue holds exactly one owner at a time.
//!
//! ```rust
//! use rivulet_core::{Event, EventId, Payload, Priority, Ttl};
//!
//! let ev = Event::new(EventId::VALUE)
//!     .with_priority(Priority::High)
//!     .with_ttl(Ttl::Ticks(5))
//!     .with_payload(Payload::Int(3));
//! assert_eq!(ev.payload.as_int(), Some(3));
//! ```

use core::fmt;

use crate::tensor::{BufferHandle, TensorElement, TensorPayload};

/// Event identifier.
///
/// `0` and `1` are the generic `do` and `value` events; applications number
/// their own events from [`EventId::USER_BASE`] upwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u16);

impl EventId {
    /// Generic "do something" trigger.
    pub const DO: Self = Self(0);
    /// Generic "here is a value" notification.
    pub const VALUE: Self = Self(1);
    /// First identifier available to applications.
    pub const USER_BASE: u16 = 100;

    /// Application-defined event number `n`.
    pub const fn user(n: u16) -> Self {
        Self(Self::USER_BASE + n)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DO => f.write_str("do"),
            Self::VALUE => f.write_str("value"),
            Self(n) if n >= Self::USER_BASE => write!(f, "user({})", n - Self::USER_BASE),
            Self(n) => write!(f, "event({n})"),
        }
    }
}

/// Delivery priority. Higher priorities are always delivered first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    /// Delivered after everything else.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Delivered before everything else.
    High,
}

impl Priority {
    /// Number of priority levels.
    pub const COUNT: usize = 3;

    /// Index of the priority's lane, highest priority first.
    #[inline]
    pub(crate) fn lane(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

/// Time-to-live, measured in ticks of the owning graph's clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// Never expires.
    #[default]
    Forever,
    /// Expires once more than this many ticks have elapsed since enqueue.
    Ticks(u32),
}

impl Ttl {
    /// `true` if an event enqueued at `enqueued` has expired at `now`.
    ///
    /// Tick counters are allowed to wrap.
    #[inline]
    pub fn is_expired(self, enqueued: u32, now: u32) -> bool {
        match self {
            Ttl::Forever => false,
            Ttl::Ticks(ttl) => now.wrapping_sub(enqueued) > ttl,
        }
    }
}

/// Event payload.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    /// No payload.
    #[default]
    Empty,
    /// Small integer value.
    Int(i32),
    /// Small float value.
    Float(f32),
    /// A shared tensor; cloning the payload shares the block.
    Tensor(TensorPayload),
}

impl Payload {
    /// Wraps a typed tensor handle.
    pub fn tensor<T: TensorElement>(handle: BufferHandle<T>) -> Self {
        Payload::Tensor(T::into_payload(handle))
    }

    /// Inline integer value, if any.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Payload::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Inline float value, if any. Integers are widened.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Payload::Float(v) => Some(*v),
            Payload::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// `true` for [`Payload::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Moves the tensor handle out, or hands the payload back unchanged when
    /// it is not a tensor of element type `T`.
    pub fn take_tensor<T: TensorElement>(self) -> Result<BufferHandle<T>, Payload> {
        match self {
            Payload::Tensor(t) => T::from_payload(t).map_err(Payload::Tensor),
            other => Err(other),
        }
    }
}

/// A control-plane event.
#[derive(Clone, Debug)]
pub struct Event {
    /// What the event means.
    pub id: EventId,
    /// Delivery priority.
    pub priority: Priority,
    /// Lifetime once queued.
    pub ttl: Ttl,
    /// Carried data.
    pub payload: Payload,
}

impl Event {
    /// Normal-priority, never-expiring event with no payload.
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            priority: Priority::Normal,
            ttl: Ttl::Forever,
            payload: Payload::Empty,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the time-to-live.
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}
