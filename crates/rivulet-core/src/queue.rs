//! Priority/TTL event queue and the producer-side [`EventOutput`].
//!
//! Each graph owns one [`EventQueue`]. Producers push `(Destination, Event)`
//! pairs; the event-processing thread repeatedly pops the highest-priority,
//! oldest event that has not expired and calls the destination's handler.
//! Every queued event holds one slot of the runtime's event pool, so a full
//! pool is reported to the producer instead of growing the queue.
//!
//! The queue has a gate. A paused graph's queue is closed: pushes are refused
//! and the events still pending at the time of the close are discarded, which
//! releases any tensors they carried. Teardown closes the gate for good.
//!
//! Time-to-live is measured against a [`TickSource`], by default the graph's
//! [`CycleClock`] which the scheduler advances once per completed cycle.

#[cfg(not(feature = "std"))]
use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
#[cfg(feature = "std")]
use std::{collections::VecDeque, sync::Arc};

use crate::event::{Event, Priority};
use crate::node::Destination;
use crate::pool::{FixedPool, PoolSlot};
use crate::sync::Mutex;

/// Monotonic tick counter used for TTL.
pub trait TickSource: Send + Sync {
    /// Current tick. Allowed to wrap.
    fn now(&self) -> u32;
}

/// Tick source advanced by the scheduler, one tick per completed cycle.
#[derive(Debug, Default)]
pub struct CycleClock {
    ticks: AtomicU32,
}

impl CycleClock {
    /// Clock at tick zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by one tick and returns the new value.
    pub fn advance(&self) -> u32 {
        self.ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

impl TickSource for CycleClock {
    fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }
}

/// Wakes whatever thread drains the queue.
pub trait QueueWaker: Send + Sync {
    /// Called after an event was queued.
    fn wake(&self);
}

/// Counters readable at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Events handed to their destination.
    pub delivered: u32,
    /// Events dropped because their TTL elapsed.
    pub expired: u32,
    /// Pushes refused (pool exhausted or queue closed).
    pub rejected: u32,
    /// Events dropped on close/teardown or because the target was gone.
    pub discarded: u32,
}

/// Why a push was refused. The event is handed back.
pub enum PushError {
    /// The queue is closed (paused graph or torn down).
    Closed(Event),
    /// The event pool is exhausted.
    Exhausted(Event),
}

impl PushError {
    /// Recovers the refused event.
    pub fn into_event(self) -> Event {
        match self {
            PushError::Closed(ev) | PushError::Exhausted(ev) => ev,
        }
    }
}

impl fmt::Debug for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Closed(ev) => write!(f, "Closed({})", ev.id),
            PushError::Exhausted(ev) => write!(f, "Exhausted({})", ev.id),
        }
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Closed(ev) => write!(f, "event {} refused: queue closed", ev.id),
            PushError::Exhausted(ev) => write!(f, "event {} refused: event pool exhausted", ev.id),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PushError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    Open,
    Closed,
    TornDown,
}

struct Queued {
    destination: Destination,
    event: Event,
    enqueued: u32,
    _slot: PoolSlot,
}

struct Lanes {
    lanes: [VecDeque<Queued>; Priority::COUNT],
    gate: Gate,
    waker: Option<Arc<dyn QueueWaker>>,
}

impl Lanes {
    fn pop_front(&mut self) -> Option<Queued> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }

    fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }
}

/// Mailbox routing events to nodes of one graph.
pub struct EventQueue {
    lanes: Mutex<Lanes>,
    pool: Arc<FixedPool>,
    clock: Arc<dyn TickSource>,
    delivered: AtomicU32,
    expired: AtomicU32,
    rejected: AtomicU32,
    discarded: AtomicU32,
}

impl EventQueue {
    /// Creates an open queue drawing slots from `pool`.
    ///
    /// Lane storage is sized from the pool capacity up front.
    pub fn new(pool: Arc<FixedPool>, clock: Arc<dyn TickSource>) -> Arc<Self> {
        let cap = pool.capacity();
        Arc::new(Self {
            lanes: Mutex::new(Lanes {
                lanes: [
                    VecDeque::with_capacity(cap),
                    VecDeque::with_capacity(cap),
                    VecDeque::with_capacity(cap),
                ],
                gate: Gate::Open,
                waker: None,
            }),
            pool,
            clock,
            delivered: AtomicU32::new(0),
            expired: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
            discarded: AtomicU32::new(0),
        })
    }

    /// Installs the waker called after every successful push.
    pub fn set_waker(&self, waker: Arc<dyn QueueWaker>) {
        self.lanes.lock().waker = Some(waker);
    }

    /// The tick source TTLs are measured against.
    pub fn clock(&self) -> &Arc<dyn TickSource> {
        &self.clock
    }

    /// The event pool backing this queue.
    pub fn pool(&self) -> &Arc<FixedPool> {
        &self.pool
    }

    /// Enqueues `event` for `destination`.
    ///
    /// Ordered by priority, then insertion. Fails when the event pool is
    /// exhausted or the queue is closed; the event is handed back.
    pub fn push(&self, destination: Destination, event: Event) -> Result<(), PushError> {
        let Some(slot) = self.pool.try_acquire() else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PushError::Exhausted(event));
        };
        let waker = {
            let mut lanes = self.lanes.lock();
            if lanes.gate != Gate::Open {
                drop(lanes);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(PushError::Closed(event));
            }
            let lane = event.priority.lane();
            lanes.lanes[lane].push_back(Queued {
                destination,
                event,
                enqueued: self.clock.now(),
                _slot: slot,
            });
            lanes.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Enqueues one copy of `event` per destination, or none at all.
    ///
    /// Pool slots for every destination are reserved before anything is
    /// queued. Tensor payloads are shared, not copied.
    pub fn push_all(&self, destinations: &[Destination], event: Event) -> Result<(), PushError> {
        let Some((last, rest)) = destinations.split_last() else {
            return Ok(());
        };
        let Some(mut reservation) = self.pool.try_reserve(destinations.len()) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PushError::Exhausted(event));
        };
        let waker = {
            let mut lanes = self.lanes.lock();
            if lanes.gate != Gate::Open {
                drop(lanes);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(PushError::Closed(event));
            }
            let lane = event.priority.lane();
            let now = self.clock.now();
            let mut enqueue = |destination: &Destination, event: Event| {
                if let Some(slot) = reservation.take_one() {
                    lanes.lanes[lane].push_back(Queued {
                        destination: destination.clone(),
                        event,
                        enqueued: now,
                        _slot: slot,
                    });
                }
            };
            for destination in rest {
                enqueue(destination, event.clone());
            }
            enqueue(last, event);
            lanes.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Pops the next deliverable event, dropping expired ones on the way.
    pub fn pop_ready(&self) -> Option<(Destination, Event)> {
        loop {
            let queued = self.lanes.lock().pop_front()?;
            if queued.event.ttl.is_expired(queued.enqueued, self.clock.now()) {
                self.expired.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    event = %queued.event.id,
                    target = %queued.destination.node_id(),
                    "event expired"
                );
                continue;
            }
            let Queued {
                destination, event, ..
            } = queued;
            return Some((destination, event));
        }
    }

    /// Delivers one event on the calling thread. Returns `false` when nothing
    /// was ready.
    pub fn dispatch_one(&self) -> bool {
        let Some((destination, event)) = self.pop_ready() else {
            return false;
        };
        if destination.deliver(event) {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Delivers everything currently deliverable. Returns the count handled.
    pub fn dispatch_pending(&self) -> usize {
        let mut n = 0;
        while self.dispatch_one() {
            n += 1;
        }
        n
    }

    /// Accepts pushes again. Has no effect after teardown.
    pub fn open(&self) {
        let mut lanes = self.lanes.lock();
        if lanes.gate == Gate::Closed {
            lanes.gate = Gate::Open;
        }
    }

    /// Refuses further pushes and discards pending events.
    ///
    /// Returns the number of events discarded.
    pub fn close(&self) -> usize {
        {
            let mut lanes = self.lanes.lock();
            if lanes.gate == Gate::Open {
                lanes.gate = Gate::Closed;
            }
        }
        self.discard_pending()
    }

    /// Closes the queue permanently and destroys everything still queued.
    pub fn teardown(&self) -> usize {
        self.lanes.lock().gate = Gate::TornDown;
        self.discard_pending()
    }

    fn discard_pending(&self) -> usize {
        let mut n = 0;
        // one at a time so tensor release callbacks run outside the lock
        while let Some(queued) = self.lanes.lock().pop_front() {
            drop(queued);
            n += 1;
        }
        self.discarded.fetch_add(n as u32, Ordering::Relaxed);
        n
    }

    /// `true` while pushes are accepted.
    pub fn is_open(&self) -> bool {
        self.lanes.lock().gate == Gate::Open
    }

    /// `true` once [`teardown`](Self::teardown) ran.
    pub fn is_torn_down(&self) -> bool {
        self.lanes.lock().gate == Gate::TornDown
    }

    /// Events currently queued, expired ones included.
    pub fn len(&self) -> usize {
        self.lanes.lock().len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("open", &self.is_open())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// One event output of a producer node.
///
/// Destinations are registered once during graph construction through the
/// node's `subscribe`, which typically forwards here.
#[derive(Debug)]
pub struct EventOutput {
    queue: Arc<EventQueue>,
    subscribers: Vec<Destination>,
}

impl EventOutput {
    /// Output publishing through `queue`.
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            subscribers: Vec::new(),
        }
    }

    /// Adds a listener.
    pub fn subscribe(&mut self, destination: Destination) {
        self.subscribers.push(destination);
    }

    /// Registered listeners.
    pub fn subscribers(&self) -> &[Destination] {
        &self.subscribers
    }

    /// `true` if anyone listens.
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Delivers `event` to every listener on the calling thread, ignoring its
    /// TTL. Returns how many listeners received it.
    ///
    /// A listener must not synchronously send back to the caller: the
    /// caller's node lock is held, so that cycle deadlocks.
    pub fn send_sync(&self, event: Event) -> usize {
        let Some((last, rest)) = self.subscribers.split_last() else {
            return 0;
        };
        let mut delivered = 0;
        for destination in rest {
            delivered += usize::from(destination.deliver(event.clone()));
        }
        delivered + usize::from(last.deliver(event))
    }

    /// Queues `event` for every listener. Returns `false` if the event pool
    /// cannot hold a copy for each of them, or the queue is closed; nothing
    /// is queued in that case and the caller decides whether to retry.
    pub fn send_async(&self, event: Event) -> bool {
        match self.queue.push_all(&self.subscribers, event) {
            Ok(()) => true,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%_err, "send_async refused");
                false
            }
        }
    }
}
