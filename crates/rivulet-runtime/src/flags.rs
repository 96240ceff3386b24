//! Event flags: a word of bits that threads block on.
//!
//! Interrupt handlers and driver callbacks post bits; exactly one thread
//! waits on each bit and consumes it. Waiting clears only the bits that
//! matched the waiter's mask, so several threads can share one flag word.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rivulet_core::QueueWaker;

/// Event-queue work is pending.
pub const EVENTS: u32 = 1 << 0;
/// Switch graphs (to the requested one, or the next in registration order).
pub const SWITCH: u32 = 1 << 1;
/// Shut the runtime down.
pub const STOP: u32 = 1 << 2;
/// Start scheduling the active graph.
pub const RUN: u32 = 1 << 3;
/// Leave the data-flow thread.
pub const QUIT: u32 = 1 << 4;
/// The scheduler returned.
pub const IDLE: u32 = 1 << 5;

/// A set of bits with blocking waits.
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: Mutex<u32>,
    cond: Condvar,
}

impl EventFlags {
    /// All bits clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `bits` and wakes every waiter.
    pub fn post(&self, bits: u32) {
        let mut word = self.bits.lock();
        *word |= bits;
        self.cond.notify_all();
    }

    /// Blocks until any bit of `mask` is set, then clears and returns the
    /// matching bits.
    pub fn wait(&self, mask: u32) -> u32 {
        let mut word = self.bits.lock();
        while *word & mask == 0 {
            self.cond.wait(&mut word);
        }
        let hit = *word & mask;
        *word &= !hit;
        hit
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning 0.
    pub fn wait_timeout(&self, mask: u32, timeout: Duration) -> u32 {
        let mut word = self.bits.lock();
        if *word & mask == 0 {
            // A spurious or unrelated wake just falls through to the check.
            let _ = self.cond.wait_for(&mut word, timeout);
        }
        let hit = *word & mask;
        *word &= !hit;
        hit
    }

    /// Clears and returns the bits of `mask` that are set, without blocking.
    pub fn poll(&self, mask: u32) -> u32 {
        let mut word = self.bits.lock();
        let hit = *word & mask;
        *word &= !hit;
        hit
    }

    /// Bits currently set.
    pub fn peek(&self) -> u32 {
        *self.bits.lock()
    }

    /// Clears `bits`.
    pub fn clear(&self, bits: u32) {
        *self.bits.lock() &= !bits;
    }
}

impl QueueWaker for EventFlags {
    fn wake(&self) {
        self.post(EVENTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_poll_clears_only_mask() {
        let flags = EventFlags::new();
        flags.post(SWITCH | STOP);
        assert_eq!(flags.poll(STOP), STOP);
        assert_eq!(flags.peek(), SWITCH);
        assert_eq!(flags.poll(STOP), 0);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let flags = EventFlags::new();
        assert_eq!(flags.wait_timeout(EVENTS, Duration::from_millis(5)), 0);
    }

    #[test]
    fn test_wait_wakes_on_post_from_other_thread() {
        let flags = Arc::new(EventFlags::new());
        let poster = flags.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            poster.post(RUN | EVENTS);
        });
        assert_eq!(flags.wait(RUN), RUN);
        t.join().unwrap();
        assert_eq!(flags.peek(), EVENTS);
    }

    #[test]
    fn test_queue_waker_posts_events_bit() {
        let flags = EventFlags::new();
        flags.wake();
        assert_eq!(flags.poll(EVENTS), EVENTS);
    }
}
