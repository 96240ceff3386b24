//! Wall-clock tick source for millisecond TTLs.

use std::time::Instant;

use rivulet_core::TickSource;

/// Milliseconds since construction, wrapping at `u32::MAX`.
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    /// Starts counting now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for WallClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}
