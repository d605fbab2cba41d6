//! Simulated microsecond clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crate::hal::Clock;

/// Either wall-clock based or manually advanced. Clones share state.
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: Option<Instant>,
    manual: Arc<AtomicU32>,
}

impl SimClock {
    /// Microseconds since construction, wrapping like the firmware counter.
    pub fn wall() -> Self {
        Self {
            origin: Some(Instant::now()),
            manual: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Starts at `start` and only moves on [`advance`](Self::advance).
    pub fn manual(start: u32) -> Self {
        Self {
            origin: None,
            manual: Arc::new(AtomicU32::new(start)),
        }
    }

    /// No effect on a wall clock.
    pub fn advance(&self, micros: u32) {
        // fetch_add wraps on overflow, like the hardware counter.
        self.manual.fetch_add(micros, Ordering::Relaxed);
    }
}

impl Clock for SimClock {
    fn micros(&self) -> u32 {
        match self.origin {
            Some(origin) => origin.elapsed().as_micros() as u32,
            None => self.manual.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_wraps() {
        let clock = SimClock::manual(u32::MAX - 1);
        let handle = clock.clone();
        handle.advance(3);
        assert_eq!(clock.micros(), 1);
    }

    #[test]
    fn wall_clock_is_monotonic_over_short_spans() {
        let clock = SimClock::wall();
        let a = clock.micros();
        let b = clock.micros();
        assert!(b >= a);
    }
}
