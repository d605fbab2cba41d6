//! Periodic step timer.
//!
//! A dedicated thread calls the tick task once per period, pacing against
//! absolute deadlines so jitter does not accumulate. When a call runs past
//! its deadline the overrun is counted and the schedule restarts from now
//! instead of bursting to catch up.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Timing statistics collected by the timer thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Periods executed.
    pub ticks: u64,
    /// Periods whose task ran past the next deadline.
    pub overruns: u64,
    /// Longest task duration [ns].
    pub max_tick_ns: u64,
}

impl TimerStats {
    #[inline]
    fn record(&mut self, duration: Duration, overrun: bool) {
        self.ticks += 1;
        self.max_tick_ns = self.max_tick_ns.max(duration.as_nanos() as u64);
        if overrun {
            self.overruns += 1;
        }
    }
}

/// Runs a task at a fixed period until stopped or dropped.
#[derive(Debug)]
pub struct StepTimer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<TimerStats>>,
}

impl StepTimer {
    /// Spawn the timer thread.
    pub fn start<F>(period: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("step-timer".to_string())
            .spawn(move || {
                let mut stats = TimerStats::default();
                let mut deadline = Instant::now() + period;

                while !stop_flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    task();
                    let finished = Instant::now();

                    let overrun = finished > deadline;
                    stats.record(finished - started, overrun);

                    if overrun {
                        deadline = finished + period;
                    } else {
                        if let Some(remaining) = deadline.checked_duration_since(finished) {
                            thread::sleep(remaining);
                        }
                        deadline += period;
                    }
                }
                stats
            })?;

        info!(period_us = period.as_micros() as u64, "step timer started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and return its statistics.
    pub fn stop(mut self) -> TimerStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TimerStats {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return TimerStats::default();
        };

        match handle.join() {
            Ok(stats) => {
                debug!(
                    ticks = stats.ticks,
                    overruns = stats.overruns,
                    max_tick_ns = stats.max_tick_ns,
                    "step timer stopped"
                );
                if stats.overruns > 0 {
                    warn!(overruns = stats.overruns, "step timer missed deadlines");
                }
                stats
            }
            Err(_) => {
                warn!("step timer thread panicked");
                TimerStats::default()
            }
        }
    }
}

impl Drop for StepTimer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}
