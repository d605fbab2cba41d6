//! Motion supervisor: the concurrency core.
//!
//! A fixed-period step tick runs on its own thread (standing in for the
//! timer interrupt) while the main loop handles the host link, homing and
//! the experiment lifecycle. They share two things:
//!
//! - the [`SafetyContext`], split into a [`MainHandle`] and a
//!   [`TickHandle`] so that each field has exactly one writer;
//! - the [`SharedAxes`](crate::axis::SharedAxes), which the tick only
//!   `try_lock`s. A period in which the main loop holds the axes is
//!   skipped, never waited for.

pub mod context;
pub mod tick;
pub mod timer;

pub use context::{MainHandle, RunMode, SafetyContext, SafetyFault, TickHandle};
pub use tick::{StepTick, TickOutcome, step_tick};
pub use timer::{StepTimer, TimerStats};
