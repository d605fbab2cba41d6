//! Deterministic simulated rig.
//!
//! Stands in for the stepper drivers, limit switches, angle sensors, clock
//! and serial link so the controller can run hosted, under test and in
//! benchmarks. Every simulated part is cheap to share: physical state
//! lives in atomics behind an `Arc`, and tests keep a handle to inspect
//! or steer it while the controller owns the driver side.
//!
//! The stepper model is kinematic only. Each `run`/`run_speed` call moves
//! one micro-step regardless of speed or acceleration settings, so a test
//! can count ticks instead of waiting on time.

pub mod angle;
pub mod clock;
pub mod rail;
pub mod transport;

pub use angle::{SimAngleSensor, SimAngles, SimBus, SimEncoder};
pub use clock::SimClock;
pub use rail::{SimLimitSwitches, SimRail, SimStepper};
pub use transport::{LoopbackHost, LoopbackTransport, TcpTransport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock ignoring poison. Simulated state stays usable after a test
/// thread panics.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
