//! The fixed-period step tick.
//!
//! Policy per period, for either run mode:
//!
//! | `run_safely` | failed | Action                                   |
//! |--------------|--------|------------------------------------------|
//! | false        | any    | plain step                               |
//! | true         | no     | classifying step, latch on any failure   |
//! | true         | yes    | plain step (keep moving, no re-check)    |
//!
//! The tick never blocks: no I/O, and the axes are only `try_lock`ed.

use std::sync::TryLockError;

use crate::axis::{Axes, SafetyClass, SharedAxes};
use crate::hal::StepperDriver;

use super::context::{RunMode, TickHandle};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Axes stepped (or had nothing to do).
    Stepped,
    /// A carriage left the safe envelope; the fault is now latched.
    Fault { cart_id: u8, class: SafetyClass },
    /// The main loop held the axes; nothing happened this period.
    Skipped,
}

/// Apply the tick policy to already-locked axes.
pub fn step_tick<D: StepperDriver>(axes: &mut Axes<D>, safety: &TickHandle) -> TickOutcome {
    let mode = safety.run_mode();

    if !safety.run_safely() || safety.has_failed() {
        match mode {
            RunMode::Regular => axes.run_all(),
            RunMode::ConstantSpeed => axes.run_speed_all(),
        }
        return TickOutcome::Stepped;
    }

    let failure = match mode {
        RunMode::Regular => axes.run_safe_all(),
        RunMode::ConstantSpeed => axes.run_safe_speed_all(),
    };

    match failure {
        Some((cart_id, class)) => {
            safety.report_fault(cart_id, class);
            TickOutcome::Fault { cart_id, class }
        }
        None => TickOutcome::Stepped,
    }
}

/// The tick task: shared axes plus the tick-side safety handle.
#[derive(Debug)]
pub struct StepTick<D> {
    axes: SharedAxes<D>,
    safety: TickHandle,
}

impl<D: StepperDriver> StepTick<D> {
    pub fn new(axes: SharedAxes<D>, safety: TickHandle) -> Self {
        Self { axes, safety }
    }

    /// Run one period. Skips if the main loop holds the axes.
    pub fn tick(&mut self) -> TickOutcome {
        let mut axes = match self.axes.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return TickOutcome::Skipped,
        };
        step_tick(&mut axes, &self.safety)
    }

    #[inline]
    pub fn safety(&self) -> &TickHandle {
        &self.safety
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AxisController, lock_axes};
    use crate::config::StepperConfig;
    use crate::sim::{SimRail, SimStepper};
    use crate::supervisor::context::{MainHandle, SafetyContext};

    fn rig(position: i32) -> (Axes<SimStepper>, MainHandle, TickHandle) {
        let rail = SimRail::new(20_000);
        let mut axis = AxisController::from_config(1, rail.stepper(1), &StepperConfig::default());
        axis.set_far_limit(10_000);
        axis.set_limit_safety_margin(50);
        axis.set_current_position(position);
        let (main, tick) = SafetyContext::new();
        (Axes::new(axis), main, tick)
    }

    #[test]
    fn unsafe_mode_steps_without_checking() {
        let (mut axes, main, tick) = rig(9_999);
        axes.primary_mut().move_by(5);
        assert_eq!(step_tick(&mut axes, &tick), TickOutcome::Stepped);
        assert_eq!(axes.primary().current_position(), 10_000);
        assert!(!main.has_failed());
    }

    #[test]
    fn safe_mode_latches_high_limit() {
        let (mut axes, main, tick) = rig(9_980);
        main.set_run_safely(true);
        axes.primary_mut().move_to(9_985);

        assert_eq!(
            step_tick(&mut axes, &tick),
            TickOutcome::Fault {
                cart_id: 1,
                class: SafetyClass::HighLimitFail
            }
        );
        assert!(main.has_failed());
        assert_eq!(axes.primary().current_position(), 9_981);

        // Already failed: keep stepping, no second report.
        assert_eq!(step_tick(&mut axes, &tick), TickOutcome::Stepped);
        assert_eq!(axes.primary().current_position(), 9_982);
        assert_eq!(main.fault_episodes(), 1);
    }

    #[test]
    fn safe_mode_inside_envelope_stays_clear() {
        let (mut axes, main, tick) = rig(500);
        main.set_run_safely(true);
        axes.primary_mut().move_to(510);
        for _ in 0..20 {
            assert_eq!(step_tick(&mut axes, &tick), TickOutcome::Stepped);
        }
        assert_eq!(axes.primary().current_position(), 510);
        assert!(!main.has_failed());
    }

    #[test]
    fn constant_speed_mode_uses_speed_stepping() {
        let (mut axes, main, tick) = rig(52);
        main.set_run_safely(true);
        main.set_run_mode(RunMode::ConstantSpeed);
        axes.primary_mut().set_speed(-1_000.0);

        assert_eq!(step_tick(&mut axes, &tick), TickOutcome::Stepped);
        assert_eq!(
            step_tick(&mut axes, &tick),
            TickOutcome::Fault {
                cart_id: 1,
                class: SafetyClass::LowLimitFail
            }
        );
        assert_eq!(main.fault().map(|f| f.class), Some(SafetyClass::LowLimitFail));
    }

    #[test]
    fn tick_skips_while_main_loop_holds_axes() {
        let (axes, _main, tick) = rig(0);
        let shared = axes.into_shared();
        let mut task = StepTick::new(shared.clone(), tick);

        lock_axes(&shared).primary_mut().move_by(3);
        {
            let _held = lock_axes(&shared);
            assert_eq!(task.tick(), TickOutcome::Skipped);
        }
        assert_eq!(task.tick(), TickOutcome::Stepped);
        assert_eq!(lock_axes(&shared).primary().current_position(), 1);
    }
}
