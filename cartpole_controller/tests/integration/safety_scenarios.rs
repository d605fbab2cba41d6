//! Step tick and fault path: envelope checks, latching and re-arming.

use cartpole_common::protocol::{
    Command, ExperimentInfo, FailureMode, Report, SetOperation, Setpoint,
};
use cartpole_controller::axis::{SafetyClass, lock_axes};
use cartpole_controller::experiment::ExperimentState;
use cartpole_controller::supervisor::{RunMode, TickOutcome};

use super::{Rig, TRACK};

/// Enough ticks to cross half the track.
const TICK_BUDGET: usize = TRACK as usize;

fn velocity(cart_id: u8, value: i16) -> Command {
    Command::SetVelocity(Setpoint {
        operation: SetOperation::Equal,
        cart_id,
        value,
    })
}

fn fault_reports(cart_id: u8, mode: FailureMode) -> Vec<Report> {
    vec![
        Report::SoftLimitReached,
        Report::ExperimentDone {
            cart_id,
            failure_mode: mode,
        },
        Report::ExperimentInfo(ExperimentInfo::FailureMode { cart_id, mode }),
    ]
}

#[test]
fn unhomed_rig_steps_without_checks() {
    let mut rig = Rig::new();
    rig.request(&velocity(1, -1000));
    assert!(!rig.controller.safety().run_safely());
    assert_eq!(rig.controller.safety().run_mode(), RunMode::ConstantSpeed);

    assert_eq!(rig.tick_until_fault(100), None);
    assert_eq!(rig.position(1), -100);
    assert!(!rig.controller.safety().has_failed());
}

#[test]
fn homed_rig_inside_envelope_is_safe() {
    let mut rig = Rig::new();
    rig.home();
    assert!(rig.controller.safety().run_safely());

    rig.request(&Command::SetPosition(Setpoint {
        operation: SetOperation::Equal,
        cart_id: 1,
        value: 500,
    }));
    assert_eq!(rig.tick.tick(), TickOutcome::Stepped);
    assert!(!rig.controller.safety().has_failed());
}

#[test]
fn crossing_the_far_margin_latches_and_halts() {
    let mut rig = Rig::new();
    rig.home();
    rig.request(&velocity(1, 1000));

    assert_eq!(
        rig.tick_until_fault(TICK_BUDGET),
        Some(TickOutcome::Fault {
            cart_id: 1,
            class: SafetyClass::HighLimitFail
        })
    );
    let (far_limit, margin) = {
        let axes = lock_axes(rig.controller.axes());
        (axes.primary().far_limit(), axes.primary().safety_margin())
    };
    assert_eq!(rig.position(1), far_limit - margin);

    assert_eq!(rig.poll(), fault_reports(1, FailureMode::PositionRight));
    assert_eq!(rig.controller.experiment().state(), ExperimentState::Idle);
    assert_eq!(rig.controller.safety().run_mode(), RunMode::Regular);
    assert_eq!(lock_axes(rig.controller.axes()).primary().speed(), 0.0);

    // Latched: the tick keeps running, the halted cart stays put and the
    // host hears about the fault once.
    let halted = rig.position(1);
    assert_eq!(rig.tick_until_fault(100), None);
    assert_eq!(rig.position(1), halted);
    assert!(rig.controller.safety().has_failed());
    assert!(rig.poll().is_empty());
    assert_eq!(rig.controller.safety().fault_episodes(), 1);
}

#[test]
fn crossing_the_near_margin_reports_left() {
    let mut rig = Rig::new();
    rig.home();
    rig.request(&velocity(1, -1000));

    assert_eq!(
        rig.tick_until_fault(TICK_BUDGET),
        Some(TickOutcome::Fault {
            cart_id: 1,
            class: SafetyClass::LowLimitFail
        })
    );
    assert_eq!(rig.poll(), fault_reports(1, FailureMode::PositionLeft));
}

#[test]
fn fault_stays_latched_until_rehome() {
    let mut rig = Rig::new();
    rig.home();
    rig.request(&velocity(1, 1000));
    rig.tick_until_fault(TICK_BUDGET);
    rig.poll();
    assert!(rig.controller.safety().has_failed());

    // Commands still work, the latch does not move.
    rig.request(&Command::Ping { timestamp: 3 });
    assert!(rig.controller.safety().has_failed());

    assert!(rig.request(&Command::FindLimits).is_empty());
    assert!(rig.controller.homing().is_active());
    assert!(!rig.controller.safety().run_safely());
    assert_eq!(rig.controller.safety().run_mode(), RunMode::Regular);

    let reports = rig.finish_sweep();
    assert_eq!(reports.last(), Some(&Report::FindLimits));
    assert!(!rig.controller.safety().has_failed());
    rig.poll();
    assert!(rig.controller.safety().run_safely());
    assert_eq!(rig.controller.safety().run_mode(), RunMode::ConstantSpeed);

    // A fresh episode goes through the fault path again.
    rig.request(&velocity(1, -1000));
    assert!(rig.tick_until_fault(TICK_BUDGET).is_some());
    assert_eq!(rig.poll(), fault_reports(1, FailureMode::PositionLeft));
    assert_eq!(rig.controller.safety().fault_episodes(), 2);
}

#[test]
fn observations_continue_after_a_fault() {
    let mut rig = Rig::new();
    rig.home();
    rig.request(&Command::ExperimentStart { timestamp_us: 0 });
    rig.request(&velocity(1, 1000));
    rig.tick_until_fault(TICK_BUDGET);

    rig.clock.advance(4_000);
    let reports = rig.poll();
    assert!(reports.starts_with(&fault_reports(1, FailureMode::PositionRight)));
    assert!(matches!(reports.last(), Some(Report::Observation(_))));

    rig.clock.advance(4_000);
    assert!(matches!(rig.poll().as_slice(), [Report::Observation(_)]));
}

#[test]
fn fault_without_experiment_sends_no_observations() {
    let mut rig = Rig::new();
    rig.home();
    rig.request(&velocity(1, 1000));
    rig.tick_until_fault(TICK_BUDGET);
    assert_eq!(rig.poll(), fault_reports(1, FailureMode::PositionRight));

    rig.clock.advance(8_000);
    assert!(rig.poll().is_empty());
    assert_eq!(rig.controller.experiment().state(), ExperimentState::Idle);
}

#[test]
fn second_cart_faults_are_attributed() {
    let mut rig = Rig::two_carts();
    rig.home();
    assert_eq!(rig.tick.tick(), TickOutcome::Stepped);

    rig.request(&velocity(2, -1000));
    assert_eq!(
        rig.tick_until_fault(TICK_BUDGET),
        Some(TickOutcome::Fault {
            cart_id: 2,
            class: SafetyClass::LowLimitFail
        })
    );
    assert_eq!(rig.poll(), fault_reports(2, FailureMode::PositionLeft));
}
