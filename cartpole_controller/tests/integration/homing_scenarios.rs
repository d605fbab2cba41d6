//! Limit finding, limit check and jiggle driven over the host link.

use cartpole_common::protocol::{Command, ExperimentInfo, Report};
use cartpole_controller::axis::lock_axes;
use cartpole_controller::homing::{CheckPhase, FindPhase, Sweep};
use cartpole_controller::supervisor::RunMode;

use super::{Rig, TRACK};

fn infos(reports: &[Report]) -> Vec<&str> {
    reports
        .iter()
        .filter_map(|report| match report {
            Report::Info(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn first_find_limits_measures_the_track() {
    let mut rig = Rig::new();
    assert!(!rig.controller.safety().run_safely());

    let reports = rig.home();

    assert_eq!(rig.controller.homing().sweep(), Sweep::Finding(FindPhase::Done));
    assert_eq!(rig.controller.homing().transitions(), 9);
    assert_eq!(rig.controller.homing().calibration().length_steps, TRACK);
    assert!(reports.contains(&Report::ExperimentInfo(ExperimentInfo::TrackLengthSteps {
        cart_id: 0,
        steps: TRACK
    })));
    assert_eq!(
        infos(&reports),
        vec![
            "LimitFinder: LEFT LIMIT HIT [fast]",
            "LimitFinder: LEFT LIMIT RETRACTED",
            "LimitFinder: LEFT LIMIT HIT [slow]",
            "LimitFinder: LEFT LIMIT SET",
            "LimitFinder: RIGHT LIMIT HIT [fast]",
            "LimitFinder: RIGHT LIMIT RETRACTED",
            "LimitFinder: RIGHT LIMIT HIT [slow]",
            "LimitFinder: NOW DONE",
        ]
    );

    let position = rig.position(1);
    assert!((position - TRACK / 2).abs() <= 1);
    assert_eq!(rig.rail.physical_position(1), position);
    assert_eq!(lock_axes(rig.controller.axes()).primary().far_limit(), TRACK);

    assert!(rig.controller.safety().run_safely());
    assert_eq!(rig.controller.safety().run_mode(), RunMode::ConstantSpeed);
}

#[test]
fn later_find_limits_runs_across_passes() {
    let mut rig = Rig::new();
    rig.home();

    assert!(rig.request(&Command::FindLimits).is_empty());
    assert_eq!(rig.controller.homing().sweep(), Sweep::Finding(FindPhase::Init));
    assert!(!rig.controller.safety().run_safely());

    let reports = rig.finish_sweep();
    assert_eq!(reports.last(), Some(&Report::FindLimits));
    assert_eq!(rig.controller.homing().transitions(), 9);
    assert!(rig.controller.safety().run_safely());
}

#[test]
fn limit_check_needs_limit_finding_first() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.request(&Command::CheckLimit),
        vec![Report::Error("LimitChecker: limits have not been found yet".into())]
    );
    assert_eq!(rig.controller.homing().sweep(), Sweep::Idle);
}

#[test]
fn limit_check_reports_belt_slip() {
    let mut rig = Rig::new();
    rig.home();

    let physical = rig.rail.physical_position(1);
    rig.rail.set_physical_position(1, physical + 40);

    assert!(rig.request(&Command::CheckLimit).is_empty());
    assert_eq!(rig.controller.homing().sweep(), Sweep::Checking(CheckPhase::Init));

    let reports = rig.finish_sweep();
    assert_eq!(rig.controller.homing().sweep(), Sweep::Checking(CheckPhase::Done));
    assert_eq!(rig.controller.homing().transitions(), 7);
    assert!(reports.contains(&Report::ExperimentInfo(ExperimentInfo::PositionDrift {
        cart_id: 1,
        steps: -40
    })));
    assert_eq!(reports.last(), Some(&Report::CheckLimit));
    assert_eq!(rig.controller.homing().calibration().drift_steps, -40);

    // Re-zeroed at the switch, envelope kept.
    assert_eq!(rig.rail.physical_position(1), rig.position(1));
    assert_eq!(lock_axes(rig.controller.axes()).primary().far_limit(), TRACK);
    assert!(rig.controller.safety().run_safely());
}

#[test]
fn jiggle_returns_to_start() {
    let mut rig = Rig::new();
    rig.home();
    let before = rig.position(1);

    assert_eq!(rig.request(&Command::DoJiggle), vec![Report::DoJiggle]);
    assert_eq!(rig.position(1), before);
    assert_eq!(rig.controller.safety().run_mode(), RunMode::ConstantSpeed);
}

#[test]
fn two_carts_share_the_measured_envelope() {
    let mut rig = Rig::two_carts();
    rig.home();

    let axes = lock_axes(rig.controller.axes());
    let primary = axes.get(1).unwrap();
    let secondary = axes.get(2).unwrap();
    assert_eq!(primary.far_limit(), TRACK);
    assert_eq!(secondary.far_limit(), TRACK);
    assert_eq!(secondary.current_position(), primary.current_position());
}
