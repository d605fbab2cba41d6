//! Host link scenarios: banner, request/response packets and addressing.

use std::io::Cursor;

use cartpole_common::consts::INITIAL_OUTPUT_STOP_MARKER;
use cartpole_common::protocol::{
    Command, FailureMode, Observation, PacketId, Report, SetOperation, Setpoint,
};
use cartpole_controller::axis::lock_axes;
use cartpole_controller::experiment::ExperimentState;

use super::{Rig, START_US};

fn setpoint(operation: SetOperation, cart_id: u8, value: i16) -> Setpoint {
    Setpoint {
        operation,
        cart_id,
        value,
    }
}

#[test]
fn banner_ends_with_raw_marker() {
    let mut rig = Rig::new();
    rig.controller.announce().unwrap();

    let output = rig.host.take_output();
    assert!(output.ends_with(INITIAL_OUTPUT_STOP_MARKER));

    let packets = &output[..output.len() - INITIAL_OUTPUT_STOP_MARKER.len()];
    let mut cursor = Cursor::new(packets);
    let mut reports = Vec::new();
    while (cursor.position() as usize) < packets.len() {
        reports.push(Report::read_from(&mut cursor).unwrap());
    }

    assert_eq!(
        reports,
        vec![
            Report::Info("=== Cartpole Controller ===".into()),
            Report::Debug("STEPPER_MICROSTEPS: 8".into()),
            Report::Debug("STEPPER_STEPS_PER_ROTATION: 200".into()),
            Report::Debug("STEPPER_DISTANCE_PER_ROTATION: 40.840706".into()),
            Report::Debug("CARRIAGES: 1".into()),
            Report::Debug("Config finished".into()),
            Report::Debug("Starting loop".into()),
        ]
    );
}

#[test]
fn idle_pass_sends_nothing() {
    let mut rig = Rig::new();
    assert!(rig.poll().is_empty());
    assert_eq!(rig.controller.packets_sent(), 0);
}

#[test]
fn ping_is_answered_with_same_timestamp() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.request(&Command::Ping { timestamp: 100 }),
        vec![Report::Pong { timestamp: 100 }]
    );
}

#[test]
fn unknown_id_yields_one_debug_packet() {
    let mut rig = Rig::new();
    rig.host.send_bytes(&[0x99]);

    assert_eq!(
        rig.poll(),
        vec![Report::Debug("Received unknown packet with ID: 0x99".into())]
    );
    assert_eq!(rig.host.pending_inbound(), 0);
}

#[test]
fn commands_are_handled_one_per_pass() {
    let mut rig = Rig::new();
    rig.host.send(&Command::Ping { timestamp: 1 });
    rig.host.send(&Command::Ping { timestamp: 2 });

    assert_eq!(rig.poll(), vec![Report::Pong { timestamp: 1 }]);
    assert_eq!(rig.poll(), vec![Report::Pong { timestamp: 2 }]);
    assert!(rig.poll().is_empty());
}

#[test]
fn set_position_updates_target() {
    let mut rig = Rig::new();
    rig.home();
    let parked = rig.position(1);

    assert!(
        rig.request(&Command::SetPosition(setpoint(SetOperation::Equal, 1, 500)))
            .is_empty()
    );
    assert_eq!(lock_axes(rig.controller.axes()).primary().target_position(), 500);

    rig.request(&Command::SetPosition(setpoint(SetOperation::Add, 1, 20)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().target_position(), parked + 20);

    rig.request(&Command::SetPosition(setpoint(SetOperation::Subtract, 1, 20)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().target_position(), parked);

    rig.request(&Command::SetPosition(setpoint(SetOperation::Nul, 1, 1234)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().target_position(), parked);
}

#[test]
fn velocity_setpoints_respect_ceiling() {
    let mut rig = Rig::new();

    rig.request(&Command::SetVelocity(setpoint(SetOperation::Equal, 1, 300)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().speed(), 300.0);

    rig.request(&Command::SetVelocity(setpoint(SetOperation::Subtract, 1, 1000)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().speed(), 0.0);

    rig.request(&Command::SetMaxVelocity(setpoint(SetOperation::Equal, 1, 2500)));
    assert_eq!(lock_axes(rig.controller.axes()).primary().max_speed(), 2500.0);
}

#[test]
fn unconfigured_cart_is_reported_as_error() {
    let mut rig = Rig::new();

    assert_eq!(
        rig.request(&Command::SetPosition(setpoint(SetOperation::Equal, 2, 10))),
        vec![Report::Error("Invalid cart id: 2".into())]
    );

    // The session carries on.
    assert_eq!(
        rig.request(&Command::Ping { timestamp: 5 }),
        vec![Report::Pong { timestamp: 5 }]
    );
}

#[test]
fn second_cart_is_addressable_when_configured() {
    let mut rig = Rig::two_carts();
    assert!(
        rig.request(&Command::SetPosition(setpoint(SetOperation::Equal, 2, 10)))
            .is_empty()
    );
    let axes = lock_axes(rig.controller.axes());
    assert_eq!(axes.get(2).unwrap().target_position(), 10);
}

#[test]
fn bad_operation_byte_keeps_stream_in_sync() {
    let mut rig = Rig::new();
    rig.host
        .send_bytes(&[PacketId::SetPosition.as_u8(), b'*', 1, 0x10, 0x00]);
    rig.host.send(&Command::Ping { timestamp: 9 });

    assert_eq!(
        rig.poll(),
        vec![Report::Error(
            "Protocol error: Invalid set operation: 0x2a".into()
        )]
    );
    assert_eq!(rig.poll(), vec![Report::Pong { timestamp: 9 }]);
}

#[test]
fn oversized_message_body_is_never_dispatched() {
    let mut rig = Rig::new();
    let len: u32 = 5000;
    let mut body = vec![b' '; len as usize];
    body[..5].copy_from_slice(&[PacketId::SetPosition.as_u8(), b'=', 1, 0xF4, 0x01]);

    let mut bytes = vec![PacketId::Info.as_u8()];
    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes.extend_from_slice(b"\r\n");
    rig.host.send_bytes(&bytes);
    rig.host.send(&Command::Ping { timestamp: 3 });

    assert_eq!(
        rig.poll(),
        vec![Report::Error(
            "Protocol error: Message too long: 5000 bytes".into()
        )]
    );
    assert_eq!(rig.poll(), vec![Report::Pong { timestamp: 3 }]);
    assert!(rig.poll().is_empty());
    assert_eq!(lock_axes(rig.controller.axes()).primary().target_position(), 0);
}

#[test]
fn truncated_packet_ends_the_session() {
    let mut rig = Rig::new();
    rig.host.send_bytes(&[PacketId::Ping.as_u8(), 0x01, 0x02]);

    let err = rig.controller.poll().unwrap_err();
    assert!(!err.is_recoverable());
}

#[test]
fn debug_info_describes_state() {
    let mut rig = Rig::new();
    let reports = rig.request(&Command::RequestDebugInfo);

    assert!(reports.contains(&Report::Debug("CARRIAGES: 1".into())));
    assert!(reports.contains(&Report::Debug(
        "HOMED: false RUN_SAFELY: false HAS_FAILED: false EXPERIMENT: Idle".into()
    )));
    assert!(reports.iter().any(|report| matches!(
        report,
        Report::Debug(text) if text.starts_with("CART 1: position=")
    )));
}

#[test]
fn experiment_start_stop_and_observations() {
    let mut rig = Rig::new();
    rig.angles.set_angle(1, 12.5);

    assert_eq!(
        rig.request(&Command::ExperimentStart { timestamp_us: 42 }),
        vec![
            Report::Debug("Starting experiment...".into()),
            Report::ExperimentStart {
                timestamp_us: START_US
            },
        ]
    );
    assert_eq!(rig.controller.experiment().state(), ExperimentState::Running);

    // Not due yet.
    rig.clock.advance(1_000);
    assert!(rig.poll().is_empty());

    rig.clock.advance(3_000);
    let position = rig.position(1);
    assert_eq!(
        rig.poll(),
        vec![Report::Observation(Observation {
            timestamp_us: START_US + 4_000,
            cart_id: 1,
            position_steps: position,
            angle_deg: 12.5,
        })]
    );

    assert_eq!(
        rig.request(&Command::ExperimentStop),
        vec![
            Report::Debug("Stopping experiment...".into()),
            Report::ExperimentStop,
            Report::ExperimentDone {
                cart_id: 0,
                failure_mode: FailureMode::Nul
            },
        ]
    );
    assert_eq!(rig.controller.experiment().state(), ExperimentState::Done);

    rig.clock.advance(10_000);
    assert!(rig.poll().is_empty());
}

#[test]
fn observations_cover_every_cart() {
    let mut rig = Rig::two_carts();
    rig.angles.set_angle(2, -4.0);
    rig.request(&Command::ExperimentStart { timestamp_us: 0 });

    rig.clock.advance(4_000);
    let reports = rig.poll();
    let carts: Vec<(u8, f32)> = reports
        .iter()
        .filter_map(|report| match report {
            Report::Observation(obs) => Some((obs.cart_id, obs.angle_deg)),
            _ => None,
        })
        .collect();
    assert_eq!(carts, vec![(1, 0.0), (2, -4.0)]);
}
