//! Limit finding: measure the track and zero at its left end.

use std::io;

use cartpole_common::protocol::{ExperimentInfo, Report};

use super::{Phase, SweepContext};
use crate::hal::{Side, StepperDriver};

const LABEL: &str = "LimitFinder";

/// Phase of the limit-finding sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindPhase {
    Init,
    LeftFast,
    LeftRetract,
    LeftSlow,
    /// Zero the position reference at the confirmed left bound.
    LeftPositionSet,
    RightFast,
    RightRetract,
    RightSlow,
    /// Return traverse to mid-track.
    Reposition,
    Done,
}

impl Phase for FindPhase {
    fn next(self) -> Self {
        match self {
            Self::Init => Self::LeftFast,
            Self::LeftFast => Self::LeftRetract,
            Self::LeftRetract => Self::LeftSlow,
            Self::LeftSlow => Self::LeftPositionSet,
            Self::LeftPositionSet => Self::RightFast,
            Self::RightFast => Self::RightRetract,
            Self::RightRetract => Self::RightSlow,
            Self::RightSlow => Self::Reposition,
            Self::Reposition | Self::Done => Self::Done,
        }
    }
}

pub(super) fn advance<D: StepperDriver>(
    phase: &mut FindPhase,
    ctx: &mut SweepContext<'_, D>,
) -> io::Result<()> {
    match *phase {
        FindPhase::Init => {
            let fast = ctx.params.speeds.fast;
            ctx.set_speed(fast);
            ctx.advance(phase);
            ctx.enter_seek(Side::Left);
        }

        FindPhase::LeftFast => {
            if ctx.left_fast(LABEL)? {
                ctx.advance(phase);
            }
        }

        FindPhase::LeftRetract => {
            if ctx.left_retract(LABEL)? {
                ctx.advance(phase);
                if ctx.left_slow(LABEL)? {
                    ctx.advance(phase);
                }
            }
        }

        FindPhase::LeftSlow => {
            if ctx.left_slow(LABEL)? {
                ctx.advance(phase);
            }
        }

        FindPhase::LeftPositionSet => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitFinder: LEFT LIMIT SET")?;
                ctx.axes.primary_mut().set_current_position(0);
                let medium = ctx.params.speeds.medium;
                ctx.set_speed(medium);
                ctx.advance(phase);
                ctx.enter_seek(Side::Right);
            }
        }

        FindPhase::RightFast => {
            if ctx.seek(Side::Right) {
                ctx.sink.send_info("LimitFinder: RIGHT LIMIT HIT [fast]")?;
                ctx.advance(phase);
                ctx.retract_from(Side::Right);
            }
        }

        FindPhase::RightRetract => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitFinder: RIGHT LIMIT RETRACTED")?;
                ctx.advance(phase);
                let slow = ctx.params.speeds.slow;
                ctx.set_speed(slow);
                ctx.enter_seek(Side::Right);
            }
        }

        FindPhase::RightSlow => {
            if ctx.seek(Side::Right) {
                ctx.sink.send_info("LimitFinder: RIGHT LIMIT HIT [slow]")?;
                record_track(ctx)?;
                ctx.advance(phase);
            }
        }

        FindPhase::Reposition => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitFinder: NOW DONE")?;
                ctx.axes.stop_all();
                adopt_primary_frame(ctx);
                ctx.sink.send(Report::FindLimits)?;
                ctx.advance(phase);
            }
        }

        FindPhase::Done => {}
    }
    Ok(())
}

/// The right bound is confirmed: store the far limit and head for the
/// middle of the track.
fn record_track<D: StepperDriver>(ctx: &mut SweepContext<'_, D>) -> io::Result<()> {
    let axis = ctx.axes.primary();
    let steps = axis.current_position();
    let distance = axis.current_position_distance();

    ctx.axes.set_far_limit_all(steps);
    ctx.calibration.length_steps = steps;
    ctx.calibration.length_distance = distance;

    ctx.sink.send(Report::ExperimentInfo(ExperimentInfo::TrackLengthSteps {
        cart_id: 0,
        steps,
    }))?;

    let ultra_fast = ctx.params.speeds.ultra_fast;
    ctx.set_speed(ultra_fast);
    ctx.axes.primary_mut().move_to_distance(distance / 2.0);
    Ok(())
}

/// Only carriage 1 sees the switches. A second carriage, parked
/// alongside, takes over its reference.
fn adopt_primary_frame<D: StepperDriver>(ctx: &mut SweepContext<'_, D>) {
    let reference = ctx.axes.primary().current_position();
    if let Some(secondary) = ctx.axes.secondary_mut() {
        secondary.set_current_position(reference);
    }
}
