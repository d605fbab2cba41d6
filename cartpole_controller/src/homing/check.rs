//! Limit check: re-measure the left bound and report the drift.

use std::io;

use cartpole_common::protocol::{ExperimentInfo, Report};
use tracing::info;

use super::{Phase, SweepContext};
use crate::hal::{Side, StepperDriver};

const LABEL: &str = "LimitChecker";

/// Phase of the limit-check sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Init,
    /// Quick approach to a point just inside the known left bound.
    LeftSuperFast,
    LeftFast,
    LeftRetract,
    LeftSlow,
    /// Read the drift and re-zero.
    LeftPositionGet,
    Reposition,
    Done,
}

impl Phase for CheckPhase {
    fn next(self) -> Self {
        match self {
            Self::Init => Self::LeftSuperFast,
            Self::LeftSuperFast => Self::LeftFast,
            Self::LeftFast => Self::LeftRetract,
            Self::LeftRetract => Self::LeftSlow,
            Self::LeftSlow => Self::LeftPositionGet,
            Self::LeftPositionGet => Self::Reposition,
            Self::Reposition | Self::Done => Self::Done,
        }
    }
}

pub(super) fn advance<D: StepperDriver>(
    phase: &mut CheckPhase,
    ctx: &mut SweepContext<'_, D>,
) -> io::Result<()> {
    match *phase {
        CheckPhase::Init => {
            let ultra_fast = ctx.params.speeds.ultra_fast;
            let margin = ctx.params.distances.check_margin_distance;
            ctx.set_speed(ultra_fast);
            ctx.axes.primary_mut().move_to_distance(margin);
            ctx.advance(phase);
        }

        CheckPhase::LeftSuperFast => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitChecker: LEFT SUPER FAST MARGIN HIT")?;
                let medium = ctx.params.speeds.medium;
                ctx.set_speed(medium);
                ctx.advance(phase);
                ctx.enter_seek(Side::Left);
            }
        }

        CheckPhase::LeftFast => {
            if ctx.left_fast(LABEL)? {
                ctx.advance(phase);
            }
        }

        CheckPhase::LeftRetract => {
            if ctx.left_retract(LABEL)? {
                ctx.advance(phase);
                if ctx.left_slow(LABEL)? {
                    ctx.advance(phase);
                }
            }
        }

        CheckPhase::LeftSlow => {
            if ctx.left_slow(LABEL)? {
                ctx.advance(phase);
            }
        }

        CheckPhase::LeftPositionGet => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitChecker: LEFT LIMIT GET")?;
                report_drift(ctx)?;

                let half_track = ctx.calibration.length_distance / 2.0;
                let ultra_fast = ctx.params.speeds.ultra_fast;
                ctx.axes.primary_mut().set_current_position(0);
                ctx.set_speed(ultra_fast);
                ctx.axes.primary_mut().move_to_distance(half_track);
                ctx.advance(phase);
            }
        }

        CheckPhase::Reposition => {
            if ctx.move_done() {
                ctx.sink.send_info("LimitChecker: NOW DONE")?;
                ctx.advance(phase);
                ctx.axes.stop_all();
                ctx.sink.send(Report::CheckLimit)?;
            }
        }

        CheckPhase::Done => {}
    }
    Ok(())
}

/// The stepper's reading at the re-found left switch is the drift since
/// the last zeroing.
fn report_drift<D: StepperDriver>(ctx: &mut SweepContext<'_, D>) -> io::Result<()> {
    let drift = ctx.axes.primary().current_position();
    ctx.calibration.drift_steps = drift;
    info!(drift_steps = drift, "left bound re-measured");

    ctx.sink.send_info(&format!("LimitChecker: New limit was {drift}"))?;
    ctx.sink.send(Report::ExperimentInfo(ExperimentInfo::PositionDrift {
        cart_id: 1,
        steps: drift,
    }))
}
