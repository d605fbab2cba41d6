//! Protocol reactor: one inbound packet per call, routed to its handler.
//!
//! | Command                          | Handler                                   |
//! |----------------------------------|-------------------------------------------|
//! | `Ping`                           | reply `Pong` with the same timestamp      |
//! | `SetPosition`                    | absolute / relative positioned move       |
//! | `SetVelocity` / `SetMaxVelocity` | constant-speed setpoint / move ceiling    |
//! | `FindLimits` / `CheckLimit`      | [`HomingEngine`]                          |
//! | `DoJiggle`                       | [`jiggle`]                                |
//! | `RequestDebugInfo`               | Debug lines with config and axis state    |
//! | `ExperimentStart` / `Stop`       | [`ExperimentSession`]                     |
//! | unknown id                       | one Debug packet naming the byte          |

use cartpole_common::protocol::{Command, Report, SetOperation, Setpoint};
use tracing::{debug, info, warn};

use crate::axis::Axes;
use crate::config::{ControllerConfig, JiggleConfig};
use crate::error::ControllerError;
use crate::experiment::ExperimentSession;
use crate::hal::{LimitSwitches, StepperDriver, Transport};
use crate::homing::{HomingEngine, jiggle};
use crate::link::ReportSink;
use crate::supervisor::{MainHandle, RunMode};

/// Everything a command may act on, borrowed for one dispatch.
pub struct Dispatch<'a, D> {
    pub axes: &'a mut Axes<D>,
    pub homing: &'a mut HomingEngine,
    pub experiment: &'a mut ExperimentSession,
    pub switches: &'a mut dyn LimitSwitches,
    pub safety: &'a MainHandle,
    /// Controller clock at the start of this main-loop pass [µs].
    pub now_us: u32,
    pub sink: &'a mut dyn ReportSink,
}

/// Reads and reacts to host commands.
#[derive(Debug)]
pub struct ProtocolReactor {
    /// Ceiling for velocity setpoints [steps/s].
    speed_ceiling: f32,
    jiggle: JiggleConfig,
    config_lines: Vec<String>,
}

impl ProtocolReactor {
    /// `speed_ceiling` is in steps/s.
    pub fn new(config: &ControllerConfig, speed_ceiling: f32) -> Self {
        let stepper = &config.stepper;
        let config_lines = vec![
            format!("STEPPER_MICROSTEPS: {}", stepper.microsteps),
            format!("STEPPER_STEPS_PER_ROTATION: {}", stepper.steps_per_rotation),
            format!(
                "STEPPER_DISTANCE_PER_ROTATION: {:.6}",
                stepper.distance_per_rotation
            ),
            format!("CARRIAGES: {}", config.controller.carriages.count()),
        ];

        Self {
            speed_ceiling,
            jiggle: config.jiggle.clone(),
            config_lines,
        }
    }

    #[inline]
    pub fn speed_ceiling(&self) -> f32 {
        self.speed_ceiling
    }

    /// Configuration summary sent at startup and on `RequestDebugInfo`.
    pub fn config_lines(&self) -> impl Iterator<Item = &str> {
        self.config_lines.iter().map(String::as_str)
    }

    /// Read one command. No buffered byte reads as `Null`.
    ///
    /// Once the identifier byte is consumed the payload is read to
    /// completion.
    pub fn read_command<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<Command, ControllerError> {
        if transport.bytes_available()? == 0 {
            return Ok(Command::Null);
        }
        Ok(Command::read_from(transport)?)
    }

    /// React to one command.
    pub fn dispatch<D: StepperDriver>(
        &mut self,
        command: Command,
        ctx: Dispatch<'_, D>,
    ) -> Result<(), ControllerError> {
        match command {
            Command::Null => {}

            Command::Unknown { observed_id } => {
                warn!(id = observed_id, "unknown packet id");
                ctx.sink
                    .send_debug(&format!("Received unknown packet with ID: {observed_id:#04x}"))?;
            }

            Command::Debug(text) | Command::Info(text) | Command::Error(text) => {
                debug!(text = text.trim_end(), "host message");
            }

            Command::Ping { timestamp } => {
                ctx.sink.send(Report::Pong { timestamp })?;
            }

            Command::RequestDebugInfo => self.send_debug_info(ctx)?,

            Command::SetPosition(setpoint) => set_position(ctx.axes, setpoint)?,

            Command::SetVelocity(setpoint) => {
                let axis = ctx.axes.get_mut(setpoint.cart_id)?;
                let speed = apply_speed(setpoint, axis.speed(), self.speed_ceiling);
                axis.set_speed(speed);
                debug!(cart_id = setpoint.cart_id, speed, "velocity setpoint");
            }

            Command::SetMaxVelocity(setpoint) => {
                let axis = ctx.axes.get_mut(setpoint.cart_id)?;
                let speed = apply_speed(setpoint, axis.max_speed(), self.speed_ceiling);
                axis.set_max_speed(speed);
                debug!(cart_id = setpoint.cart_id, speed, "max velocity setpoint");
            }

            Command::FindLimits => {
                if ctx.homing.has_been_done() {
                    ctx.homing.start_finding(ctx.axes);
                } else {
                    info!("first limit finding, calibrating synchronously");
                    ctx.homing.calibrate(ctx.axes, ctx.switches, ctx.sink)?;
                    ctx.safety.clear_fault();
                }
            }

            Command::CheckLimit => {
                if !ctx.homing.start_check(ctx.axes) {
                    warn!("limit check requested before limit finding");
                    ctx.sink
                        .send_error("LimitChecker: limits have not been found yet")?;
                }
            }

            Command::DoJiggle => {
                ctx.safety.set_run_mode(RunMode::Regular);
                jiggle(ctx.axes, &self.jiggle, ctx.sink)?;
            }

            Command::ExperimentStart { .. } => ctx.experiment.start(ctx.now_us, ctx.sink)?,

            Command::ExperimentStop => ctx.experiment.stop(ctx.sink)?,

            Command::ExperimentDone {
                cart_id,
                failure_mode,
            } => {
                debug!(cart_id, failure_mode = failure_mode.as_str(), "host sent ExperimentDone");
            }
        }
        Ok(())
    }

    fn send_debug_info<D: StepperDriver>(&self, ctx: Dispatch<'_, D>) -> Result<(), ControllerError> {
        for line in &self.config_lines {
            ctx.sink.send_debug(line)?;
        }
        ctx.sink.send_debug(&format!(
            "HOMED: {} RUN_SAFELY: {} HAS_FAILED: {} EXPERIMENT: {:?}",
            ctx.homing.has_been_done(),
            ctx.safety.run_safely(),
            ctx.safety.has_failed(),
            ctx.experiment.state(),
        ))?;
        for axis in ctx.axes.iter() {
            ctx.sink.send_debug(&format!(
                "CART {}: position={} target={} far_limit={} margin={} speed={} max_speed={}",
                axis.cart_id(),
                axis.current_position(),
                axis.target_position(),
                axis.far_limit(),
                axis.safety_margin(),
                axis.speed(),
                axis.max_speed(),
            ))?;
        }
        Ok(())
    }
}

fn set_position<D: StepperDriver>(axes: &mut Axes<D>, setpoint: Setpoint) -> Result<(), ControllerError> {
    let axis = axes.get_mut(setpoint.cart_id)?;
    let value = i32::from(setpoint.value);
    match setpoint.operation {
        SetOperation::Add => axis.move_by(value),
        SetOperation::Subtract => axis.move_by(-value),
        SetOperation::Equal => axis.move_to(value),
        SetOperation::Nul => {}
    }
    debug!(
        cart_id = setpoint.cart_id,
        target = axis.target_position(),
        "position setpoint"
    );
    Ok(())
}

/// New speed after applying `setpoint` to `current`. `Subtract` floors at
/// zero and `Add` stops at `ceiling`.
fn apply_speed(setpoint: Setpoint, current: f32, ceiling: f32) -> f32 {
    let value = f32::from(setpoint.value);
    match setpoint.operation {
        SetOperation::Add => (current + value).min(ceiling),
        SetOperation::Subtract => (current - value).max(0.0),
        SetOperation::Equal => value,
        SetOperation::Nul => current,
    }
}
