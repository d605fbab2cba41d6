//! Application context and main loop pass.
//!
//! [`Controller`] owns every main-loop component and the host link. One
//! call to [`poll`](Controller::poll) is one pass of the firmware loop:
//!
//! 1. read at most one host command
//! 2. advance a running homing sweep, then dispatch the command
//! 3. recompute `run_safely` and `run_mode` for the step tick
//! 4. run the fault path on a newly latched safety fault
//! 5. emit observations when due
//!
//! Steps 2 to 4 run with the axes locked and only queue their reports;
//! the link is written after the lock is released. The step tick runs
//! elsewhere and only shares the axes and the
//! [`SafetyContext`](crate::supervisor::SafetyContext).

use cartpole_common::consts::{INITIAL_OUTPUT_STOP_MARKER, MAX_CARTS};
use cartpole_common::protocol::{Observation, Report};
use tracing::{error, info, warn};

use crate::axis::{Axes, SharedAxes, lock_axes};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::experiment::ExperimentSession;
use crate::hal::{AngleSensor, Clock, LimitSwitches, StepperDriver, Transport};
use crate::homing::{HomingEngine, HomingParams, HomingTickResult};
use crate::link::{PacketSender, ReportSink};
use crate::reactor::{Dispatch, ProtocolReactor};
use crate::supervisor::{MainHandle, RunMode};

/// Hardware the main loop talks to directly.
pub struct Peripherals {
    pub switches: Box<dyn LimitSwitches>,
    pub angles: Box<dyn AngleSensor>,
    pub clock: Box<dyn Clock>,
    pub transport: Box<dyn Transport>,
}

/// The controller application context.
pub struct Controller<D> {
    axes: SharedAxes<D>,
    safety: MainHandle,
    homing: HomingEngine,
    experiment: ExperimentSession,
    reactor: ProtocolReactor,
    link: PacketSender<Box<dyn Transport>>,
    switches: Box<dyn LimitSwitches>,
    angles: Box<dyn AngleSensor>,
    clock: Box<dyn Clock>,
    /// Fault episode the fault path last ran for.
    handled_episode: u32,
}

impl<D: StepperDriver> Controller<D> {
    pub fn new(
        config: &ControllerConfig,
        axes: SharedAxes<D>,
        safety: MainHandle,
        peripherals: Peripherals,
    ) -> Self {
        let speed_ceiling = {
            let axes = lock_axes(&axes);
            axes.primary()
                .distance_to_steps(config.controller.max_settable_speed) as f32
        };
        let handled_episode = safety.fault_episodes();

        Self {
            axes,
            safety,
            homing: HomingEngine::new(HomingParams::from_config(config)),
            experiment: ExperimentSession::new(config.controller.observation_interval_us),
            reactor: ProtocolReactor::new(config, speed_ceiling),
            link: PacketSender::new(peripherals.transport),
            switches: peripherals.switches,
            angles: peripherals.angles,
            clock: peripherals.clock,
            handled_episode,
        }
    }

    /// Startup banner, ending with the raw end-of-boot marker.
    pub fn announce(&mut self) -> Result<(), ControllerError> {
        self.link.send_info("=== Cartpole Controller ===")?;
        for line in self.reactor.config_lines() {
            self.link.send_debug(line)?;
        }
        self.link.send_debug("Config finished")?;
        self.link.send_debug("Starting loop")?;
        self.link.send_raw(INITIAL_OUTPUT_STOP_MARKER)?;
        info!("controller ready");
        Ok(())
    }

    /// One main-loop pass.
    ///
    /// Errors local to one command are logged, reported to the host as an
    /// `Error` packet and swallowed. Transport failures are returned.
    ///
    /// Reports produced while the axes are locked are queued and written
    /// only after the lock is released, so a slow host never holds up the
    /// step tick. A blocking `calibrate` or `jiggle` still holds the lock
    /// for its whole run.
    pub fn poll(&mut self) -> Result<(), ControllerError> {
        let now_us = self.clock.micros();
        // Payload reads may block; the axes stay unlocked meanwhile.
        let command = self.reactor.read_command(self.link.transport_mut());

        let mut outbox: Vec<Report> = Vec::new();
        let mut positions: heapless::Vec<(u8, i32), MAX_CARTS> = heapless::Vec::new();
        let mut fatal = None;
        {
            let mut guard = lock_axes(&self.axes);
            let axes: &mut Axes<D> = &mut guard;

            if let HomingTickResult::Completed(kind) =
                self.homing
                    .tick(&mut *axes, self.switches.as_mut(), &mut outbox)?
            {
                info!(sweep = ?kind, "calibration sweep finished");
                self.safety.clear_fault();
            }

            let dispatched = match command {
                Ok(command) => self.reactor.dispatch(
                    command,
                    Dispatch {
                        axes: &mut *axes,
                        homing: &mut self.homing,
                        experiment: &mut self.experiment,
                        switches: self.switches.as_mut(),
                        safety: &self.safety,
                        now_us,
                        sink: &mut outbox,
                    },
                ),
                Err(e) => Err(e),
            };
            match dispatched {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "command rejected");
                    outbox.send_error(&e.to_string())?;
                }
                Err(e) => fatal = Some(e),
            }

            let sweeping = self.homing.is_active();
            self.safety
                .set_run_safely(!sweeping && self.homing.has_been_done());
            let mode = if sweeping || self.safety.has_failed() {
                RunMode::Regular
            } else {
                RunMode::ConstantSpeed
            };
            self.safety.set_run_mode(mode);

            if let Some(fault) = self.safety.fault() {
                let episode = self.safety.fault_episodes();
                if episode != self.handled_episode {
                    self.handled_episode = episode;
                    axes.stop_all();
                    axes.set_speed_all(0.0);

                    let position = axes
                        .get(fault.cart_id)
                        .map(|axis| axis.current_position())
                        .unwrap_or_default();
                    error!(
                        cart_id = fault.cart_id,
                        class = ?fault.class,
                        position,
                        "safety fault, motion halted"
                    );
                    self.experiment
                        .fail(fault.cart_id, fault.class.failure_mode(), &mut outbox)?;
                }
            }

            if self.experiment.observation_due(now_us) {
                for axis in axes.iter() {
                    // At most MAX_CARTS axes exist.
                    let _ = positions.push((axis.cart_id(), axis.current_position()));
                }
            }
        }

        for report in outbox {
            self.link.send(report)?;
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        for (cart_id, position_steps) in positions {
            let observation = Observation {
                timestamp_us: self.clock.micros(),
                cart_id,
                position_steps,
                angle_deg: self.angles.read_angle_deg(cart_id),
            };
            self.link.send(Report::Observation(observation))?;
        }

        Ok(())
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn axes(&self) -> &SharedAxes<D> {
        &self.axes
    }

    #[inline]
    pub fn safety(&self) -> &MainHandle {
        &self.safety
    }

    #[inline]
    pub fn homing(&self) -> &HomingEngine {
        &self.homing
    }

    #[inline]
    pub fn homing_mut(&mut self) -> &mut HomingEngine {
        &mut self.homing
    }

    #[inline]
    pub fn experiment(&self) -> &ExperimentSession {
        &self.experiment
    }

    /// Packets sent to the host so far.
    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.link.sent()
    }
}
