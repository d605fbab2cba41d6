//! Experiment lifecycle and observation telemetry.

use std::io;

use cartpole_common::protocol::{ExperimentInfo, FailureMode, Report};
use tracing::{error, info};

use crate::link::ReportSink;

/// Lifecycle of the current experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExperimentState {
    #[default]
    Idle,
    Running,
    /// Stopped by a safety fault; telemetry keeps flowing.
    Failed,
    Done,
}

/// Tracks the experiment and paces observations.
#[derive(Debug)]
pub struct ExperimentSession {
    state: ExperimentState,
    failure_mode: FailureMode,
    failed_cart: u8,
    observation_interval_us: u32,
    last_observation_us: u32,
}

impl ExperimentSession {
    pub fn new(observation_interval_us: u32) -> Self {
        Self {
            state: ExperimentState::Idle,
            failure_mode: FailureMode::Nul,
            failed_cart: 0,
            observation_interval_us,
            last_observation_us: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ExperimentState {
        self.state
    }

    #[inline]
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Cart that caused the last failure, `0` if none.
    #[inline]
    pub fn failed_cart(&self) -> u8 {
        self.failed_cart
    }

    pub fn start(&mut self, now_us: u32, sink: &mut dyn ReportSink) -> io::Result<()> {
        sink.send_debug("Starting experiment...")?;
        info!("experiment started");

        self.state = ExperimentState::Running;
        self.failure_mode = FailureMode::Nul;
        self.failed_cart = 0;
        self.last_observation_us = now_us;

        sink.send(Report::ExperimentStart { timestamp_us: now_us })
    }

    pub fn stop(&mut self, sink: &mut dyn ReportSink) -> io::Result<()> {
        sink.send_debug("Stopping experiment...")?;
        sink.send(Report::ExperimentStop)?;
        info!("experiment stopped");

        self.state = ExperimentState::Done;
        sink.send(Report::ExperimentDone {
            cart_id: 0,
            failure_mode: FailureMode::Nul,
        })
    }

    /// Record a safety failure and report it to the host.
    ///
    /// Only a running experiment moves to `Failed`; a fault outside an
    /// experiment is reported but does not start telemetry.
    pub fn fail(
        &mut self,
        cart_id: u8,
        mode: FailureMode,
        sink: &mut dyn ReportSink,
    ) -> io::Result<()> {
        error!(cart_id, failure_mode = mode.as_str(), "experiment failed");

        if self.state == ExperimentState::Running {
            self.state = ExperimentState::Failed;
        }
        self.failure_mode = mode;
        self.failed_cart = cart_id;

        sink.send(Report::SoftLimitReached)?;
        sink.send(Report::ExperimentDone {
            cart_id,
            failure_mode: mode,
        })?;
        sink.send(Report::ExperimentInfo(ExperimentInfo::FailureMode { cart_id, mode }))
    }

    /// Whether an observation is due at `now_us`; consumes the slot if so.
    ///
    /// Observations flow while the experiment runs and after it failed.
    pub fn observation_due(&mut self, now_us: u32) -> bool {
        if !matches!(self.state, ExperimentState::Running | ExperimentState::Failed) {
            return false;
        }
        if now_us.wrapping_sub(self.last_observation_us) < self.observation_interval_us {
            return false;
        }
        self.last_observation_us = now_us;
        true
    }
}
