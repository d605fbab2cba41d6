//! Track calibration: limit finding, limit check and jiggle.
//!
//! ## Architecture
//!
//! The engine is ticked from the main loop. Each tick samples the limit
//! switches, advances the active sweep by at most one satisfied condition
//! and then steps every axis with the plain (unchecked) primitive, since
//! the envelope is not trusted while it is being measured.
//!
//! ## Sweeps
//!
//! | Sweep          | Phases                                                            |
//! |----------------|-------------------------------------------------------------------|
//! | Limit finding  | Init → LeftFast → LeftRetract → LeftSlow → LeftPositionSet →      |
//! |                | RightFast → RightRetract → RightSlow → Reposition → Done          |
//! | Limit check    | Init → LeftSuperFast → LeftFast → LeftRetract → LeftSlow →        |
//! |                | LeftPositionGet → Reposition → Done                               |
//!
//! On the left side a completed retraction and the first slow-seek tick
//! share one tick: `LeftRetract → LeftSlow` falls through.
//!
//! The only blocking entry points are [`HomingEngine::calibrate`], used
//! for first-time setup, and [`jiggle`].

mod check;
mod finding;
mod jiggle;

pub use check::CheckPhase;
pub use finding::FindPhase;
pub use jiggle::jiggle;

use std::io;

use tracing::{debug, info};

use crate::axis::Axes;
use crate::config::{ControllerConfig, HomingConfig, SpeedConfig};
use crate::hal::{LimitSwitches, Side, StepperDriver};
use crate::link::ReportSink;

// ─── Results ────────────────────────────────────────────────────────

/// Which sweep a tick belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    LimitFinding,
    LimitCheck,
}

/// Result of a single homing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingTickResult {
    /// No sweep is running.
    Idle,
    InProgress,
    /// The sweep reached `Done` on this tick. The caller clears any
    /// latched safety fault.
    Completed(SweepKind),
}

/// Current sweep and its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sweep {
    #[default]
    Idle,
    Finding(FindPhase),
    Checking(CheckPhase),
}

impl Sweep {
    #[inline]
    pub fn is_active(self) -> bool {
        match self {
            Self::Idle => false,
            Self::Finding(phase) => phase != FindPhase::Done,
            Self::Checking(phase) => phase != CheckPhase::Done,
        }
    }
}

/// Measured track, in cart 1's frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackCalibration {
    pub length_steps: i32,
    /// [mm]
    pub length_distance: f32,
    /// Left bound found by the last limit check, relative to the previous
    /// zero [steps].
    pub drift_steps: i32,
}

// ─── Parameters ─────────────────────────────────────────────────────

/// Speeds and distances used by both sweeps.
#[derive(Debug, Clone)]
pub struct HomingParams {
    pub speeds: SpeedConfig,
    pub distances: HomingConfig,
    /// A lone carriage keeps re-issuing its seek move; with two carriages
    /// the seek is commanded once per phase.
    pub single_carriage: bool,
}

impl HomingParams {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            speeds: config.speeds.clone(),
            distances: config.homing.clone(),
            single_carriage: config.controller.carriages.count() == 1,
        }
    }
}

// ─── Phase plumbing ─────────────────────────────────────────────────

/// A phase of one of the sweep machines.
pub(crate) trait Phase: Copy + Eq + std::fmt::Debug {
    /// Following phase; `Done` stays `Done`.
    fn next(self) -> Self;
}

/// Everything a phase handler may touch during one tick.
pub(crate) struct SweepContext<'a, D> {
    pub axes: &'a mut Axes<D>,
    pub switches: &'a mut dyn LimitSwitches,
    pub sink: &'a mut dyn ReportSink,
    pub params: &'a HomingParams,
    pub calibration: &'a mut TrackCalibration,
    transitions: u32,
}

impl<D: StepperDriver> SweepContext<'_, D> {
    /// Move `phase` on by one and count the transition.
    pub fn advance<P: Phase>(&mut self, phase: &mut P) {
        let next = phase.next();
        debug!(from = ?*phase, to = ?next, "homing transition");
        *phase = next;
        self.transitions += 1;
    }

    /// Set carriage 1's positioned-move speed [mm/s].
    pub fn set_speed(&mut self, speed: f32) {
        self.axes.primary_mut().set_max_speed_distance(speed);
    }

    #[inline]
    pub fn move_done(&self) -> bool {
        self.axes.primary().distance_to_go() == 0
    }

    /// Start seeking `side` on entry to a seek phase.
    pub fn enter_seek(&mut self, side: Side) {
        if !self.params.single_carriage {
            let distance = side.sign() * self.params.distances.big_distance;
            self.axes.primary_mut().move_distance(distance);
        }
    }

    /// One tick of a switch-seeking phase.
    ///
    /// Returns `true` and stops carriage 1 when the `side` switch has
    /// just closed. Otherwise a lone carriage re-issues its seek move if
    /// the previous one ran out.
    pub fn seek(&mut self, side: Side) -> bool {
        if self.switches.was_pressed(side) {
            self.axes.primary_mut().stop();
            return true;
        }
        if self.params.single_carriage {
            let distance = side.sign() * self.params.distances.big_distance;
            self.axes.primary_mut().move_distance_cond(distance);
        }
        false
    }

    /// Back off from the `side` switch.
    pub fn retract_from(&mut self, side: Side) {
        let distance = side.opposite().sign() * self.params.distances.retraction_distance;
        self.axes.primary_mut().move_distance(distance);
    }

    /// `LeftRetract` shared by both sweeps. Returns `true` once the
    /// retraction is complete and the slow seek may run this same tick.
    pub fn left_retract(&mut self, label: &str) -> io::Result<bool> {
        if !self.move_done() {
            return Ok(false);
        }
        self.sink.send_info(&format!("{label}: LEFT LIMIT RETRACTED"))?;
        let slow = self.params.speeds.slow;
        self.set_speed(slow);
        self.enter_seek(Side::Left);
        Ok(true)
    }

    /// `LeftSlow` shared by both sweeps. Returns `true` on the precise
    /// switch hit.
    pub fn left_slow(&mut self, label: &str) -> io::Result<bool> {
        if !self.seek(Side::Left) {
            return Ok(false);
        }
        self.sink.send_info(&format!("{label}: LEFT LIMIT HIT [slow]"))?;
        Ok(true)
    }

    /// `LeftFast` shared by both sweeps. Returns `true` on the switch hit,
    /// with the retraction already commanded.
    pub fn left_fast(&mut self, label: &str) -> io::Result<bool> {
        if !self.seek(Side::Left) {
            return Ok(false);
        }
        self.sink.send_info(&format!("{label}: LEFT LIMIT HIT [fast]"))?;
        self.retract_from(Side::Left);
        Ok(true)
    }
}

// ─── Engine ─────────────────────────────────────────────────────────

/// Drives the limit-finding and limit-check sweeps.
#[derive(Debug)]
pub struct HomingEngine {
    params: HomingParams,
    sweep: Sweep,
    calibration: TrackCalibration,
    has_been_done: bool,
    /// Phase advances of the current sweep.
    transitions: u32,
}

impl HomingEngine {
    pub fn new(params: HomingParams) -> Self {
        Self {
            params,
            sweep: Sweep::Idle,
            calibration: TrackCalibration::default(),
            has_been_done: false,
            transitions: 0,
        }
    }

    #[inline]
    pub fn sweep(&self) -> Sweep {
        self.sweep
    }

    /// Whether a sweep is running.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.sweep.is_active()
    }

    /// Whether limit finding has completed at least once.
    #[inline]
    pub fn has_been_done(&self) -> bool {
        self.has_been_done
    }

    #[inline]
    pub fn calibration(&self) -> &TrackCalibration {
        &self.calibration
    }

    #[inline]
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Adopt a known track without sweeping.
    pub fn set_calibration(&mut self, length_steps: i32, length_distance: f32) {
        self.calibration.length_steps = length_steps;
        self.calibration.length_distance = length_distance;
        self.has_been_done = true;
    }

    /// Begin limit finding. Energises every axis.
    pub fn start_finding<D: StepperDriver>(&mut self, axes: &mut Axes<D>) {
        info!("limit finding started");
        axes.enable_all();
        self.sweep = Sweep::Finding(FindPhase::Init);
        self.transitions = 0;
    }

    /// Begin a limit check. Refused until the track has been measured.
    pub fn start_check<D: StepperDriver>(&mut self, axes: &mut Axes<D>) -> bool {
        if !self.has_been_done {
            return false;
        }
        info!("limit check started");
        axes.enable_all();
        self.sweep = Sweep::Checking(CheckPhase::Init);
        self.transitions = 0;
        true
    }

    /// Advance the running sweep by one tick.
    pub fn tick<D: StepperDriver>(
        &mut self,
        axes: &mut Axes<D>,
        switches: &mut dyn LimitSwitches,
        sink: &mut dyn ReportSink,
    ) -> io::Result<HomingTickResult> {
        if !self.sweep.is_active() {
            return Ok(HomingTickResult::Idle);
        }
        switches.update();

        let mut ctx = SweepContext {
            axes,
            switches,
            sink,
            params: &self.params,
            calibration: &mut self.calibration,
            transitions: 0,
        };

        let result = match &mut self.sweep {
            Sweep::Finding(phase) => {
                finding::advance(phase, &mut ctx)?;
                (*phase == FindPhase::Done).then_some(SweepKind::LimitFinding)
            }
            Sweep::Checking(phase) => {
                check::advance(phase, &mut ctx)?;
                (*phase == CheckPhase::Done).then_some(SweepKind::LimitCheck)
            }
            Sweep::Idle => None,
        };
        self.transitions += ctx.transitions;

        ctx.axes.run_all();

        Ok(match result {
            Some(kind) => {
                if kind == SweepKind::LimitFinding {
                    self.has_been_done = true;
                }
                info!(sweep = ?kind, transitions = self.transitions, "sweep complete");
                HomingTickResult::Completed(kind)
            }
            None => HomingTickResult::InProgress,
        })
    }

    /// Blocking limit finding, for first-time setup.
    pub fn calibrate<D: StepperDriver>(
        &mut self,
        axes: &mut Axes<D>,
        switches: &mut dyn LimitSwitches,
        sink: &mut dyn ReportSink,
    ) -> io::Result<()> {
        self.start_finding(axes);
        loop {
            if let HomingTickResult::Completed(_) = self.tick(axes, switches, sink)? {
                return Ok(());
            }
        }
    }
}
