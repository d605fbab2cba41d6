//! Shared rig for the scenario modules.

mod homing_scenarios;
mod protocol_scenarios;
mod safety_scenarios;

use std::sync::Arc;

use cartpole_common::protocol::{Command, Report};
use cartpole_controller::axis::{Axes, lock_axes};
use cartpole_controller::config::{Carriages, ControllerConfig};
use cartpole_controller::controller::{Controller, Peripherals};
use cartpole_controller::sim::{LoopbackHost, LoopbackTransport, SimAngles, SimClock, SimRail, SimStepper};
use cartpole_controller::supervisor::{SafetyContext, StepTick, TickOutcome};

/// Rail length between the switches [steps].
pub const TRACK: i32 = 12_000;

/// Main-loop passes allowed for one tick-driven sweep.
pub const POLL_BUDGET: usize = 20 * TRACK as usize;

/// Clock value at construction [µs].
pub const START_US: u32 = 1_000;

/// Controller on a simulated rail, with the host end of the link and a
/// hand-driven step tick.
pub struct Rig {
    pub controller: Controller<SimStepper>,
    pub tick: StepTick<SimStepper>,
    pub host: LoopbackHost,
    pub rail: Arc<SimRail>,
    pub angles: Arc<SimAngles>,
    pub clock: SimClock,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn two_carts() -> Self {
        let mut config = ControllerConfig::default();
        config.controller.carriages = Carriages::Two;
        Self::with_config(config)
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let rail = SimRail::new(TRACK);
        let angles = SimAngles::new();
        let clock = SimClock::manual(START_US);
        let (transport, host) = LoopbackTransport::pair();

        let drivers = (1..=config.controller.carriages.count() as u8).map(|cart| rail.stepper(cart));
        let axes = Axes::from_config(&config, drivers).unwrap().into_shared();

        let (safety, tick_handle) = SafetyContext::new();
        let tick = StepTick::new(Arc::clone(&axes), tick_handle);
        let peripherals = Peripherals {
            switches: Box::new(rail.limit_switches()),
            angles: Box::new(angles.sensor()),
            clock: Box::new(clock.clone()),
            transport: Box::new(transport),
        };

        Self {
            controller: Controller::new(&config, axes, safety, peripherals),
            tick,
            host,
            rail,
            angles,
            clock,
        }
    }

    /// Send one command, run one main-loop pass, return what came back.
    pub fn request(&mut self, command: &Command) -> Vec<Report> {
        self.host.send(command);
        self.poll()
    }

    /// One main-loop pass without host input.
    pub fn poll(&mut self) -> Vec<Report> {
        self.controller.poll().unwrap();
        self.host.take_reports().unwrap()
    }

    /// First limit finding; runs synchronously inside one pass.
    pub fn home(&mut self) -> Vec<Report> {
        let reports = self.request(&Command::FindLimits);
        assert!(self.controller.homing().has_been_done());
        assert_eq!(reports.last(), Some(&Report::FindLimits));
        reports
    }

    /// Poll until the running sweep finishes; returns everything reported.
    pub fn finish_sweep(&mut self) -> Vec<Report> {
        let mut reports = Vec::new();
        for _ in 0..POLL_BUDGET {
            reports.extend(self.poll());
            if !self.controller.homing().is_active() {
                return reports;
            }
        }
        panic!("sweep did not finish within {POLL_BUDGET} passes");
    }

    /// Run the step tick until it reports a fault, at most `limit` times.
    pub fn tick_until_fault(&mut self, limit: usize) -> Option<TickOutcome> {
        (0..limit)
            .map(|_| self.tick.tick())
            .find(|outcome| matches!(outcome, TickOutcome::Fault { .. }))
    }

    pub fn position(&self, cart_id: u8) -> i32 {
        let axes = lock_axes(self.controller.axes());
        axes.get(cart_id).map(|axis| axis.current_position()).unwrap()
    }
}
