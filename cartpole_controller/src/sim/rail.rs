//! Physical rail, steppers and limit switches.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use cartpole_common::consts::MAX_CARTS;
use tracing::trace;

use crate::hal::{LimitSwitches, Side, StepperDriver};

/// Map a 1-based cart id onto a slot, clamping out-of-range ids.
fn slot(cart_id: u8) -> usize {
    usize::from(cart_id.saturating_sub(1)).min(MAX_CARTS - 1)
}

// ─── Rail ───────────────────────────────────────────────────────────

/// The track: physical carriage positions and switch locations, in
/// micro-steps of a fixed physical frame.
///
/// The frame is independent of what the steppers believe; homing
/// re-zeroes the stepper, not the rail.
#[derive(Debug)]
pub struct SimRail {
    positions: [AtomicI32; MAX_CARTS],
    left_switch: i32,
    right_switch: i32,
}

impl SimRail {
    /// Track with switches at `0` and `length`, carriages parked midway.
    pub fn new(length: i32) -> Arc<Self> {
        Self::with_switches(0, length, length / 2)
    }

    pub fn with_switches(left_switch: i32, right_switch: i32, start: i32) -> Arc<Self> {
        Arc::new(Self {
            positions: [AtomicI32::new(start), AtomicI32::new(start)],
            left_switch,
            right_switch,
        })
    }

    #[inline]
    pub fn left_switch(&self) -> i32 {
        self.left_switch
    }

    #[inline]
    pub fn right_switch(&self) -> i32 {
        self.right_switch
    }

    #[inline]
    pub fn physical_position(&self, cart_id: u8) -> i32 {
        self.positions[slot(cart_id)].load(Ordering::Acquire)
    }

    pub fn set_physical_position(&self, cart_id: u8, position: i32) {
        self.positions[slot(cart_id)].store(position, Ordering::Release);
    }

    fn shift(&self, cart_id: u8, delta: i32) {
        self.positions[slot(cart_id)].fetch_add(delta, Ordering::AcqRel);
    }

    /// Stepper driving `cart_id` on this rail.
    pub fn stepper(self: &Arc<Self>, cart_id: u8) -> SimStepper {
        SimStepper::new(Arc::clone(self), cart_id)
    }

    /// Switches sensing carriage 1.
    pub fn limit_switches(self: &Arc<Self>) -> SimLimitSwitches {
        SimLimitSwitches::new(Arc::clone(self))
    }
}

// ─── Stepper ────────────────────────────────────────────────────────

/// One micro-step per `run`/`run_speed` call; `stop` is immediate.
#[derive(Debug)]
pub struct SimStepper {
    rail: Arc<SimRail>,
    cart_id: u8,
    position: i32,
    target: i32,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    enabled: bool,
    steps_taken: u64,
}

impl SimStepper {
    pub fn new(rail: Arc<SimRail>, cart_id: u8) -> Self {
        Self {
            rail,
            cart_id,
            position: 0,
            target: 0,
            speed: 0.0,
            max_speed: 1.0,
            acceleration: 1.0,
            enabled: true,
            steps_taken: 0,
        }
    }

    /// Total micro-steps executed since construction.
    #[inline]
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    #[inline]
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    fn step(&mut self, direction: i32) {
        self.position = self.position.wrapping_add(direction);
        self.steps_taken += 1;
        // A de-energised motor does not move the carriage.
        if self.enabled {
            self.rail.shift(self.cart_id, direction);
        }
    }
}

impl StepperDriver for SimStepper {
    #[inline]
    fn current_position(&self) -> i32 {
        self.position
    }

    fn set_current_position(&mut self, position: i32) {
        self.position = position;
        self.target = position;
        self.speed = 0.0;
    }

    #[inline]
    fn target_position(&self) -> i32 {
        self.target
    }

    fn move_to(&mut self, absolute: i32) {
        self.target = absolute;
    }

    fn run(&mut self) -> bool {
        let remaining = self.distance_to_go();
        if remaining != 0 {
            self.step(remaining.signum());
        }
        self.distance_to_go() != 0
    }

    fn run_speed(&mut self) -> bool {
        if self.speed > 0.0 {
            self.step(1);
            true
        } else if self.speed < 0.0 {
            self.step(-1);
            true
        } else {
            false
        }
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    #[inline]
    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_max_speed(&mut self, speed: f32) {
        self.max_speed = speed.abs();
    }

    #[inline]
    fn max_speed(&self) -> f32 {
        self.max_speed
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        self.acceleration = acceleration.abs();
    }

    fn stop(&mut self) {
        trace!(cart_id = self.cart_id, position = self.position, "sim stepper stop");
        self.target = self.position;
    }

    fn enable_outputs(&mut self) {
        self.enabled = true;
    }

    fn disable_outputs(&mut self) {
        self.enabled = false;
    }

    #[inline]
    fn outputs_enabled(&self) -> bool {
        self.enabled
    }
}

// ─── Limit switches ─────────────────────────────────────────────────

/// Switch state derived from carriage 1's physical position.
#[derive(Debug)]
pub struct SimLimitSwitches {
    rail: Arc<SimRail>,
    pressed: [bool; 2],
    rose: [bool; 2],
}

impl SimLimitSwitches {
    pub fn new(rail: Arc<SimRail>) -> Self {
        Self {
            rail,
            pressed: [false; 2],
            rose: [false; 2],
        }
    }

    const fn index(side: Side) -> usize {
        match side {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl LimitSwitches for SimLimitSwitches {
    fn update(&mut self) {
        let position = self.rail.physical_position(1);
        let now = [
            position <= self.rail.left_switch(),
            position >= self.rail.right_switch(),
        ];
        for (i, &pressed) in now.iter().enumerate() {
            self.rose[i] = pressed && !self.pressed[i];
        }
        self.pressed = now;
    }

    fn is_pressed(&self, side: Side) -> bool {
        self.pressed[Self::index(side)]
    }

    fn was_pressed(&self, side: Side) -> bool {
        self.rose[Self::index(side)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_moves_one_step_towards_target() {
        let rail = SimRail::new(100);
        let mut stepper = rail.stepper(1);
        stepper.move_to(3);

        assert!(stepper.run());
        assert_eq!(stepper.current_position(), 1);
        assert!(stepper.run());
        assert!(!stepper.run());
        assert_eq!(stepper.current_position(), 3);
        assert!(!stepper.run());
        assert_eq!(stepper.steps_taken(), 3);
        assert_eq!(rail.physical_position(1), 53);
    }

    #[test]
    fn rezeroing_keeps_physical_position() {
        let rail = SimRail::new(100);
        let mut stepper = rail.stepper(1);
        stepper.move_by(-5);
        stepper.run_to_position();
        stepper.set_current_position(0);

        assert_eq!(stepper.current_position(), 0);
        assert_eq!(stepper.distance_to_go(), 0);
        assert_eq!(rail.physical_position(1), 45);
    }

    #[test]
    fn run_speed_follows_sign() {
        let rail = SimRail::new(100);
        let mut stepper = rail.stepper(2);
        assert!(!stepper.run_speed());

        stepper.set_speed(-10.0);
        assert!(stepper.run_speed());
        assert_eq!(stepper.current_position(), -1);
        assert_eq!(rail.physical_position(2), 49);
        assert_eq!(rail.physical_position(1), 50);
    }

    #[test]
    fn stop_is_immediate() {
        let rail = SimRail::new(100);
        let mut stepper = rail.stepper(1);
        stepper.move_to(40);
        stepper.run();
        stepper.stop();
        assert_eq!(stepper.distance_to_go(), 0);
    }

    #[test]
    fn disabled_outputs_do_not_move_the_carriage() {
        let rail = SimRail::new(100);
        let mut stepper = rail.stepper(1);
        stepper.disable_outputs();
        stepper.move_by(2);
        stepper.run_to_position();
        assert_eq!(stepper.current_position(), 2);
        assert_eq!(rail.physical_position(1), 50);
    }

    #[test]
    fn switches_report_edges_once() {
        let rail = SimRail::with_switches(0, 10, 1);
        let mut switches = rail.limit_switches();
        switches.update();
        assert!(!switches.is_pressed(Side::Left));

        rail.set_physical_position(1, 0);
        switches.update();
        assert!(switches.is_pressed(Side::Left));
        assert!(switches.was_pressed(Side::Left));

        rail.set_physical_position(1, -1);
        switches.update();
        assert!(switches.is_pressed(Side::Left));
        assert!(!switches.was_pressed(Side::Left));

        rail.set_physical_position(1, 10);
        switches.update();
        assert!(switches.was_pressed(Side::Right));
        assert!(!switches.is_pressed(Side::Left));
    }
}
