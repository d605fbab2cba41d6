//! Per-carriage motion primitive.
//!
//! [`AxisController`] wraps a [`StepperDriver`] with unit conversion
//! (distance/angle ↔ micro-steps), travel-limit bookkeeping and the
//! safety-classifying step. [`Axes`] holds the one or two configured
//! carriages and resolves 1-based cart ids.
//!
//! ## Safe envelope
//!
//! With far limit `F` and margin `m` (both in steps):
//!
//! | Position        | Class           |
//! |-----------------|-----------------|
//! | `p <= m`        | `LowLimitFail`  |
//! | `m < p < F - m` | `Safe`          |
//! | `p >= F - m`    | `HighLimitFail` |

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartpole_common::consts::MAX_CARTS;
use cartpole_common::protocol::FailureMode;
use tracing::debug;

use crate::config::{ControllerConfig, StepperConfig};
use crate::error::ControllerError;
use crate::hal::StepperDriver;

// ─── Safety classification ──────────────────────────────────────────

/// Position class after one run-safe step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyClass {
    Safe,
    /// At or under the near bound.
    LowLimitFail,
    /// At or over the far bound.
    HighLimitFail,
}

impl SafetyClass {
    #[inline]
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Failure reported to the host for this class.
    pub const fn failure_mode(self) -> FailureMode {
        match self {
            Self::Safe => FailureMode::Nul,
            Self::LowLimitFail => FailureMode::PositionLeft,
            Self::HighLimitFail => FailureMode::PositionRight,
        }
    }

    #[inline]
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::LowLimitFail => 1,
            Self::HighLimitFail => 2,
        }
    }

    #[inline]
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::LowLimitFail,
            2 => Self::HighLimitFail,
            _ => Self::Safe,
        }
    }
}

// ─── Geometry ───────────────────────────────────────────────────────

/// Drive geometry used for unit conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub microsteps: u32,
    pub steps_per_rotation: u32,
    /// [mm]
    pub distance_per_rotation: f32,
    /// [deg]
    pub angle_per_rotation: f32,
}

impl Geometry {
    #[inline]
    fn steps_per_rotation_total(&self) -> f32 {
        self.microsteps as f32 * self.steps_per_rotation as f32
    }
}

impl From<&StepperConfig> for Geometry {
    fn from(config: &StepperConfig) -> Self {
        Self {
            microsteps: config.microsteps,
            steps_per_rotation: config.steps_per_rotation,
            distance_per_rotation: config.distance_per_rotation,
            angle_per_rotation: config.angle_per_rotation,
        }
    }
}

// ─── Axis controller ────────────────────────────────────────────────

/// One carriage: driver plus conversion and safe-envelope bookkeeping.
#[derive(Debug)]
pub struct AxisController<D> {
    cart_id: u8,
    driver: D,
    geometry: Geometry,
    /// Far travel limit [steps]. Zero until homing has measured the track.
    far_limit: i32,
    /// [steps]
    safety_margin: i32,
}

impl<D: StepperDriver> AxisController<D> {
    pub fn new(cart_id: u8, driver: D, geometry: Geometry) -> Self {
        Self {
            cart_id,
            driver,
            geometry,
            far_limit: 0,
            safety_margin: 0,
        }
    }

    /// Build with the configured geometry, speed, acceleration and margin.
    pub fn from_config(cart_id: u8, driver: D, config: &StepperConfig) -> Self {
        let mut axis = Self::new(cart_id, driver, Geometry::from(config));
        axis.set_max_speed_distance(config.default_speed);
        axis.set_acceleration_distance(config.max_acceleration);
        axis.set_limit_safety_margin_distance(config.limit_safety_margin);
        axis
    }

    #[inline]
    pub fn cart_id(&self) -> u8 {
        self.cart_id
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    // ── Conversion ──

    /// Truncates towards zero, like the firmware's integer cast.
    pub fn distance_to_steps(&self, distance: f32) -> i32 {
        (distance * self.geometry.steps_per_rotation_total() / self.geometry.distance_per_rotation)
            as i32
    }

    pub fn steps_to_distance(&self, steps: i32) -> f32 {
        steps as f32 * self.geometry.distance_per_rotation / self.geometry.steps_per_rotation_total()
    }

    pub fn angle_to_steps(&self, angle: f32) -> i32 {
        (angle * self.geometry.steps_per_rotation_total() / self.geometry.angle_per_rotation) as i32
    }

    // ── Position ──

    #[inline]
    pub fn current_position(&self) -> i32 {
        self.driver.current_position()
    }

    pub fn current_position_distance(&self) -> f32 {
        self.steps_to_distance(self.current_position())
    }

    pub fn set_current_position(&mut self, steps: i32) {
        self.driver.set_current_position(steps);
    }

    pub fn set_current_position_distance(&mut self, distance: f32) {
        let steps = self.distance_to_steps(distance);
        self.driver.set_current_position(steps);
    }

    #[inline]
    pub fn target_position(&self) -> i32 {
        self.driver.target_position()
    }

    #[inline]
    pub fn distance_to_go(&self) -> i32 {
        self.driver.distance_to_go()
    }

    // ── Motion commands ──

    pub fn move_to(&mut self, steps: i32) {
        self.driver.move_to(steps);
    }

    pub fn move_by(&mut self, steps: i32) {
        self.driver.move_by(steps);
    }

    pub fn move_to_distance(&mut self, distance: f32) {
        let steps = self.distance_to_steps(distance);
        self.driver.move_to(steps);
    }

    pub fn move_distance(&mut self, distance: f32) {
        let steps = self.distance_to_steps(distance);
        self.driver.move_by(steps);
    }

    pub fn move_to_angle(&mut self, angle: f32) {
        let steps = self.angle_to_steps(angle);
        self.driver.move_to(steps);
    }

    /// Relative move, only if no move is pending.
    pub fn move_cond(&mut self, steps: i32) {
        if self.distance_to_go() == 0 {
            self.driver.move_by(steps);
        }
    }

    /// Relative move in distance units, only if no move is pending.
    pub fn move_distance_cond(&mut self, distance: f32) {
        if self.distance_to_go() == 0 {
            self.move_distance(distance);
        }
    }

    /// Blocking.
    pub fn run_to_position(&mut self) {
        self.driver.run_to_position();
    }

    /// Blocking relative move.
    pub fn run_distance(&mut self, distance: f32) {
        self.move_distance(distance);
        self.driver.run_to_position();
    }

    /// Blocking absolute move.
    pub fn run_to_distance(&mut self, distance: f32) {
        self.move_to_distance(distance);
        self.driver.run_to_position();
    }

    /// Blocking absolute move in angle units.
    pub fn run_to_angle(&mut self, angle: f32) {
        self.move_to_angle(angle);
        self.driver.run_to_position();
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    // ── Stepping ──

    /// Positioned step without any envelope check.
    #[inline]
    pub fn run(&mut self) -> bool {
        self.driver.run()
    }

    /// Constant-speed step without any envelope check.
    #[inline]
    pub fn run_speed(&mut self) -> bool {
        self.driver.run_speed()
    }

    /// Positioned step, then classify the resulting position.
    ///
    /// The step is always taken; halting is the caller's decision.
    #[inline]
    pub fn run_safe(&mut self) -> SafetyClass {
        self.driver.run();
        self.classify(self.driver.current_position())
    }

    /// Constant-speed step, then classify the resulting position.
    #[inline]
    pub fn run_safe_speed(&mut self) -> SafetyClass {
        self.driver.run_speed();
        self.classify(self.driver.current_position())
    }

    #[inline]
    pub fn classify(&self, position: i32) -> SafetyClass {
        if position <= self.safety_margin {
            SafetyClass::LowLimitFail
        } else if position >= self.far_limit.saturating_sub(self.safety_margin) {
            SafetyClass::HighLimitFail
        } else {
            SafetyClass::Safe
        }
    }

    // ── Envelope ──

    pub fn set_far_limit(&mut self, steps: i32) {
        debug!(cart_id = self.cart_id, far_limit = steps, "far limit set");
        self.far_limit = steps;
    }

    #[inline]
    pub fn far_limit(&self) -> i32 {
        self.far_limit
    }

    pub fn set_limit_safety_margin(&mut self, steps: i32) {
        self.safety_margin = steps;
    }

    pub fn set_limit_safety_margin_distance(&mut self, distance: f32) {
        self.safety_margin = self.distance_to_steps(distance);
    }

    #[inline]
    pub fn safety_margin(&self) -> i32 {
        self.safety_margin
    }

    // ── Speed ──

    /// [steps/s]
    pub fn set_speed(&mut self, speed: f32) {
        self.driver.set_speed(speed);
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.driver.speed()
    }

    /// [steps/s]
    pub fn set_max_speed(&mut self, speed: f32) {
        self.driver.set_max_speed(speed);
    }

    #[inline]
    pub fn max_speed(&self) -> f32 {
        self.driver.max_speed()
    }

    /// [mm/s]
    pub fn set_max_speed_distance(&mut self, speed: f32) {
        let steps = self.distance_to_steps(speed);
        self.driver.set_max_speed(steps as f32);
    }

    /// [mm/s²]
    pub fn set_acceleration_distance(&mut self, acceleration: f32) {
        let steps = self.distance_to_steps(acceleration);
        self.driver.set_acceleration(steps as f32);
    }

    // ── Output drive ──

    /// Energise the motor; position bookkeeping is untouched.
    pub fn enable(&mut self) {
        self.driver.enable_outputs();
    }

    /// De-energise the motor; position bookkeeping is untouched.
    pub fn disable(&mut self) {
        self.driver.disable_outputs();
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.driver.outputs_enabled()
    }
}

// ─── Axes ───────────────────────────────────────────────────────────

/// Axes shared between the main loop and the step tick.
pub type SharedAxes<D> = Arc<Mutex<Axes<D>>>;

/// Lock for the main loop. A panic elsewhere does not invalidate the
/// position bookkeeping, so poison is ignored.
pub fn lock_axes<D>(axes: &Mutex<Axes<D>>) -> MutexGuard<'_, Axes<D>> {
    axes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The configured carriages. Carriage 1 is always present.
#[derive(Debug)]
pub struct Axes<D> {
    axes: heapless::Vec<AxisController<D>, MAX_CARTS>,
}

impl<D: StepperDriver> Axes<D> {
    pub fn new(primary: AxisController<D>) -> Self {
        let mut axes = heapless::Vec::new();
        // Capacity is at least one.
        let _ = axes.push(primary);
        Self { axes }
    }

    /// Build one axis per configured carriage from `drivers`, in cart
    /// order.
    pub fn from_config(
        config: &ControllerConfig,
        drivers: impl IntoIterator<Item = D>,
    ) -> Result<Self, ControllerError> {
        let wanted = config.controller.carriages.count();
        let mut axes = heapless::Vec::new();

        for (index, driver) in drivers.into_iter().take(wanted).enumerate() {
            let cart_id = index as u8 + 1;
            let axis = AxisController::from_config(cart_id, driver, &config.stepper);
            if axes.push(axis).is_err() {
                return Err(ControllerError::InvalidCartId(cart_id));
            }
        }

        if axes.len() != wanted {
            return Err(ControllerError::InvalidCartId(axes.len() as u8 + 1));
        }
        Ok(Self { axes })
    }

    pub fn into_shared(self) -> SharedAxes<D> {
        Arc::new(Mutex::new(self))
    }

    /// Add carriage 2.
    pub fn push(&mut self, axis: AxisController<D>) -> Result<(), ControllerError> {
        let cart_id = axis.cart_id();
        self.axes
            .push(axis)
            .map_err(|_| ControllerError::InvalidCartId(cart_id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Resolve a 1-based cart id.
    pub fn get(&self, cart_id: u8) -> Result<&AxisController<D>, ControllerError> {
        usize::from(cart_id)
            .checked_sub(1)
            .and_then(|index| self.axes.get(index))
            .ok_or(ControllerError::InvalidCartId(cart_id))
    }

    /// Resolve a 1-based cart id.
    pub fn get_mut(&mut self, cart_id: u8) -> Result<&mut AxisController<D>, ControllerError> {
        usize::from(cart_id)
            .checked_sub(1)
            .and_then(|index| self.axes.get_mut(index))
            .ok_or(ControllerError::InvalidCartId(cart_id))
    }

    /// Carriage 1.
    #[inline]
    pub fn primary(&self) -> &AxisController<D> {
        &self.axes[0]
    }

    /// Carriage 1.
    #[inline]
    pub fn primary_mut(&mut self) -> &mut AxisController<D> {
        &mut self.axes[0]
    }

    /// Carriage 2, if configured.
    #[inline]
    pub fn secondary_mut(&mut self) -> Option<&mut AxisController<D>> {
        self.axes.get_mut(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisController<D>> {
        self.axes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AxisController<D>> {
        self.axes.iter_mut()
    }

    // ── Whole-rig operations ──

    pub fn run_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.run();
        }
    }

    pub fn run_speed_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.run_speed();
        }
    }

    /// Step every axis and return the first carriage that left the
    /// envelope. Every axis steps even after a failure.
    pub fn run_safe_all(&mut self) -> Option<(u8, SafetyClass)> {
        let mut first_failure = None;
        for axis in self.axes.iter_mut() {
            let class = axis.run_safe();
            if first_failure.is_none() && !class.is_safe() {
                first_failure = Some((axis.cart_id(), class));
            }
        }
        first_failure
    }

    /// Constant-speed variant of [`run_safe_all`](Self::run_safe_all).
    pub fn run_safe_speed_all(&mut self) -> Option<(u8, SafetyClass)> {
        let mut first_failure = None;
        for axis in self.axes.iter_mut() {
            let class = axis.run_safe_speed();
            if first_failure.is_none() && !class.is_safe() {
                first_failure = Some((axis.cart_id(), class));
            }
        }
        first_failure
    }

    pub fn stop_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.stop();
        }
    }

    pub fn set_speed_all(&mut self, speed: f32) {
        for axis in self.axes.iter_mut() {
            axis.set_speed(speed);
        }
    }

    /// Blocking.
    pub fn run_to_position_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.run_to_position();
        }
    }

    pub fn set_far_limit_all(&mut self, steps: i32) {
        for axis in self.axes.iter_mut() {
            axis.set_far_limit(steps);
        }
    }

    pub fn enable_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.enable();
        }
    }

    pub fn disable_all(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.disable();
        }
    }
}
