//! Controller configuration.
//!
//! Loaded from a single TOML file through [`ConfigLoader`]; every field has
//! a default so an empty file (or no file) yields the reference rig.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "cartpole-rig-01"
//!
//! [controller]
//! carriages = "two"
//! observation_interval_us = 4000
//!
//! [speeds]
//! ultra_fast = 350.0
//! ```

use std::f32::consts::PI;
use std::path::Path;
use std::time::Duration;

use cartpole_common::config::{ConfigError, ConfigLoader, SharedConfig};
use serde::{Deserialize, Serialize};

// ─── Defaults ───────────────────────────────────────────────────────

/// Step timer period [µs].
pub const DEFAULT_STEP_PERIOD_US: u32 = 10;
/// Telemetry period while an experiment runs [µs].
pub const DEFAULT_OBSERVATION_INTERVAL_US: u32 = 4000;
/// Upper bound for speeds set by the host [mm/s].
pub const DEFAULT_MAX_SETTABLE_SPEED: f32 = 400.0 * 40.0;

fn default_step_period_us() -> u32 {
    DEFAULT_STEP_PERIOD_US
}

fn default_observation_interval_us() -> u32 {
    DEFAULT_OBSERVATION_INTERVAL_US
}

fn default_max_settable_speed() -> f32 {
    DEFAULT_MAX_SETTABLE_SPEED
}

fn default_microsteps() -> u32 {
    8
}

fn default_steps_per_rotation() -> u32 {
    200
}

fn default_distance_per_rotation() -> f32 {
    PI * 13.0
}

fn default_angle_per_rotation() -> f32 {
    360.0
}

fn default_max_acceleration() -> f32 {
    3000.0
}

fn default_default_speed() -> f32 {
    50.0
}

fn default_limit_safety_margin() -> f32 {
    20.0
}

fn default_retraction_distance() -> f32 {
    5.0
}

fn default_check_margin_distance() -> f32 {
    10.0
}

fn default_big_distance() -> f32 {
    5000.0
}

fn default_jiggle_count() -> u16 {
    50
}

fn default_jiggle_speed() -> f32 {
    SpeedConfig::default().super_fast
}

// ─── Sections ───────────────────────────────────────────────────────

/// Number of carriages mounted on the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carriages {
    #[default]
    One,
    Two,
}

impl Carriages {
    #[inline]
    pub const fn count(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// `[controller]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSection {
    #[serde(default)]
    pub carriages: Carriages,
    #[serde(default = "default_step_period_us")]
    pub step_period_us: u32,
    #[serde(default = "default_observation_interval_us")]
    pub observation_interval_us: u32,
    /// Ceiling for SetVelocity/SetMaxVelocity increments [mm/s].
    #[serde(default = "default_max_settable_speed")]
    pub max_settable_speed: f32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            carriages: Carriages::default(),
            step_period_us: DEFAULT_STEP_PERIOD_US,
            observation_interval_us: DEFAULT_OBSERVATION_INTERVAL_US,
            max_settable_speed: DEFAULT_MAX_SETTABLE_SPEED,
        }
    }
}

impl ControllerSection {
    #[inline]
    pub fn step_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.step_period_us))
    }
}

/// `[stepper]` section: drive geometry shared by all carriages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperConfig {
    #[serde(default = "default_microsteps")]
    pub microsteps: u32,
    #[serde(default = "default_steps_per_rotation")]
    pub steps_per_rotation: u32,
    /// Belt travel per motor revolution [mm].
    #[serde(default = "default_distance_per_rotation")]
    pub distance_per_rotation: f32,
    /// [deg]
    #[serde(default = "default_angle_per_rotation")]
    pub angle_per_rotation: f32,
    /// [mm/s²]
    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f32,
    /// Positioned-move speed after startup [mm/s].
    #[serde(default = "default_default_speed")]
    pub default_speed: f32,
    /// Soft-limit buffer inside the measured track [mm].
    #[serde(default = "default_limit_safety_margin")]
    pub limit_safety_margin: f32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            microsteps: default_microsteps(),
            steps_per_rotation: default_steps_per_rotation(),
            distance_per_rotation: default_distance_per_rotation(),
            angle_per_rotation: default_angle_per_rotation(),
            max_acceleration: default_max_acceleration(),
            default_speed: default_default_speed(),
            limit_safety_margin: default_limit_safety_margin(),
        }
    }
}

/// `[speeds]` section: named speed levels [mm/s].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub slow: f32,
    pub medium: f32,
    pub fast: f32,
    pub very_fast: f32,
    pub super_fast: f32,
    pub ultra_fast: f32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            slow: 10.0,
            medium: 50.0,
            fast: 75.0,
            very_fast: 150.0,
            super_fast: 200.0,
            ultra_fast: 400.0,
        }
    }
}

/// `[homing]` section [mm].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomingConfig {
    /// Back-off after a fast switch hit.
    #[serde(default = "default_retraction_distance")]
    pub retraction_distance: f32,
    /// Absolute target of the quick approach that opens a limit check.
    #[serde(default = "default_check_margin_distance")]
    pub check_margin_distance: f32,
    /// Length of each open-ended seek move.
    #[serde(default = "default_big_distance")]
    pub big_distance: f32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            retraction_distance: default_retraction_distance(),
            check_margin_distance: default_check_margin_distance(),
            big_distance: default_big_distance(),
        }
    }
}

/// `[jiggle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiggleConfig {
    /// Number of half-oscillations.
    #[serde(default = "default_jiggle_count")]
    pub count: u16,
    /// [mm/s]
    #[serde(default = "default_jiggle_speed")]
    pub speed: f32,
}

impl Default for JiggleConfig {
    fn default() -> Self {
        Self {
            count: default_jiggle_count(),
            speed: default_jiggle_speed(),
        }
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Complete controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub stepper: StepperConfig,
    #[serde(default)]
    pub speeds: SpeedConfig,
    #[serde(default)]
    pub homing: HomingConfig,
    #[serde(default)]
    pub jiggle: JiggleConfig,
}

impl ControllerConfig {
    /// Load from `path` and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter bounds and the speed ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.controller.step_period_us == 0 {
            return fail("controller.step_period_us must be > 0");
        }
        if !(self.controller.max_settable_speed > 0.0) {
            return fail("controller.max_settable_speed must be > 0");
        }
        if self.stepper.microsteps == 0 {
            return fail("stepper.microsteps must be > 0");
        }
        if self.stepper.steps_per_rotation == 0 {
            return fail("stepper.steps_per_rotation must be > 0");
        }
        if !(self.stepper.distance_per_rotation > 0.0) {
            return fail("stepper.distance_per_rotation must be > 0");
        }
        if !(self.stepper.angle_per_rotation > 0.0) {
            return fail("stepper.angle_per_rotation must be > 0");
        }
        if self.stepper.limit_safety_margin < 0.0 {
            return fail("stepper.limit_safety_margin must be >= 0");
        }

        let s = &self.speeds;
        let levels = [
            ("slow", s.slow),
            ("medium", s.medium),
            ("fast", s.fast),
            ("very_fast", s.very_fast),
            ("super_fast", s.super_fast),
            ("ultra_fast", s.ultra_fast),
            ("stepper.default_speed", self.stepper.default_speed),
            ("stepper.max_acceleration", self.stepper.max_acceleration),
            ("jiggle.speed", self.jiggle.speed),
        ];
        if let Some((name, _)) = levels.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be > 0"
            )));
        }
        if !(s.slow <= s.medium && s.medium <= s.fast && s.fast <= s.ultra_fast) {
            return fail("speeds must satisfy slow <= medium <= fast <= ultra_fast");
        }

        Ok(())
    }
}
