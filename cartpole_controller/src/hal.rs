//! Hardware seams.
//!
//! The controller core only talks to hardware through these traits:
//!
//! - [`StepperDriver`] - positioned / constant-speed micro-step primitive
//! - [`AngleSensor`] - pole angle per carriage
//! - [`LimitSwitches`] - debounced end-of-track switches
//! - [`Clock`] - wrapping microsecond counter
//! - [`Transport`] - byte stream to the host
//!
//! Real drivers and the [`sim`](crate::sim) module implement them.

use std::io::{self, Read, Write};

// ─── Stepper ────────────────────────────────────────────────────────

/// Acceleration-limited stepper primitive, in micro-steps.
///
/// `run` advances towards the target by at most one step per call and
/// returns `true` while the motor still has somewhere to go. Positions
/// are the driver's own bookkeeping and may be re-zeroed at any time.
pub trait StepperDriver: Send {
    fn current_position(&self) -> i32;

    /// Redefine the current position without moving. Also cancels any
    /// pending move.
    fn set_current_position(&mut self, position: i32);

    fn target_position(&self) -> i32;

    #[inline]
    fn distance_to_go(&self) -> i32 {
        self.target_position().wrapping_sub(self.current_position())
    }

    fn move_to(&mut self, absolute: i32);

    #[inline]
    fn move_by(&mut self, relative: i32) {
        self.move_to(self.current_position().wrapping_add(relative));
    }

    /// Positioned step. Returns `true` while still running.
    fn run(&mut self) -> bool;

    /// Constant-speed step at [`speed`](Self::speed). Returns `true` if a
    /// step was taken.
    fn run_speed(&mut self) -> bool;

    /// Block until the target is reached.
    fn run_to_position(&mut self) {
        while self.run() {}
    }

    /// Constant-speed setpoint [steps/s]; the sign selects the direction.
    fn set_speed(&mut self, speed: f32);
    fn speed(&self) -> f32;

    /// Ceiling for positioned moves [steps/s].
    fn set_max_speed(&mut self, speed: f32);
    fn max_speed(&self) -> f32;

    /// [steps/s²]
    fn set_acceleration(&mut self, acceleration: f32);

    /// Stop as quickly as the driver allows; the target becomes the stop
    /// position.
    fn stop(&mut self);

    fn enable_outputs(&mut self);
    fn disable_outputs(&mut self);
    fn outputs_enabled(&self) -> bool;
}

// ─── Angle sensing ──────────────────────────────────────────────────

/// Pole angle for a carriage.
pub trait AngleSensor {
    /// Angle in degrees for the 1-based `cart_id`.
    fn read_angle_deg(&mut self, cart_id: u8) -> f32;
}

/// Bus multiplexer: routes subsequent bus traffic to one channel.
pub trait BusSelector {
    fn select(&mut self, channel: u8);
}

/// Single-channel angle reader behind a [`BusSelector`].
pub trait AngleReader {
    fn read_angle_deg(&mut self) -> f32;
}

/// One angle reader per carriage, shared through a bus multiplexer.
///
/// Carriage `k` sits on channel `k - 1`.
#[derive(Debug)]
pub struct MuxedAngleSensor<B, R> {
    bus: B,
    reader: R,
}

impl<B: BusSelector, R: AngleReader> MuxedAngleSensor<B, R> {
    pub fn new(bus: B, reader: R) -> Self {
        Self { bus, reader }
    }

    pub fn into_parts(self) -> (B, R) {
        (self.bus, self.reader)
    }
}

impl<B: BusSelector, R: AngleReader> AngleSensor for MuxedAngleSensor<B, R> {
    fn read_angle_deg(&mut self, cart_id: u8) -> f32 {
        self.bus.select(cart_id.saturating_sub(1));
        self.reader.read_angle_deg()
    }
}

// ─── Limit switches ─────────────────────────────────────────────────

/// End of the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Near end, position zero after homing.
    Left,
    /// Far end.
    Right,
}

impl Side {
    /// Sign of travel towards this side.
    #[inline]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Debounced end-of-track switches.
pub trait LimitSwitches {
    /// Sample the inputs; edges are relative to the previous call.
    fn update(&mut self);

    fn is_pressed(&self, side: Side) -> bool;

    /// Whether the switch went from released to pressed on the last
    /// [`update`](Self::update).
    fn was_pressed(&self, side: Side) -> bool;
}

// ─── Time ───────────────────────────────────────────────────────────

/// Free-running microsecond counter. Wraps at `u32::MAX`.
pub trait Clock {
    fn micros(&self) -> u32;
}

// ─── Transport ──────────────────────────────────────────────────────

/// Byte stream to the host.
pub trait Transport: Read + Write {
    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }
}
