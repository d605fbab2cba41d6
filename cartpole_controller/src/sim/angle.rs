//! Simulated pole encoders behind a bus multiplexer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use cartpole_common::consts::MAX_CARTS;

use crate::hal::{AngleReader, BusSelector, MuxedAngleSensor};

/// Shared encoder state: the selected bus channel and one angle per
/// channel, stored as `f32` bits.
#[derive(Debug, Default)]
pub struct SimAngles {
    selected: AtomicU8,
    angles: [AtomicU32; MAX_CARTS],
}

/// Simulated sensor as the controller sees it.
pub type SimAngleSensor = MuxedAngleSensor<SimBus, SimEncoder>;

impl SimAngles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pole angle presented to the encoder of `cart_id`.
    pub fn set_angle(&self, cart_id: u8, degrees: f32) {
        if let Some(slot) = self.angles.get(usize::from(cart_id.saturating_sub(1))) {
            slot.store(degrees.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn selected_channel(&self) -> u8 {
        self.selected.load(Ordering::Relaxed)
    }

    pub fn sensor(self: &Arc<Self>) -> SimAngleSensor {
        MuxedAngleSensor::new(SimBus(Arc::clone(self)), SimEncoder(Arc::clone(self)))
    }
}

/// Multiplexer half.
#[derive(Debug)]
pub struct SimBus(Arc<SimAngles>);

impl BusSelector for SimBus {
    fn select(&mut self, channel: u8) {
        self.0.selected.store(channel, Ordering::Relaxed);
    }
}

/// Encoder half: reads whichever channel is selected.
#[derive(Debug)]
pub struct SimEncoder(Arc<SimAngles>);

impl AngleReader for SimEncoder {
    fn read_angle_deg(&mut self) -> f32 {
        let channel = usize::from(self.0.selected.load(Ordering::Relaxed));
        self.0
            .angles
            .get(channel)
            .map_or(0.0, |bits| f32::from_bits(bits.load(Ordering::Relaxed)))
    }
}
