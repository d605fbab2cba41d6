//! Diagnostic shake.

use std::io;

use cartpole_common::consts::MAX_CARTS;
use cartpole_common::protocol::Report;
use tracing::debug;

use crate::axis::Axes;
use crate::config::JiggleConfig;
use crate::hal::StepperDriver;
use crate::link::ReportSink;

/// Shake every carriage back and forth by one full step, `count` times,
/// then restore speeds, stop and report `DoJiggle`. Blocking.
pub fn jiggle<D: StepperDriver>(
    axes: &mut Axes<D>,
    config: &JiggleConfig,
    sink: &mut dyn ReportSink,
) -> io::Result<()> {
    let saved: heapless::Vec<f32, MAX_CARTS> = axes.iter().map(|axis| axis.max_speed()).collect();
    for axis in axes.iter_mut() {
        axis.set_max_speed_distance(config.speed);
    }

    let microsteps = axes.primary().geometry().microsteps as i32;
    debug!(count = config.count, microsteps, "jiggle");

    for i in 0..config.count {
        let steps = if i % 2 == 0 { microsteps } else { -microsteps };

        axes.primary_mut().move_by(steps);
        if let Some(secondary) = axes.secondary_mut() {
            secondary.move_cond(steps);
        }
        axes.run_to_position_all();
    }

    for (axis, speed) in axes.iter_mut().zip(saved) {
        axis.set_max_speed(speed);
    }
    axes.stop_all();

    sink.send(Report::DoJiggle)
}
