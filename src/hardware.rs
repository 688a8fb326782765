//! The seams between the controller and the robot it runs on.
//!
//! On the brain these are implemented over vexide devices (`crate::vex`); on the
//! host the simulator (`crate::sim`) implements them.

use core::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeMode {
    #[default]
    Coast,
    Brake,
    Hold,
}

/// Left/right voltage-driven drive base. Commands are fire-and-forget.
pub trait Drivetrain {
    fn set_voltage(&mut self, left: f64, right: f64);
    /// Stops both sides using the current brake mode. Safe to call repeatedly.
    fn stop(&mut self);
    fn set_brake_mode(&mut self, mode: BrakeMode);
}

/// Heading sensor plus the two tracking-wheel rotation sensors.
pub trait ChassisSensors {
    /// Heading in degrees, increasing clockwise. Any continuous or wrapped range.
    fn heading(&self) -> f64;
    /// Cumulative revolutions of each tracking wheel sensor, in layout order.
    fn tracker_revolutions(&self) -> [f64; 2];
    /// Zeroes the heading and both wheel positions.
    fn reset(&mut self);
}

/// Monotonic time and an asynchronous delay.
pub trait Clock {
    /// Time since an arbitrary fixed point.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Starts a future as its own task on the current executor.
pub trait Spawner {
    /// Awaiting the handle waits for the task's output. Dropping it may cancel the task.
    type Handle<T: 'static>: Future<Output = T>;

    fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Self::Handle<T>;
}

/// Brings every actuator a macro may have driven to a stop.
pub trait Halt {
    fn halt(&self);
}

impl<F: Fn()> Halt for F {
    fn halt(&self) {
        self()
    }
}
