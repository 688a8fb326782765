//! The hardware seams over vexide devices.

use core::{future::Future, time::Duration};

use log::{info, warn};
use vexide::{
    devices::{
        controller::ControllerState,
        smart::motor::BrakeMode as MotorBrake,
    },
    prelude::*,
    task::Task,
    time::Instant,
};

use crate::{
    driver_control::Sticks,
    hardware::{BrakeMode, ChassisSensors, Clock, Drivetrain, Spawner},
    mechanism::{Alliance, Solenoid, Spinner},
};

/// Proximity above which something is close enough to the optical sensor for
/// its hue to mean anything.
const PROXIMITY_THRESHOLD: f64 = 0.35;

/// Time and tasks from the vexide runtime, measured from construction.
#[derive(Copy, Clone, Debug)]
pub struct VexRuntime {
    start: Instant,
}

impl VexRuntime {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for VexRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VexRuntime {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        sleep(duration)
    }
}

impl Spawner for VexRuntime {
    type Handle<T: 'static> = Task<T>;

    fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Task<T> {
        spawn(future)
    }
}

/// Two equal motor groups, one per side.
pub struct MotorDrivetrain<const N: usize> {
    left: [Motor; N],
    right: [Motor; N],
    brake_mode: BrakeMode,
}

impl<const N: usize> MotorDrivetrain<N> {
    pub fn new(left: [Motor; N], right: [Motor; N]) -> Self {
        Self {
            left,
            right,
            brake_mode: BrakeMode::default(),
        }
    }

    fn motors(&mut self) -> impl Iterator<Item = &mut Motor> {
        self.left.iter_mut().chain(self.right.iter_mut())
    }
}

impl<const N: usize> Drivetrain for MotorDrivetrain<N> {
    fn set_voltage(&mut self, left: f64, right: f64) {
        for m in self.left.iter_mut() {
            let _ = m.set_voltage(left);
        }
        for m in self.right.iter_mut() {
            let _ = m.set_voltage(right);
        }
    }

    fn stop(&mut self) {
        let mode = motor_brake(self.brake_mode);
        for m in self.motors() {
            let _ = m.brake(mode);
        }
    }

    fn set_brake_mode(&mut self, mode: BrakeMode) {
        self.brake_mode = mode;
    }
}

fn motor_brake(mode: BrakeMode) -> MotorBrake {
    match mode {
        BrakeMode::Coast => MotorBrake::Coast,
        BrakeMode::Brake => MotorBrake::Brake,
        BrakeMode::Hold => MotorBrake::Hold,
    }
}

/// Inertial sensor for heading plus one or two tracking wheels on rotation
/// sensors. A missing second wheel reads zero.
pub struct ImuTrackers {
    imu: InertialSensor,
    first: RotationSensor,
    second: Option<RotationSensor>,
}

impl ImuTrackers {
    /// Calibrates the IMU before returning. A failed calibration is logged and
    /// the sensor is used as is.
    pub async fn new(
        mut imu: InertialSensor,
        first: RotationSensor,
        second: Option<RotationSensor>,
    ) -> Self {
        match imu.calibrate().await {
            Ok(()) => info!("IMU calibrated"),
            Err(e) => warn!("IMU calibration failed: {e:?}"),
        }
        let mut sensors = Self { imu, first, second };
        sensors.reset();
        sensors
    }
}

impl ChassisSensors for ImuTrackers {
    fn heading(&self) -> f64 {
        self.imu.heading().unwrap_or_default()
    }

    fn tracker_revolutions(&self) -> [f64; 2] {
        let first = self.first.position().unwrap_or_default().as_revolutions();
        let second = self
            .second
            .as_ref()
            .map_or(0.0, |s| s.position().unwrap_or_default().as_revolutions());
        [first, second]
    }

    fn reset(&mut self) {
        let _ = self.imu.reset_heading();
        let _ = self.first.reset_position();
        if let Some(second) = self.second.as_mut() {
            let _ = second.reset_position();
        }
    }
}

impl Solenoid for AdiDigitalOut {
    fn set_extended(&mut self, extended: bool) {
        let _ = if extended { self.set_high() } else { self.set_low() };
    }
}

impl<const N: usize> Spinner for [Motor; N] {
    fn set_voltage(&mut self, voltage: f64) {
        for m in self.iter_mut() {
            let _ = m.set_voltage(voltage);
        }
    }

    fn stop(&mut self) {
        for m in self.iter_mut() {
            let _ = m.brake(MotorBrake::Coast);
        }
    }
}

pub fn sticks(state: &ControllerState) -> Sticks {
    Sticks {
        left_x: state.left_stick.x(),
        left_y: state.left_stick.y(),
        right_x: state.right_stick.x(),
        right_y: state.right_stick.y(),
    }
}

/// The colour of whatever sits in front of the sorting sensor, if anything.
pub fn ball_colour(sensor: &OpticalSensor) -> Option<Alliance> {
    if sensor.proximity().unwrap_or_default() <= PROXIMITY_THRESHOLD {
        return None;
    }
    Alliance::from_hue(sensor.hue().ok()?)
}
