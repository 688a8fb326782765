use core::{
    cell::{Cell, RefCell},
    time::Duration,
};

#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use log::{debug, info};

use crate::{
    config::{ChassisConfig, ConfigError, GainSet},
    hardware::{BrakeMode, ChassisSensors, Clock, Drivetrain, Halt},
    odometry::Odometry,
    pose::Pose,
};

/// Gains and output ceilings that routines may swap between motions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tuning {
    pub drive_gains: GainSet,
    pub turn_gains: GainSet,
    pub drive_max_voltage: f64,
    pub turn_max_voltage: f64,
}

pub struct ChassisArgs<D, S, C> {
    pub drivetrain: D,
    pub sensors: S,
    pub clock: C,
    pub initial_pose: Pose,
    pub config: ChassisConfig,
}

/// Odometry-tracked drive base with closed-loop motion primitives.
///
/// Every method takes `&self` so the chassis can be shared (behind an `Rc`)
/// between the driver loop and a background macro. Interior borrows never live
/// across an await point. Only one task may run a motion at a time.
pub struct Chassis<D, S, C> {
    drivetrain: RefCell<D>,
    sensors: RefCell<S>,
    odometry: RefCell<Odometry>,
    tuning: Cell<Tuning>,
    config: ChassisConfig,
    clock: C,
}

impl<D: Drivetrain, S: ChassisSensors, C: Clock> Chassis<D, S, C> {
    pub fn new(args: ChassisArgs<D, S, C>) -> Result<Self, ConfigError> {
        args.config.validate()?;
        let max = args.config.max_voltage;
        let tuning = Tuning {
            drive_gains: args.config.drive_gains,
            turn_gains: args.config.turn_gains,
            drive_max_voltage: args.config.drive_max_voltage.min(max),
            turn_max_voltage: args.config.turn_max_voltage.min(max),
        };
        let mut odometry = Odometry::new(args.initial_pose, args.config.geometry);
        odometry.update(args.sensors.heading(), args.sensors.tracker_revolutions());

        Ok(Self {
            drivetrain: RefCell::new(args.drivetrain),
            sensors: RefCell::new(args.sensors),
            odometry: RefCell::new(odometry),
            tuning: Cell::new(tuning),
            config: args.config,
            clock: args.clock,
        })
    }

    /// Reads the sensors once and advances odometry. Returns the new pose.
    pub fn update_state(&self) -> Pose {
        let (heading, revolutions) = {
            let sensors = self.sensors.borrow();
            (sensors.heading(), sensors.tracker_revolutions())
        };
        let mut odometry = self.odometry.borrow_mut();
        odometry.update(heading, revolutions);
        odometry.pose()
    }

    pub fn pose(&self) -> Pose {
        self.odometry.borrow().pose()
    }
    pub fn x(&self) -> f64 {
        self.odometry.borrow().x()
    }
    pub fn y(&self) -> f64 {
        self.odometry.borrow().y()
    }
    pub fn heading(&self) -> f64 {
        self.odometry.borrow().heading()
    }

    /// Seeds a known pose, usually once at the start of a routine.
    pub fn set_position(&self, x: f64, y: f64, heading: f64) {
        self.update_state();
        let pose = Pose::new(x, y, heading);
        self.odometry.borrow_mut().set_position(pose);
        info!("pose set to ({:.2}, {:.2}, {:.1}°)", pose.x, pose.y, pose.heading);
    }

    /// Zeroes the heading and tracking sensors without moving the pose estimate.
    pub fn reset_sensors(&self) {
        self.sensors.borrow_mut().reset();
        let mut odometry = self.odometry.borrow_mut();
        odometry.rebase();
        let sensors = self.sensors.borrow();
        odometry.update(sensors.heading(), sensors.tracker_revolutions());
    }

    pub fn tuning(&self) -> Tuning {
        self.tuning.get()
    }

    pub fn set_drive_max_voltage(&self, voltage: f64) {
        let mut tuning = self.tuning.get();
        tuning.drive_max_voltage = voltage.clamp(0.0, self.config.max_voltage);
        self.tuning.set(tuning);
    }

    pub fn set_turn_max_voltage(&self, voltage: f64) {
        let mut tuning = self.tuning.get();
        tuning.turn_max_voltage = voltage.clamp(0.0, self.config.max_voltage);
        self.tuning.set(tuning);
    }

    pub fn set_drive_constants(&self, gains: GainSet) {
        let mut tuning = self.tuning.get();
        tuning.drive_gains = gains;
        self.tuning.set(tuning);
        debug!("drive gains now {gains:?}");
    }

    pub fn set_turn_constants(&self, gains: GainSet) {
        let mut tuning = self.tuning.get();
        tuning.turn_gains = gains;
        self.tuning.set(tuning);
        debug!("turn gains now {gains:?}");
    }

    /// Puts gains and ceilings back to the configured values.
    pub fn restore_tuning(&self) {
        self.tuning.set(Tuning {
            drive_gains: self.config.drive_gains,
            turn_gains: self.config.turn_gains,
            drive_max_voltage: self.config.drive_max_voltage.min(self.config.max_voltage),
            turn_max_voltage: self.config.turn_max_voltage.min(self.config.max_voltage),
        });
    }

    pub fn brake(&self, mode: BrakeMode) {
        self.drivetrain.borrow_mut().set_brake_mode(mode);
    }

    /// Open-loop voltage to each side, clamped to the hardware ceiling.
    pub fn drive_motors(&self, left: f64, right: f64) {
        let max = self.config.max_voltage;
        self.drivetrain
            .borrow_mut()
            .set_voltage(left.clamp(-max, max), right.clamp(-max, max));
    }

    pub fn stop(&self) {
        self.drivetrain.borrow_mut().stop();
    }

    /// Waits while keeping odometry current.
    pub async fn wait(&self, duration: Duration) {
        let end = self.clock.now() + duration;
        loop {
            self.update_state();
            let now = self.clock.now();
            if now >= end {
                break;
            }
            self.clock.sleep(self.config.dt.min(end - now)).await;
        }
    }

    pub fn config(&self) -> &ChassisConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<D: Drivetrain, S: ChassisSensors, C: Clock> Halt for Chassis<D, S, C> {
    fn halt(&self) {
        self.stop();
    }
}

/// Scales a left/right pair down so neither side exceeds `max`, keeping their ratio.
pub(crate) fn desaturate(left: f64, right: f64, max: f64) -> (f64, f64) {
    let largest = left.abs().max(right.abs());
    if largest > max && largest > 0.0 {
        let scale = max / largest;
        (left * scale, right * scale)
    } else {
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desaturate_keeps_ratio() {
        let (l, r) = desaturate(18.0, 6.0, 12.0);
        assert!((l - 12.0).abs() < 1e-9);
        assert!((r - 4.0).abs() < 1e-9);
        assert_eq!(desaturate(3.0, -2.0, 12.0), (3.0, -2.0));
    }
}
