#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use serde::{Deserialize, Serialize};

use crate::{
    chassis::{Chassis, desaturate},
    hardware::{ChassisSensors, Clock, Drivetrain},
};

/// Joystick axes, each in `[-1, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Sticks {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
}

/// How the sticks map onto the two sides of the drive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverProfile {
    /// Left stick drives the left side, right stick the right side.
    Tank,
    /// Left stick throttle, right stick turn.
    #[default]
    Arcade,
}

impl DriverProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tank => "tank",
            Self::Arcade => "arcade",
        }
    }

    /// Left/right output as a fraction of full voltage.
    pub fn mix(&self, sticks: Sticks, shaping: StickShaping) -> (f64, f64) {
        match self {
            Self::Tank => (shaping.apply(sticks.left_y), shaping.apply(sticks.right_y)),
            Self::Arcade => {
                let throttle = shaping.apply(sticks.left_y);
                let turn = shaping.apply(sticks.right_x);
                desaturate(throttle + turn, throttle - turn, 1.0)
            }
        }
    }
}

/// Deadband and expo curve applied to each stick before mixing.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickShaping {
    pub deadband: f64,
    /// Curve steepness. `0.0` is linear; larger values soften the middle of the stick.
    pub curve: f64,
}

impl StickShaping {
    pub const LINEAR: Self = Self {
        deadband: 0.0,
        curve: 0.0,
    };

    pub fn apply(&self, input: f64) -> f64 {
        if input.abs() < self.deadband {
            return 0.0;
        }
        drive_curve(input.clamp(-1.0, 1.0) * 127.0, self.curve) / 127.0
    }
}

impl Default for StickShaping {
    fn default() -> Self {
        Self {
            deadband: 0.05,
            curve: 5.0,
        }
    }
}

// https://www.desmos.com/calculator/7oyvwwpmed
fn drive_curve(x: f64, t: f64) -> f64 {
    ((-t / 10.0).exp() + ((x.abs() - 127.0) / 10.0).exp() * (1.0 - (-t / 10.0).exp())) * x
}

impl<D: Drivetrain, S: ChassisSensors, C: Clock> Chassis<D, S, C> {
    /// Sticks straight to voltage, left side on the left stick.
    pub fn tank(&self, sticks: Sticks) {
        self.drive_with(DriverProfile::Tank, StickShaping::LINEAR, sticks);
    }

    /// Sticks straight to voltage, throttle on the left stick and turn on the right.
    pub fn arcade(&self, sticks: Sticks) {
        self.drive_with(DriverProfile::Arcade, StickShaping::LINEAR, sticks);
    }

    /// One driver-control tick: keeps odometry running and applies the sticks.
    pub fn drive_with(&self, profile: DriverProfile, shaping: StickShaping, sticks: Sticks) {
        self.update_state();
        let (left, right) = profile.mix(sticks, shaping);
        let max = self.config().max_voltage;
        self.drive_motors(left * max, right * max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OdomGeometry,
        pose::Pose,
        sim::{SimRobot, SimRuntime, sim_config},
    };

    #[test]
    fn curve_keeps_the_ends_and_softens_the_middle() {
        let shaping = StickShaping::default();
        assert!((shaping.apply(1.0) - 1.0).abs() < 1e-9);
        assert!((shaping.apply(-1.0) + 1.0).abs() < 1e-9);
        let half = shaping.apply(0.5);
        assert!(half > 0.0 && half < 0.5);
        assert_eq!(shaping.apply(0.03), 0.0);
        assert_eq!(StickShaping::LINEAR.apply(0.3), 0.3 * 127.0 / 127.0);
    }

    #[test]
    fn arcade_mixes_throttle_and_turn() {
        let sticks = Sticks {
            left_y: 0.5,
            right_x: 0.25,
            ..Sticks::default()
        };
        let (l, r) = DriverProfile::Arcade.mix(sticks, StickShaping::LINEAR);
        assert!((l - 0.75).abs() < 1e-9);
        assert!((r - 0.25).abs() < 1e-9);

        let full = Sticks {
            left_y: 1.0,
            right_x: 1.0,
            ..Sticks::default()
        };
        let (l, r) = DriverProfile::Arcade.mix(full, StickShaping::LINEAR);
        assert!((l - 1.0).abs() < 1e-9);
        assert!(r.abs() < 1e-9);
    }

    #[test]
    fn tank_maps_each_stick_to_its_side() {
        let runtime = SimRuntime::new();
        let robot = SimRobot::new(&runtime, OdomGeometry::default(), Pose::default());
        let chassis = robot.chassis(sim_config()).unwrap();
        chassis.tank(Sticks {
            left_y: 1.0,
            right_y: -0.5,
            ..Sticks::default()
        });
        assert_eq!(robot.voltage(), (12.0, -6.0));
    }
}
