//! Tuning and geometry for one physical robot.
//!
//! Everything in here is calibration data: the defaults are the values the
//! competition robot was tuned with and do not carry over to another chassis.

use core::time::Duration;

#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

/// PID gains plus the exit criteria of one class of motion.
///
/// `ki` and `kd` act on the error integrated / differentiated over seconds, so a
/// gain set keeps its meaning if the tick interval changes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainSet {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Magnitude clamp for the integral term's accumulator. `0.0` leaves it unbounded.
    pub integral_limit: f64,
    /// Half-width of the band the error must stay inside to count as settled.
    pub settle_error: f64,
    #[serde(rename = "settle_time_ms", with = "millis")]
    pub settle_time: Duration,
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl GainSet {
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
        settle_error: f64,
        settle_time_ms: u64,
        timeout_ms: u64,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: 0.0,
            settle_error,
            settle_time: Duration::from_millis(settle_time_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = limit;
        self
    }

    fn validate(&self, which: &'static str) -> Result<(), ConfigError> {
        ensure!(
            self.kp >= 0.0 && self.ki >= 0.0 && self.kd >= 0.0 && self.integral_limit >= 0.0,
            NegativeGainSnafu { which }
        );
        ensure!(self.settle_error >= 0.0, NegativeGainSnafu { which });
        ensure!(
            self.timeout > self.settle_time,
            TimeoutBeforeSettleSnafu {
                which,
                settle_time: self.settle_time,
                timeout: self.timeout,
            }
        );
        Ok(())
    }
}

impl Default for GainSet {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 100, 2000)
    }
}

/// One unpowered tracking wheel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingWheel {
    /// Direction the wheel rolls in, degrees clockwise from the robot's forward axis.
    pub angle: f64,
    /// Signed perpendicular distance from the tracking center to the wheel's line of
    /// travel, positive when the center lies to the wheel's left as it rolls forward.
    /// A clockwise turn of `dθ` radians rolls the wheel back by `offset * dθ`.
    pub offset: f64,
}

/// How many tracking wheels the robot has and how they are mounted.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackerLayout {
    /// A single wheel; lateral slip is not observed.
    Single { wheel: TrackingWheel },
    /// Two wheels at different angles; the second sensor reading belongs to `second`.
    Pair {
        first: TrackingWheel,
        second: TrackingWheel,
    },
}

impl TrackerLayout {
    /// One wheel rolling forward, `offset` inches right of center.
    pub fn single(offset: f64) -> Self {
        Self::Single {
            wheel: TrackingWheel { angle: 0.0, offset },
        }
    }

    /// A forward wheel `forward_offset` inches right of center and a sideways wheel
    /// (rolling to the right) `sideways_offset` inches behind center.
    pub fn orthogonal(forward_offset: f64, sideways_offset: f64) -> Self {
        Self::Pair {
            first: TrackingWheel {
                angle: 0.0,
                offset: forward_offset,
            },
            second: TrackingWheel {
                angle: 90.0,
                offset: sideways_offset,
            },
        }
    }

    /// Two wheels splayed 45° either side of forward, left wheel first.
    pub fn diagonal(left_offset: f64, right_offset: f64) -> Self {
        Self::Pair {
            first: TrackingWheel {
                angle: -45.0,
                offset: left_offset,
            },
            second: TrackingWheel {
                angle: 45.0,
                offset: right_offset,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OdomGeometry {
    /// Tracking wheel diameter, inches.
    pub wheel_diameter: f64,
    /// Wheel revolutions per sensor revolution.
    pub gear_ratio: f64,
    pub layout: TrackerLayout,
}

impl OdomGeometry {
    pub fn wheel_circumference(&self) -> f64 {
        self.wheel_diameter * core::f64::consts::PI
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.wheel_diameter > 0.0 && self.gear_ratio > 0.0,
            WheelSnafu {
                wheel_diameter: self.wheel_diameter,
                gear_ratio: self.gear_ratio,
            }
        );
        match self.layout {
            TrackerLayout::Single { wheel } => {
                ensure!(
                    wheel.angle.to_radians().cos().abs() > 1e-3,
                    SidewaysSingleTrackerSnafu { angle: wheel.angle }
                );
            }
            TrackerLayout::Pair { first, second } => {
                let spread = (second.angle - first.angle).to_radians().sin();
                ensure!(
                    spread.abs() > 1e-3,
                    ParallelTrackersSnafu {
                        first: first.angle,
                        second: second.angle,
                    }
                );
            }
        }
        Ok(())
    }
}

impl Default for OdomGeometry {
    fn default() -> Self {
        Self {
            wheel_diameter: 1.955,
            gear_ratio: 1.0,
            layout: TrackerLayout::diagonal(-3.687, -3.867),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub geometry: OdomGeometry,
    pub drive_gains: GainSet,
    pub turn_gains: GainSet,
    /// Hardware ceiling; every command is clamped to it.
    pub max_voltage: f64,
    /// Initial output ceiling for linear motion.
    pub drive_max_voltage: f64,
    /// Initial output ceiling for angular motion.
    pub turn_max_voltage: f64,
    #[serde(rename = "dt_ms", with = "millis")]
    pub dt: Duration,
    /// Inside this distance of a move target the bearing is too noisy to steer by,
    /// so move-to-position stops correcting heading.
    pub bearing_lock_radius: f64,
}

impl ChassisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry.validate()?;
        self.drive_gains.validate("drive")?;
        self.turn_gains.validate("turn")?;
        ensure!(!self.dt.is_zero(), TickSnafu);
        ensure!(
            self.max_voltage > 0.0 && self.drive_max_voltage > 0.0 && self.turn_max_voltage > 0.0,
            VoltageSnafu {
                max_voltage: self.max_voltage,
            }
        );
        Ok(())
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            geometry: OdomGeometry::default(),
            // ki and kd converted from per-tick to per-second at a 10ms tick
            drive_gains: GainSet::new(0.5, 0.01, 0.009, 0.1, 300, 2000),
            turn_gains: GainSet::new(0.25, 0.0, 0.013, 0.2, 300, 3000),
            max_voltage: 12.0,
            drive_max_voltage: 12.0,
            turn_max_voltage: 8.0,
            dt: Duration::from_millis(10),
            bearing_lock_radius: 4.0,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display(
        "tracking wheel diameter ({wheel_diameter}) and gear ratio ({gear_ratio}) must be positive"
    ))]
    Wheel { wheel_diameter: f64, gear_ratio: f64 },
    #[snafu(display(
        "tracking wheels at {first}° and {second}° are parallel; the pose cannot be solved"
    ))]
    ParallelTrackers { first: f64, second: f64 },
    #[snafu(display("a lone tracking wheel at {angle}° cannot measure forward travel"))]
    SidewaysSingleTracker { angle: f64 },
    #[snafu(display("{which} gains must not be negative"))]
    NegativeGain { which: &'static str },
    #[snafu(display(
        "{which} timeout ({timeout:?}) must be longer than its settle time ({settle_time:?})"
    ))]
    TimeoutBeforeSettle {
        which: &'static str,
        settle_time: Duration,
        timeout: Duration,
    },
    #[snafu(display("control tick interval must be non-zero"))]
    Tick,
    #[snafu(display("voltage ceilings must be positive (max {max_voltage})"))]
    Voltage { max_voltage: f64 },
}

/// (De)serializes a [`Duration`] as whole milliseconds.
mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ChassisConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_parallel_trackers() {
        let mut config = ChassisConfig::default();
        config.geometry.layout = TrackerLayout::Pair {
            first: TrackingWheel {
                angle: 0.0,
                offset: 1.0,
            },
            second: TrackingWheel {
                angle: 180.0,
                offset: -1.0,
            },
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ParallelTrackers { .. })
        ));
    }

    #[test]
    fn rejects_timeout_shorter_than_settle() {
        let mut config = ChassisConfig::default();
        config.turn_gains = GainSet::new(0.25, 0.0, 0.0, 0.2, 500, 500);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TimeoutBeforeSettle { which: "turn", .. })
        ));
    }

    #[test]
    fn rejects_bad_wheel() {
        let mut config = ChassisConfig::default();
        config.geometry.wheel_diameter = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Wheel { .. })));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "drive_gains": { "kp": 1.5, "settle_error": 0.5, "settle_time_ms": 150, "timeout_ms": 1500 },
            "dt_ms": 20
        }"#;
        let config: ChassisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.drive_gains.kp, 1.5);
        assert_eq!(config.drive_gains.ki, 0.0);
        assert_eq!(config.drive_gains.settle_time, Duration::from_millis(150));
        assert_eq!(config.dt, Duration::from_millis(20));
        assert_eq!(config.turn_gains, ChassisConfig::default().turn_gains);
        config.validate().unwrap();
    }

    #[test]
    fn layout_round_trips_through_json() {
        let geometry = OdomGeometry {
            wheel_diameter: 2.0,
            gear_ratio: 1.0,
            layout: TrackerLayout::orthogonal(0.3, -2.0),
        };
        let text = serde_json::to_string(&geometry).unwrap();
        assert!(text.contains("\"kind\":\"pair\""));
        let back: OdomGeometry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, geometry);
    }
}
