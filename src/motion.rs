use core::time::Duration;

#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use log::{debug, info, warn};

use crate::{
    chassis::{Chassis, desaturate},
    config::GainSet,
    hardware::{ChassisSensors, Clock, Drivetrain},
    pid::{MotionOutcome, Pid},
    pose::Pose,
    utils::angle_error,
};

/// Per-call replacements for the active gain set's exit criteria and output ceiling.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MotionOverrides {
    pub timeout: Option<Duration>,
    pub settle_time: Option<Duration>,
    pub settle_error: Option<f64>,
    pub max_voltage: Option<f64>,
}

impl MotionOverrides {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn settle(settle_time: Duration, settle_error: f64) -> Self {
        Self {
            settle_time: Some(settle_time),
            settle_error: Some(settle_error),
            ..Self::default()
        }
    }

    fn apply(&self, mut gains: GainSet) -> GainSet {
        if let Some(timeout) = self.timeout {
            gains.timeout = timeout;
        }
        if let Some(settle_time) = self.settle_time {
            gains.settle_time = settle_time;
        }
        if let Some(settle_error) = self.settle_error {
            gains.settle_error = settle_error;
        }
        gains
    }
}

/// What one control tick decided.
enum Step {
    Drive(f64, f64),
    Done(MotionOutcome),
}

impl<D: Drivetrain, S: ChassisSensors, C: Clock> Chassis<D, S, C> {
    /// Runs `step` once per tick against a fresh pose until it reports an outcome,
    /// then stops the drivetrain.
    ///
    /// With `fixed_duration` the motion is expected to run until its timeout, so
    /// reaching it is reported as settled.
    async fn run_motion(
        &self,
        name: &'static str,
        fixed_duration: bool,
        mut step: impl FnMut(Pose, Duration) -> Step,
    ) -> MotionOutcome {
        let tick = self.config().dt;
        let started = self.clock().now();
        let mut last: Option<Duration> = None;

        let outcome = loop {
            let now = self.clock().now();
            let dt = last.map_or(tick, |prev| now.saturating_sub(prev));
            last = Some(now);

            let pose = self.update_state();
            match step(pose, dt) {
                Step::Drive(left, right) => {
                    debug!(
                        "{name}: ({:.2}, {:.2}, {:.1}°) -> [{left:.2}, {right:.2}]",
                        pose.x, pose.y, pose.heading
                    );
                    self.drive_motors(left, right);
                }
                Step::Done(outcome) => break outcome,
            }
            self.clock().sleep(tick).await;
        };
        self.stop();

        let elapsed = self.clock().now().saturating_sub(started);
        let pose = self.pose();
        match outcome {
            MotionOutcome::TimedOut if fixed_duration => {
                info!(
                    "{name}: ran for {elapsed:?}, at ({:.2}, {:.2}, {:.1}°)",
                    pose.x, pose.y, pose.heading
                );
                MotionOutcome::Settled
            }
            MotionOutcome::TimedOut => {
                warn!(
                    "{name}: timed out after {elapsed:?} at ({:.2}, {:.2}, {:.1}°)",
                    pose.x, pose.y, pose.heading
                );
                outcome
            }
            MotionOutcome::Settled => {
                info!(
                    "{name}: settled in {elapsed:?} at ({:.2}, {:.2}, {:.1}°)",
                    pose.x, pose.y, pose.heading
                );
                outcome
            }
        }
    }

    fn drive_pid(&self, overrides: &MotionOverrides) -> Pid {
        let tuning = self.tuning();
        let max = overrides
            .max_voltage
            .unwrap_or(tuning.drive_max_voltage)
            .min(self.config().max_voltage);
        Pid::new(overrides.apply(tuning.drive_gains), max)
    }

    fn turn_pid(&self, overrides: &MotionOverrides) -> Pid {
        let tuning = self.tuning();
        let max = overrides
            .max_voltage
            .unwrap_or(tuning.turn_max_voltage)
            .min(self.config().max_voltage);
        Pid::new(overrides.apply(tuning.turn_gains), max)
    }

    /// Drives `distance` inches along the current heading (backwards when negative).
    pub async fn drive_distance_with_odom(&self, distance: f64) -> MotionOutcome {
        self.drive_distance_with(distance, MotionOverrides::default()).await
    }

    pub async fn drive_distance_with_odom_time(
        &self,
        distance: f64,
        timeout: Duration,
    ) -> MotionOutcome {
        self.drive_distance_with(distance, MotionOverrides::timeout(timeout)).await
    }

    pub async fn drive_distance_with_odom_settle(
        &self,
        distance: f64,
        settle_time: Duration,
        settle_error: f64,
    ) -> MotionOutcome {
        let overrides = MotionOverrides::settle(settle_time, settle_error);
        self.drive_distance_with(distance, overrides).await
    }

    /// The error each tick is how far short of the target the robot is, measured
    /// along the heading it started with. Both sides get the same output.
    pub async fn drive_distance_with(
        &self,
        distance: f64,
        overrides: MotionOverrides,
    ) -> MotionOutcome {
        let start = self.update_state();
        let mut pid = self.drive_pid(&overrides);
        info!(
            "drive_distance: {distance:.2} in from ({:.2}, {:.2}, {:.1}°)",
            start.x, start.y, start.heading
        );

        self.run_motion("drive_distance", false, |pose, dt| {
            let error = distance - start.along_track(pose.x, pose.y);
            let output = pid.next(error, dt);
            match pid.outcome() {
                Some(outcome) => Step::Done(outcome),
                None => Step::Drive(output, output),
            }
        })
        .await
    }

    /// Turns in place to the compass heading `target`, the short way round.
    pub async fn turn_to_angle(&self, target: f64) -> MotionOutcome {
        self.turn_to_angle_with(target, MotionOverrides::default()).await
    }

    pub async fn turn_to_angle_time(&self, target: f64, timeout: Duration) -> MotionOutcome {
        self.turn_to_angle_with(target, MotionOverrides::timeout(timeout)).await
    }

    /// Turns toward `target` for exactly `duration`, never exiting early.
    pub async fn turn_to_angle_d(&self, target: f64, duration: Duration) -> MotionOutcome {
        let mut pid = self.turn_pid(&MotionOverrides::default());
        pid.gains.timeout = duration;
        pid.gains.settle_error = 0.0;
        self.turn_loop("turn_to_angle_d", true, pid, move |_| target).await
    }

    pub async fn turn_to_angle_with(
        &self,
        target: f64,
        overrides: MotionOverrides,
    ) -> MotionOutcome {
        let pid = self.turn_pid(&overrides);
        self.turn_loop("turn_to_angle", false, pid, move |_| target).await
    }

    /// Turns in place until the robot faces the field point `(x, y)`.
    pub async fn turn_to_position(&self, x: f64, y: f64) -> MotionOutcome {
        let pid = self.turn_pid(&MotionOverrides::default());
        self.turn_loop("turn_to_position", false, pid, move |pose| pose.bearing_to(x, y)).await
    }

    async fn turn_loop(
        &self,
        name: &'static str,
        fixed_duration: bool,
        mut pid: Pid,
        target: impl Fn(&Pose) -> f64,
    ) -> MotionOutcome {
        info!("{name}: {:.1}° from {:.1}°", target(&self.pose()), self.heading());
        self.run_motion(name, fixed_duration, |pose, dt| {
            let error = angle_error(target(&pose), pose.heading);
            let output = pid.next(error, dt);
            match pid.outcome() {
                Some(outcome) => Step::Done(outcome),
                None => Step::Drive(output, -output),
            }
        })
        .await
    }

    /// Turns and drives at once until the robot stops on the field point `(x, y)`.
    pub async fn move_to_position(&self, x: f64, y: f64) -> MotionOutcome {
        self.move_to_position_with(x, y, MotionOverrides::default()).await
    }

    /// The drive controller acts on the distance to the target projected onto the
    /// robot's heading, so it shrinks to nothing while the robot points the wrong
    /// way and goes negative if the robot overshoots. The turn controller steers
    /// onto the bearing. Inside the bearing lock radius it steers onto whichever
    /// of the bearing or its reverse is closer, and it stops steering once the
    /// target lies on the robot's line of travel to within half the settle band.
    ///
    /// The motion settles when the robot has stayed within the drive settle band
    /// of the target for the drive settle time. The timeout comes from the drive
    /// gains.
    pub async fn move_to_position_with(
        &self,
        x: f64,
        y: f64,
        overrides: MotionOverrides,
    ) -> MotionOutcome {
        let mut drive = self.drive_pid(&overrides);
        let mut turn = self.turn_pid(&MotionOverrides::default());
        let GainSet {
            settle_error,
            settle_time,
            ..
        } = drive.gains;
        let lock_radius = self.config().bearing_lock_radius;
        let ceiling = drive.max_output.max(turn.max_output);
        let start = self.update_state();
        info!(
            "move_to_position: ({x:.2}, {y:.2}) from ({:.2}, {:.2}, {:.1}°)",
            start.x, start.y, start.heading
        );

        let mut locked = false;
        let mut near_for = Duration::ZERO;
        self.run_motion("move_to_position", false, |pose, dt| {
            let distance = pose.distance_to(x, y);
            let heading_error = angle_error(pose.bearing_to(x, y), pose.heading);
            let (sin, cos) = heading_error.to_radians().sin_cos();

            let forward = drive.next(distance * cos, dt);

            let inside = distance < lock_radius;
            let was_locked = locked;
            locked = inside && (distance * sin).abs() < settle_error * 0.5;
            let correction = if locked {
                0.0
            } else {
                if was_locked {
                    turn.reset();
                }
                // near the target backing up is shorter than turning around
                let steer = if inside && heading_error.abs() > 90.0 {
                    heading_error - 180.0 * heading_error.signum()
                } else {
                    heading_error
                };
                turn.next(steer, dt)
            };

            if distance < settle_error {
                near_for += dt;
            } else {
                near_for = Duration::ZERO;
            }

            if drive.is_timed_out() {
                return Step::Done(MotionOutcome::TimedOut);
            }
            if distance < settle_error && near_for >= settle_time {
                return Step::Done(MotionOutcome::Settled);
            }
            let (left, right) = desaturate(forward + correction, forward - correction, ceiling);
            Step::Drive(left, right)
        })
        .await
    }
}
