#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use crate::{
    config::{OdomGeometry, TrackerLayout},
    pose::{Pose, local_to_field},
    utils::{angle_error, normalize_heading},
};

/// Below this rotation (radians) a tick is integrated as a straight segment.
const ARC_EPSILON: f64 = 1e-9;

/// Dead-reckons the field pose from heading and tracking-wheel deltas.
pub struct Odometry {
    pose: Pose,
    geometry: OdomGeometry,
    prev_revolutions: Option<[f64; 2]>,
    prev_heading: Option<f64>,
}

impl Odometry {
    pub fn new(initial_pose: Pose, geometry: OdomGeometry) -> Self {
        Self {
            pose: initial_pose,
            geometry,
            prev_revolutions: None,
            prev_heading: None,
        }
    }

    /// Advances the pose by the motion seen since the previous update.
    ///
    /// `heading` is the raw heading sensor reading in degrees and `revolutions`
    /// the cumulative sensor revolutions of the tracking wheels, in layout order.
    /// The first update after construction or [`Odometry::rebase`] only records
    /// the readings.
    pub fn update(&mut self, heading: f64, revolutions: [f64; 2]) {
        let (Some(prev_revs), Some(prev_heading)) = (self.prev_revolutions, self.prev_heading)
        else {
            self.prev_revolutions = Some(revolutions);
            self.prev_heading = Some(heading);
            return;
        };
        self.prev_revolutions = Some(revolutions);
        self.prev_heading = Some(heading);

        let inches_per_rev = self.geometry.wheel_circumference() * self.geometry.gear_ratio;
        let travel = [
            (revolutions[0] - prev_revs[0]) * inches_per_rev,
            (revolutions[1] - prev_revs[1]) * inches_per_rev,
        ];
        let dtheta_deg = angle_error(heading, prev_heading);
        let dtheta = dtheta_deg.to_radians();

        let (forward, right) = self.local_translation(travel, dtheta);
        // straight segment vs chord of the arc swept this tick
        let chord_scale = if dtheta.abs() < ARC_EPSILON {
            1.0
        } else {
            2.0 * (dtheta / 2.0).sin() / dtheta
        };

        let mid_heading = self.pose.heading + dtheta_deg / 2.0;
        let (dx, dy) = local_to_field(forward * chord_scale, right * chord_scale, mid_heading);
        self.pose.x += dx;
        self.pose.y += dy;
        self.pose.heading = normalize_heading(self.pose.heading + dtheta_deg);
    }

    /// Robot-frame (forward, right) travel of the tracking center, with the part of
    /// each wheel's travel that came from rotation removed.
    fn local_translation(&self, travel: [f64; 2], dtheta: f64) -> (f64, f64) {
        match self.geometry.layout {
            TrackerLayout::Single { wheel } => {
                let t = travel[0] + wheel.offset * dtheta;
                (t / wheel.angle.to_radians().cos(), 0.0)
            }
            TrackerLayout::Pair { first, second } => {
                let t1 = travel[0] + first.offset * dtheta;
                let t2 = travel[1] + second.offset * dtheta;
                let (s1, c1) = first.angle.to_radians().sin_cos();
                let (s2, c2) = second.angle.to_radians().sin_cos();
                let det = c1 * s2 - s1 * c2;
                ((t1 * s2 - t2 * s1) / det, (c1 * t2 - c2 * t1) / det)
            }
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }
    pub fn x(&self) -> f64 {
        self.pose.x
    }
    pub fn y(&self) -> f64 {
        self.pose.y
    }
    pub fn heading(&self) -> f64 {
        self.pose.heading
    }

    /// Overwrites the pose. Sensor baselines are kept, so the next update only
    /// measures motion from here on.
    pub fn set_position(&mut self, pose: Pose) {
        self.pose = Pose::new(pose.x, pose.y, pose.heading);
    }

    /// Forgets the sensor baselines, for use after the sensors were zeroed.
    pub fn rebase(&mut self) {
        self.prev_revolutions = None;
        self.prev_heading = None;
    }
}

#[cfg(test)]
mod tests {
    use core::f64::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::config::TrackingWheel;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Unit-circumference wheels so revolutions read directly as inches.
    fn geometry(layout: TrackerLayout) -> OdomGeometry {
        OdomGeometry {
            wheel_diameter: 1.0 / PI,
            gear_ratio: 1.0,
            layout,
        }
    }

    fn tracker(layout: TrackerLayout) -> Odometry {
        let mut odom = Odometry::new(Pose::default(), geometry(layout));
        odom.update(0.0, [0.0, 0.0]);
        odom
    }

    #[test]
    fn first_update_only_records() {
        let single = geometry(TrackerLayout::single(0.0));
        let mut odom = Odometry::new(Pose::new(1.0, 2.0, 30.0), single);
        odom.update(123.0, [50.0, -7.0]);
        assert_eq!(odom.pose(), Pose::new(1.0, 2.0, 30.0));
    }

    #[test]
    fn straight_forward_travel() {
        let mut odom = tracker(TrackerLayout::orthogonal(1.5, 2.0));
        odom.update(0.0, [12.0, 0.0]);
        assert!(close(odom.x(), 0.0));
        assert!(close(odom.y(), 12.0));
    }

    #[test]
    fn diagonal_wheels_resolve_forward_and_strafe() {
        let mut odom = tracker(TrackerLayout::diagonal(-3.687, -3.867));
        let half = 10.0 / 2f64.sqrt();
        // forward: both wheels see cos 45° of the travel
        odom.update(0.0, [half, half]);
        assert!(close(odom.x(), 0.0));
        assert!(close(odom.y(), 10.0));
        // strafe right: the left-splayed wheel rolls backwards
        odom.update(0.0, [0.0, 2.0 * half]);
        assert!(close(odom.x(), 10.0));
        assert!(close(odom.y(), 10.0));
    }

    #[test]
    fn travel_is_rotated_by_heading() {
        let single = geometry(TrackerLayout::single(0.0));
        let mut odom = Odometry::new(Pose::new(-47.0, 15.0, 90.0), single);
        odom.update(0.0, [0.0, 0.0]);
        odom.update(0.0, [16.0, 0.0]);
        assert!(close(odom.x(), -31.0));
        assert!(close(odom.y(), 15.0));
        assert!(close(odom.heading(), 90.0));
    }

    #[test]
    fn turning_in_place_does_not_translate() {
        let layout = TrackerLayout::diagonal(-3.687, -3.867);
        let (first, second) = match layout {
            TrackerLayout::Pair { first, second } => (first, second),
            TrackerLayout::Single { .. } => unreachable!(),
        };
        let mut odom = tracker(layout);
        let dtheta = 30f64.to_radians();
        odom.update(30.0, [-first.offset * dtheta, -second.offset * dtheta]);
        assert!(close(odom.x(), 0.0));
        assert!(close(odom.y(), 0.0));
        assert!(close(odom.heading(), 30.0));
    }

    #[test]
    fn quarter_arc_lands_on_the_circle() {
        // right-hand quarter circle of radius 20 swept in a single tick
        let mut odom = tracker(TrackerLayout::orthogonal(0.0, 0.0));
        odom.update(90.0, [20.0 * FRAC_PI_2, 0.0]);
        assert!((odom.x() - 20.0).abs() < 1e-9);
        assert!((odom.y() - 20.0).abs() < 1e-9);
        assert!(close(odom.heading(), 90.0));
    }

    #[test]
    fn arc_correction_beats_straight_segments() {
        // same quarter circle in 4 ticks; the chord form stays exact
        let mut odom = tracker(TrackerLayout::orthogonal(0.0, 0.0));
        let step = 20.0 * FRAC_PI_2 / 4.0;
        for i in 1..=4 {
            odom.update(22.5 * i as f64, [step * i as f64, 0.0]);
        }
        assert!((odom.x() - 20.0).abs() < 1e-9);
        assert!((odom.y() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn heading_sensor_wraparound_is_a_small_turn() {
        let single = geometry(TrackerLayout::single(0.0));
        let mut odom = Odometry::new(Pose::new(0.0, 0.0, 5.0), single);
        odom.update(359.0, [0.0, 0.0]);
        odom.update(1.0, [0.0, 0.0]);
        assert!(close(odom.heading(), 7.0));
    }

    #[test]
    fn retracing_the_path_returns_to_the_start() {
        let start = Pose::new(-46.0, 10.5, 180.0);
        let mut odom = Odometry::new(
            start,
            geometry(TrackerLayout::Pair {
                first: TrackingWheel { angle: -45.0, offset: -3.687 },
                second: TrackingWheel { angle: 45.0, offset: -3.867 },
            }),
        );
        let path: [(f64, [f64; 2]); 6] = [
            (0.0, [0.0, 0.0]),
            (3.0, [4.0, 5.5]),
            (17.0, [9.0, 8.0]),
            (350.0, [12.5, 20.0]),
            (340.0, [11.0, 26.0]),
            (10.0, [30.0, 31.0]),
        ];
        for (heading, revs) in path {
            odom.update(heading, revs);
        }
        assert!(odom.pose() != start);
        for (heading, revs) in path.iter().rev() {
            odom.update(*heading, *revs);
        }
        let end = odom.pose();
        assert!((end.x - start.x).abs() < 1e-9);
        assert!((end.y - start.y).abs() < 1e-9);
        assert!((angle_error(end.heading, start.heading)).abs() < 1e-9);
    }

    #[test]
    fn set_position_keeps_baselines() {
        let mut odom = tracker(TrackerLayout::single(0.0));
        odom.update(0.0, [5.0, 0.0]);
        odom.set_position(Pose::new(10.0, 10.0, 270.0));
        odom.update(0.0, [8.0, 0.0]);
        assert!(close(odom.x(), 7.0));
        assert!(close(odom.y(), 10.0));
        assert!(close(odom.heading(), 270.0));
    }

    #[test]
    fn rebase_ignores_zeroed_sensors() {
        let mut odom = tracker(TrackerLayout::single(0.0));
        odom.update(0.0, [5.0, 0.0]);
        odom.rebase();
        odom.update(0.0, [0.0, 0.0]);
        assert!(close(odom.y(), 5.0));
    }
}
