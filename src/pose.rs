//! Field frame and the geometry the motion primitives are built on.
//!
//! Positions are in inches. Headings are compass headings in degrees: 0° faces
//! +y, 90° faces +x, and they increase clockwise, the same way the inertial
//! sensor reports them.

#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

use serde::{Deserialize, Serialize};

use crate::utils::normalize_heading;

#[derive(Default, Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_heading(heading),
        }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }

    /// Compass heading that points from this pose at `(x, y)`.
    pub fn bearing_to(&self, x: f64, y: f64) -> f64 {
        normalize_heading((x - self.x).atan2(y - self.y).to_degrees())
    }

    /// Unit vector along the pose's heading.
    pub fn direction(&self) -> (f64, f64) {
        let h = self.heading.to_radians();
        (h.sin(), h.cos())
    }

    /// The point `distance` inches ahead of this pose (behind it when negative).
    pub fn advanced(&self, distance: f64) -> (f64, f64) {
        let (dx, dy) = self.direction();
        (self.x + dx * distance, self.y + dy * distance)
    }

    /// Signed distance from this pose to `(x, y)` measured along the pose's heading.
    pub fn along_track(&self, x: f64, y: f64) -> f64 {
        let (dx, dy) = self.direction();
        (x - self.x) * dx + (y - self.y) * dy
    }
}

/// Rotates a robot-frame displacement (`forward`, `right`) into the field frame
/// for a robot facing `heading` degrees.
pub fn local_to_field(forward: f64, right: f64, heading: f64) -> (f64, f64) {
    let (s, c) = heading.to_radians().sin_cos();
    (forward * s + right * c, forward * c - right * s)
}
