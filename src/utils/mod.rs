#[cfg(target_vendor = "vex")]
use vexide::prelude::Float;

pub mod units;

/// Wraps a compass heading into `[0, 360)` degrees.
pub fn normalize_heading(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest signed rotation that takes `current` onto `target`, in `(-180, 180]` degrees.
///
/// Positive values are clockwise.
pub fn angle_error(target: f64, current: f64) -> f64 {
    let diff = normalize_heading(target - current);
    if diff > 180.0 { diff - 360.0 } else { diff }
}
