//! Conversions into the chassis' native unit, inches.

pub fn ft(from_feet: f64) -> f64 {
    from_feet * 12.0
}
/// One foam field tile.
pub fn tile(from_tiles: f64) -> f64 {
    from_tiles * 24.0
}
pub fn m(from_meters: f64) -> f64 {
    from_meters * 39.3701
}
pub fn cm(from_centimeters: f64) -> f64 {
    from_centimeters * 0.393701
}
pub fn mm(from_millimeters: f64) -> f64 {
    from_millimeters / 25.4
}
