//! Conversions between print-space millimeters and EV3 motor units.
//!
//! Every axis is characterised by a single ratio: the number of motor degrees
//! turned per millimeter of travel. EV3 motors report their encoder
//! resolution as `count_per_rot` tacho counts per full turn.
//!
//! # Example
//! ```rust
//! use ev3d_core::utils::math::conversion::mm_to_tacho;
//! // Z lead with 240 deg/mm on a 360 count motor
//! assert_eq!(mm_to_tacho(1.0, 240.0, 360), 240);
//! ```

/// Degrees in one full motor rotation.
pub const DEGREES_PER_ROT: f64 = 360.0;

/// Millimeters of travel to degrees of motor rotation.
pub fn mm_to_degrees(
    mm: f64,
    deg_mm_ratio: f64,
) -> f64 {
    mm * deg_mm_ratio
}

/// Degrees of motor rotation to the nearest whole tacho count.
pub fn degrees_to_tacho(
    degrees: f64,
    count_per_rot: i32,
) -> i32 {
    (degrees * (count_per_rot as f64 / DEGREES_PER_ROT)).round() as i32
}

/// Millimeters to tacho counts.
///
/// Works the same for speeds: mm/s in, counts/s out.
pub fn mm_to_tacho(
    mm: f64,
    deg_mm_ratio: f64,
    count_per_rot: i32,
) -> i32 {
    degrees_to_tacho(mm_to_degrees(mm, deg_mm_ratio), count_per_rot)
}

/// Tacho counts back to millimeters of travel.
///
/// Returns `0.0` for a degenerate ratio or encoder resolution.
pub fn tacho_to_mm(
    counts: i32,
    deg_mm_ratio: f64,
    count_per_rot: i32,
) -> f64 {
    if deg_mm_ratio == 0.0 || count_per_rot == 0 {
        return 0.0;
    }
    let degrees = counts as f64 * DEGREES_PER_ROT / count_per_rot as f64;
    degrees / deg_mm_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_to_degrees() {
        assert_eq!(mm_to_degrees(2.0, 14.0625), 28.125);
        assert_eq!(mm_to_degrees(-1.0, 5.0), -5.0);
    }

    #[test]
    fn test_degrees_to_tacho_rounds() {
        // 720 counts per rotation doubles the degree value
        assert_eq!(degrees_to_tacho(10.2, 720), 20);
        assert_eq!(degrees_to_tacho(10.3, 720), 21);
        assert_eq!(degrees_to_tacho(-10.3, 720), -21);
    }

    #[test]
    fn test_speed_conversion_matches_reference_build() {
        // Y axis: 20 mm/s at 14.0625 deg/mm on a 360 count motor
        assert_eq!(mm_to_tacho(20.0, 14.0625, 360), 281);
        // X axis calibration speed: 10 mm/s at 5 deg/mm
        assert_eq!(mm_to_tacho(10.0, 5.0, 360), 50);
    }

    #[test]
    fn test_tacho_to_mm_inverts() {
        let counts = mm_to_tacho(12.5, 240.0, 360);
        assert!((tacho_to_mm(counts, 240.0, 360) - 12.5).abs() < 1e-9);
        assert_eq!(tacho_to_mm(100, 0.0, 360), 0.0);
    }
}
