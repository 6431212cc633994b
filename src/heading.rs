//! Circular interpolation on the 0-360 degree heading circle.
//!
//! A plain weighted mean of 350° and 10° lands on 180°, the wrong side of the
//! circle. The two points antipodal on the circle, `h` and `h + 180`, are both
//! "means" of the inputs; the one lying on the short arc between the inputs is
//! within 90° of at least one of them.

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Unsigned distance between two headings along the shorter arc, in `[0, 180]`.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Interpolate between two headings along the shorter arc.
///
/// Weights are expected to sum to 1. Returns `None` if either heading is
/// missing. When the inputs are exactly antipodal with equal weights, both
/// arcs are equally short and the weighted linear mean is returned.
///
/// # Example
/// ```
/// use geotrack::interp_heading;
/// let h = interp_heading(0.5, Some(350.0), 0.5, Some(10.0)).unwrap();
/// assert!(h.abs() < 1e-9 || (h - 360.0).abs() < 1e-9);
/// ```
pub fn interp_heading(
    before_weight: f64,
    before: Option<f64>,
    after_weight: f64,
    after: Option<f64>,
) -> Option<f64> {
    let (before, after) = (before?, after?);

    let linear = normalize_degrees(before_weight * before + after_weight * after);
    let opposite = normalize_degrees(linear + 180.0);

    let near_an_endpoint =
        |h: f64| angular_distance(h, before).min(angular_distance(h, after)) < 90.0;

    if near_an_endpoint(linear) {
        Some(linear)
    } else if near_an_endpoint(opposite) {
        Some(opposite)
    } else {
        Some(linear)
    }
}
