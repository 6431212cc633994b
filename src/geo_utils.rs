//! Geographic and time utilities.
//!
//! Every distance compared against a meter threshold anywhere in the crate
//! goes through [`distance_meters`], so admission, interpolation and
//! segmentation thresholds stay consistent with each other.

use chrono::{DateTime, Duration, Utc};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::{GpsPoint, Sample};

/// Great-circle distance between two GPS points in meters.
///
/// # Example
/// ```
/// use geotrack::{distance_meters, GpsPoint};
/// let a = GpsPoint::new(0.0, 0.0);
/// let b = GpsPoint::new(0.0, 1.0);
/// let d = distance_meters(&a, &b);
/// assert!((d - 111_195.0).abs() < 100.0);
/// ```
pub fn distance_meters(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Distance in meters between two samples' locations.
pub fn sample_distance<A: Sample + ?Sized, B: Sample + ?Sized>(a: &A, b: &B) -> f64 {
    distance_meters(&a.point(), &b.point())
}

/// Signed seconds from `earlier` to `later`.
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Convert a non-negative number of seconds to a chrono duration.
///
/// Values beyond what a duration can hold saturate at [`Duration::MAX`].
pub fn duration_from_seconds(seconds: f64) -> Duration {
    // float-to-int `as` saturates at i64::MAX
    let millis = (seconds * 1000.0).round() as i64;
    Duration::try_milliseconds(millis).unwrap_or(Duration::MAX)
}

/// Mean location of a set of samples and how widely they spread around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub latitude: f64,
    pub longitude: f64,
    /// Root-mean-square distance of the samples from the centroid, in meters.
    pub spread_meters: f64,
    pub sample_count: usize,
}

/// Compute the centroid of a set of samples.
///
/// Coordinates are averaged directly, which is fine for the short spans a
/// single track covers in a time window but not across the antimeridian.
/// Returns `None` for empty input.
pub fn location_centroid<S: Sample>(samples: &[S]) -> Option<Centroid> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let latitude = samples.iter().map(|s| s.latitude()).sum::<f64>() / n;
    let longitude = samples.iter().map(|s| s.longitude()).sum::<f64>() / n;

    let center = GpsPoint::new(latitude, longitude);
    let mean_sq = samples
        .iter()
        .map(|s| {
            let d = distance_meters(&s.point(), &center);
            d * d
        })
        .sum::<f64>()
        / n;

    Some(Centroid {
        latitude,
        longitude,
        spread_meters: mean_sq.sqrt(),
        sample_count: samples.len(),
    })
}
