//! # Position Interpolation
//!
//! Answers "where was this track at time T" from the two stored samples that
//! bracket T.
//!
//! Scalar fields (latitude, longitude, altitude, precision) are blended
//! linearly, heading along the shorter arc of the circle. The closer sample
//! gets the higher weight. No answer is given when the bracketing samples are
//! too far apart in time or space to trust a straight line between them;
//! that is a normal outcome, reported as `Ok(None)`.

use chrono::{DateTime, Utc};

use crate::bracket::BracketCache;
use crate::config::{Track, TrackConfig};
use crate::error::Result;
use crate::geo_utils::{sample_distance, seconds_between};
use crate::heading::interp_heading;
use crate::store::PositionStore;
use crate::{Position, Sample};

/// Position-at-time queries for one track.
///
/// Fastest when called with non-decreasing timestamps, but any order is
/// answered correctly.
pub struct PositionInterpolator<St: PositionStore> {
    cache: BracketCache<St>,
    max_seconds: f64,
    max_meters: Option<f64>,
}

impl<St: PositionStore> PositionInterpolator<St> {
    /// Create an interpolator for `track`, applying its overrides to `global`.
    ///
    /// Malformed thresholds are rejected here rather than at query time.
    pub fn new(store: St, track: &Track, global: &TrackConfig) -> Result<Self> {
        let config = track.effective_config(global)?;
        let cache = BracketCache::with_config(store, track.id.clone(), &config)?;
        Ok(Self {
            cache,
            max_seconds: config.interpolate_max_seconds,
            max_meters: config.interpolate_max_meters,
        })
    }

    /// The underlying bracket cache (for refill statistics).
    pub fn bracket_cache(&self) -> &BracketCache<St> {
        &self.cache
    }

    /// Interpolated position of the track at `timestamp`.
    ///
    /// A sample stored exactly at `timestamp` is returned unchanged. Store
    /// failures are propagated; every "cannot interpolate" case is `Ok(None)`.
    pub fn interpolate(&mut self, timestamp: DateTime<Utc>) -> Result<Option<Position>> {
        let max_seconds = self.max_seconds;
        let max_meters = self.max_meters;

        let Some((before, after)) = self.cache.bracket(timestamp)? else {
            return Ok(None);
        };

        if before.timestamp() == timestamp {
            return Ok(Some(Position::from_sample(before)));
        }

        let after_delta = seconds_between(after.timestamp(), timestamp);
        let before_delta = seconds_between(timestamp, before.timestamp());
        let total_delta = after_delta + before_delta;

        if total_delta > max_seconds {
            return Ok(None);
        }
        if let Some(max_meters) = max_meters {
            if sample_distance(before, after) > max_meters {
                return Ok(None);
            }
        }
        if total_delta <= 0.0 {
            // sub-microsecond bracket
            let mut exact = Position::from_sample(before);
            exact.timestamp = timestamp;
            return Ok(Some(exact));
        }

        let before_weight = after_delta / total_delta;
        let after_weight = before_delta / total_delta;
        Ok(Some(interpolate_between(
            timestamp,
            before_weight,
            before,
            after_weight,
            after,
        )))
    }
}

/// Blend two samples with the given weights (expected to sum to 1).
///
/// Optional dimensions are only produced when both samples carry them. The
/// result belongs to `before`'s track and carries `timestamp`.
pub fn interpolate_between<A: Sample + ?Sized, B: Sample + ?Sized>(
    timestamp: DateTime<Utc>,
    before_weight: f64,
    before: &A,
    after_weight: f64,
    after: &B,
) -> Position {
    let lerp = |b: f64, a: f64| before_weight * b + after_weight * a;
    let lerp_opt = |b: Option<f64>, a: Option<f64>| Some(lerp(b?, a?));

    Position {
        track_id: before.track_id().to_string(),
        timestamp,
        latitude: lerp(before.latitude(), after.latitude()),
        longitude: lerp(before.longitude(), after.longitude()),
        heading: interp_heading(before_weight, before.heading(), after_weight, after.heading()),
        altitude: lerp_opt(before.altitude(), after.altitude()),
        precision_meters: lerp_opt(before.precision_meters(), after.precision_meters()),
    }
}

// ============================================================================
// Tests
// ============================================================================
