//! # Track Segmentation
//!
//! Splits an ordered track into polylines wherever consecutive samples are
//! farther apart than a break distance, and reports path length with those
//! breaks excluded so sensor gaps do not inflate the total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Track, TrackConfig};
use crate::error::Result;
use crate::geo_utils::sample_distance;
use crate::store::PositionStore;
use crate::{GpsPoint, Sample};

/// One continuous polyline of a track, with a timestamp per point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<GpsPoint>,
    pub timestamps: Vec<DateTime<Utc>>,
}

impl Segment {
    fn push<S: Sample + ?Sized>(&mut self, sample: &S) {
        self.points.push(sample.point());
        self.timestamps.push(sample.timestamp());
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn is_break(step_meters: f64, break_distance_meters: Option<f64>) -> bool {
    break_distance_meters.map_or(false, |limit| step_meters > limit)
}

/// Split `samples` (ascending by timestamp) into polylines.
///
/// A new polyline starts whenever the step from the previous sample exceeds
/// `break_distance_meters`. With no break distance the whole input is one
/// polyline. Every returned segment is non-empty; empty input gives none.
pub fn segment_track<S: Sample>(samples: &[S], break_distance_meters: Option<f64>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Segment::default();

    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            let step = sample_distance(&samples[i - 1], sample);
            if is_break(step, break_distance_meters) && !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(sample);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Total path length in meters, not counting steps longer than the break
/// distance.
pub fn capped_distance<S: Sample>(samples: &[S], break_distance_meters: Option<f64>) -> f64 {
    samples
        .windows(2)
        .map(|w| sample_distance(&w[0], &w[1]))
        .filter(|&step| !is_break(step, break_distance_meters))
        .sum()
}

/// One row of a per-sample distance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRow {
    /// Whole seconds since the Unix epoch
    pub epoch: i64,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters from the previous sample (0 for the first row)
    pub distance: f64,
    /// `distance`, or 0 when the step is a segment break
    pub capped_distance: f64,
    /// Running sum of `capped_distance`
    pub cumulative_distance: f64,
}

/// Per-sample distances along a track, suitable for tabular export.
pub fn distance_report<S: Sample>(
    samples: &[S],
    break_distance_meters: Option<f64>,
) -> Vec<DistanceRow> {
    let mut rows = Vec::with_capacity(samples.len());
    let mut cumulative = 0.0;
    let mut prev: Option<&S> = None;

    for sample in samples {
        let distance = prev.map_or(0.0, |p| sample_distance(p, sample));
        let capped = if is_break(distance, break_distance_meters) {
            0.0
        } else {
            distance
        };
        cumulative += capped;

        let timestamp = sample.timestamp();
        rows.push(DistanceRow {
            epoch: timestamp.timestamp(),
            timestamp,
            latitude: sample.latitude(),
            longitude: sample.longitude(),
            distance,
            capped_distance: capped,
            cumulative_distance: cumulative,
        });
        prev = Some(sample);
    }
    rows
}

// ============================================================================
// Summaries
// ============================================================================

/// Overview of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track_id: String,
    pub point_count: usize,
    pub segment_count: usize,
    /// Capped path length in meters
    pub total_distance: f64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Summarize an ordered track.
pub fn summarize_track<S: Sample>(
    track_id: &str,
    samples: &[S],
    break_distance_meters: Option<f64>,
) -> TrackSummary {
    TrackSummary {
        track_id: track_id.to_string(),
        point_count: samples.len(),
        segment_count: segment_track(samples, break_distance_meters).len(),
        total_distance: capped_distance(samples, break_distance_meters),
        start: samples.first().map(|s| s.timestamp()),
        end: samples.last().map(|s| s.timestamp()),
    }
}

fn summarize_from_store<St: PositionStore + ?Sized>(
    store: &St,
    track: &Track,
    global: &TrackConfig,
) -> Result<TrackSummary> {
    let config = track.effective_config(global)?;
    let samples = store.positions_for_track(&track.id)?;
    Ok(summarize_track(
        &track.id,
        &samples,
        config.start_new_line_distance_meters,
    ))
}

/// Summarize several tracks read from a store, in input order.
///
/// Each track uses its own break distance override when set.
pub fn summarize_tracks<St: PositionStore + ?Sized>(
    store: &St,
    tracks: &[Track],
    global: &TrackConfig,
) -> Result<Vec<TrackSummary>> {
    tracks
        .iter()
        .map(|track| summarize_from_store(store, track, global))
        .collect()
}

/// Summarize several tracks using parallel processing.
///
/// Same result as [`summarize_tracks`]; tracks are independent so each one
/// is read and summarized on the rayon pool.
#[cfg(feature = "parallel")]
pub fn summarize_tracks_parallel<St>(
    store: &St,
    tracks: &[Track],
    global: &TrackConfig,
) -> Result<Vec<TrackSummary>>
where
    St: PositionStore + Sync + ?Sized,
{
    use rayon::prelude::*;

    tracks
        .par_iter()
        .map(|track| summarize_from_store(store, track, global))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Position;
    use chrono::{Duration, TimeZone};

    const METERS_PER_DEGREE: f64 = 111_195.08;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    /// Samples along the equator at the given eastward offsets in meters.
    fn walk(id: &str, offsets: &[f64]) -> Vec<Position> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, m)| Position::new(id, t(i as i64), 0.0, m / METERS_PER_DEGREE))
            .collect()
    }

    #[test]
    fn test_empty_track() {
        let empty: Vec<Position> = Vec::new();
        assert!(segment_track(&empty, Some(10.0)).is_empty());
        assert_eq!(capped_distance(&empty, None), 0.0);
        assert!(distance_report(&empty, None).is_empty());

        let summary = summarize_track("none", &empty, None);
        assert_eq!(summary.segment_count, 0);
        assert_eq!(summary.start, None);
    }

    #[test]
    fn test_no_break_distance_is_one_line() {
        let samples = walk("rover", &[0.0, 5.0, 500.0, 505.0]);
        let segments = segment_track(&samples, None);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 4);
        assert_eq!(segments[0].timestamps[3], t(3));
    }

    #[test]
    fn test_gap_splits_and_is_excluded() {
        // steps of 5m, 15m (gap), 5m
        let samples = walk("rover", &[0.0, 5.0, 20.0, 25.0]);

        let segments = segment_track(&samples, Some(10.0));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 2);
        assert_eq!(segments[1].len(), 2);
        assert_eq!(segments[1].timestamps[0], t(2));

        let capped = capped_distance(&samples, Some(10.0));
        assert!((capped - 10.0).abs() < 0.01, "capped = {}", capped);
        let uncapped = capped_distance(&samples, None);
        assert!((uncapped - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_every_step_a_break() {
        let samples = walk("rover", &[0.0, 50.0, 100.0]);
        let segments = segment_track(&samples, Some(10.0));
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() == 1));
        assert_eq!(capped_distance(&samples, Some(10.0)), 0.0);
    }

    #[test]
    fn test_distance_report_rows() {
        let samples = walk("rover", &[0.0, 5.0, 20.0, 25.0]);
        let rows = distance_report(&samples, Some(10.0));

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].distance, 0.0);
        assert_eq!(rows[0].epoch, t(0).timestamp());
        assert!((rows[2].distance - 15.0).abs() < 0.01);
        assert_eq!(rows[2].capped_distance, 0.0);
        assert!((rows[3].cumulative_distance - 10.0).abs() < 0.01);

        let json = serde_json::to_string(&rows[1]).unwrap();
        assert!(json.contains("\"capped_distance\""));
    }

    #[test]
    fn test_summarize_tracks_from_store() {
        let mut store = MemoryStore::new();
        store.extend(walk("a", &[0.0, 5.0, 20.0, 25.0])).unwrap();
        store.extend(walk("b", &[0.0, 100.0])).unwrap();

        let global = TrackConfig {
            start_new_line_distance_meters: Some(10.0),
            ..Default::default()
        };
        let tracks = vec![
            Track::new("a"),
            Track {
                start_new_line_distance_meters: Some(1000.0),
                ..Track::new("b")
            },
            Track::new("missing"),
        ];

        let summaries = summarize_tracks(&store, &tracks, &global).unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].segment_count, 2);
        assert_eq!(summaries[0].start, Some(t(0)));
        assert_eq!(summaries[0].end, Some(t(3)));
        assert_eq!(summaries[1].segment_count, 1);
        assert!((summaries[1].total_distance - 100.0).abs() < 0.01);
        assert_eq!(summaries[2].point_count, 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let mut store = MemoryStore::new();
        let mut tracks = Vec::new();
        for i in 0..8 {
            let id = format!("track-{}", i);
            let offsets: Vec<f64> = (0..50).map(|k| (k * (i + 1) * 3) as f64).collect();
            store.extend(walk(&id, &offsets)).unwrap();
            tracks.push(Track::new(id));
        }
        let global = TrackConfig {
            start_new_line_distance_meters: Some(12.0),
            ..Default::default()
        };

        let sequential = summarize_tracks(&store, &tracks, &global).unwrap();
        let parallel = summarize_tracks_parallel(&store, &tracks, &global).unwrap();
        assert_eq!(sequential, parallel);
    }
}
