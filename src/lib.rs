//! # Geotrack
//!
//! Time-indexed position interpolation and sample admission for tracked
//! resources (vehicles, sensors, people).
//!
//! This library provides:
//! - "Where was resource R at time T" queries, interpolated between stored
//!   samples, with a cursor-based cache that makes increasing-timestamp
//!   replays run in amortized near-constant time per query
//! - Circular (shortest-arc) heading interpolation
//! - Admission filters that decide whether a new sample is novel enough to keep
//! - Track segmentation into polylines, with capped path-length reporting
//!
//! Durable storage is a collaborator: anything implementing [`PositionStore`]
//! can back the engine. [`MemoryStore`] is always available; enable the
//! `persistence` feature for a SQLite store.
//!
//! ## Features
//!
//! - **`parallel`** - Batch track summaries on a rayon pool
//! - **`persistence`** - SQLite-backed [`PositionStore`]
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use geotrack::{MemoryStore, Position, PositionInterpolator, Track, TrackConfig};
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let mut store = MemoryStore::new();
//! store.insert(Position::new("rover", t0, 0.0, 0.0).with_heading(350.0)).unwrap();
//! store
//!     .insert(Position::new("rover", t0 + chrono::Duration::seconds(100), 0.0, 0.001).with_heading(10.0))
//!     .unwrap();
//!
//! let track = Track::new("rover");
//! let mut interp = PositionInterpolator::new(&store, &track, &TrackConfig::default()).unwrap();
//! let pos = interp.interpolate(t0 + chrono::Duration::seconds(50)).unwrap().unwrap();
//! assert!((pos.longitude - 0.0005).abs() < 1e-9);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackError};

// Global defaults and per-track overrides
pub mod config;
pub use config::{Track, TrackConfig, DEFAULT_CACHE_CAPACITY};

// Geographic utilities (distance, time deltas, centroid)
pub mod geo_utils;
pub use geo_utils::{distance_meters, location_centroid, sample_distance, Centroid};

// Circular interpolation on the 0-360 degree heading circle
pub mod heading;
pub use heading::interp_heading;

// Ordered position storage seam
pub mod store;
pub use store::{
    closest_position, closest_track_position, MemoryStore, PositionStore, RangeQuery, SortOrder,
};

// Windowed bracket search with a monotonic cursor
pub mod bracket;
pub use bracket::BracketCache;

// Position-at-time queries
pub mod interpolate;
pub use interpolate::PositionInterpolator;

// Sample admission (redundancy filtering)
pub mod admission;
pub use admission::{AdmissionFilter, AdmissionThresholds, DistanceFilter, MultiCriterionFilter};

// Polyline segmentation and path-length reporting
pub mod segment;
pub use segment::{
    capped_distance, distance_report, segment_track, summarize_track, summarize_tracks, DistanceRow,
    Segment, TrackSummary,
};
#[cfg(feature = "parallel")]
pub use segment::summarize_tracks_parallel;

// Per-day data queries in a fixed operations time zone
pub mod days;
pub use days::{
    dates_with_data, day_bounds, position_count_for_day, position_count_in_range,
    position_data_date_range,
};

// SQLite-backed position store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqlitePositionStore;

// ============================================================================
// Core Types
// ============================================================================

/// Anything that can be treated as a time-stamped position on a track.
///
/// Only the timestamp and the coordinates are required. Optional dimensions
/// default to `None`, so minimal record types only implement four methods.
pub trait Sample {
    /// Identifier of the owning track.
    fn track_id(&self) -> &str;
    /// UTC instant of the sample.
    fn timestamp(&self) -> DateTime<Utc>;
    /// WGS84 latitude in degrees.
    fn latitude(&self) -> f64;
    /// WGS84 longitude in degrees.
    fn longitude(&self) -> f64;

    /// Heading in degrees on the 0-360 circle.
    fn heading(&self) -> Option<f64> {
        None
    }

    /// Altitude in meters.
    fn altitude(&self) -> Option<f64> {
        None
    }

    /// Horizontal precision estimate in meters.
    fn precision_meters(&self) -> Option<f64> {
        None
    }

    /// The sample's location as a [`GpsPoint`].
    fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude(), self.longitude())
    }
}

impl<S: Sample + ?Sized> Sample for &S {
    fn track_id(&self) -> &str {
        (**self).track_id()
    }
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }
    fn latitude(&self) -> f64 {
        (**self).latitude()
    }
    fn longitude(&self) -> f64 {
        (**self).longitude()
    }
    fn heading(&self) -> Option<f64> {
        (**self).heading()
    }
    fn altitude(&self) -> Option<f64> {
        (**self).altitude()
    }
    fn precision_meters(&self) -> Option<f64> {
        (**self).precision_meters()
    }
}

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use geotrack::GpsPoint;
/// let point = GpsPoint::new(37.4220, -122.0841);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A stored or interpolated position of a tracked resource.
///
/// Optional dimensions are plain `Option<f64>` fields rather than separate
/// record types, so one struct covers 2D fixes, fixes with heading and
/// full fixes with altitude and precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub track_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub altitude: Option<f64>,
    pub precision_meters: Option<f64>,
}

impl Position {
    /// Create a 2D position with no optional dimensions.
    pub fn new(
        track_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            timestamp,
            latitude,
            longitude,
            heading: None,
            altitude: None,
            precision_meters: None,
        }
    }

    /// Set the heading in degrees clockwise from north.
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Set the altitude in meters.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the horizontal precision estimate in meters.
    pub fn with_precision(mut self, precision_meters: f64) -> Self {
        self.precision_meters = Some(precision_meters);
        self
    }

    /// Copy every dimension out of any [`Sample`].
    pub fn from_sample<S: Sample + ?Sized>(sample: &S) -> Self {
        Self {
            track_id: sample.track_id().to_string(),
            timestamp: sample.timestamp(),
            latitude: sample.latitude(),
            longitude: sample.longitude(),
            heading: sample.heading(),
            altitude: sample.altitude(),
            precision_meters: sample.precision_meters(),
        }
    }
}

impl Sample for Position {
    fn track_id(&self) -> &str {
        &self.track_id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn latitude(&self) -> f64 {
        self.latitude
    }
    fn longitude(&self) -> f64 {
        self.longitude
    }
    fn heading(&self) -> Option<f64> {
        self.heading
    }
    fn altitude(&self) -> Option<f64> {
        self.altitude
    }
    fn precision_meters(&self) -> Option<f64> {
        self.precision_meters
    }
}

// ============================================================================
// Tests
// ============================================================================
