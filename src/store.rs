//! # Position Store
//!
//! The ordered, per-track position collection the engine reads from.
//!
//! Durable storage belongs to the host application. Anything that can answer
//! timestamp range queries for one track implements [`PositionStore`]; the
//! min/max/most-recent lookups have default implementations in terms of
//! [`PositionStore::range_query`], which a database-backed store may override
//! with cheaper queries.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and by hosts
//! that keep tracks in memory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::{Track, TrackConfig};
use crate::error::{Result, TrackError};
use crate::geo_utils::seconds_between;
use crate::{Position, Sample};

/// Sort direction for range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A timestamp range query over one track.
///
/// Both bounds are inclusive. `limit` applies after ordering, so a
/// descending query with `limit(1)` yields the latest matching sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl RangeQuery {
    pub fn ascending() -> Self {
        Self::default()
    }

    pub fn descending() -> Self {
        Self {
            order: SortOrder::Descending,
            ..Self::default()
        }
    }

    /// Only samples with `timestamp >= from`.
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Only samples with `timestamp <= to`.
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a timestamp falls inside the query bounds.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| timestamp >= from)
            && self.to.map_or(true, |to| timestamp <= to)
    }
}

/// Read access to ordered position samples, grouped by track.
pub trait PositionStore {
    type Sample: Sample + Clone;

    /// Samples of one track within the query bounds, in the requested order.
    fn range_query(&self, track_id: &str, query: &RangeQuery) -> Result<Vec<Self::Sample>>;

    /// All samples of one track, ascending by timestamp.
    fn positions_for_track(&self, track_id: &str) -> Result<Vec<Self::Sample>> {
        self.range_query(track_id, &RangeQuery::ascending())
    }

    /// Earliest timestamp stored for a track.
    fn min_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        let first = self.range_query(track_id, &RangeQuery::ascending().limit(1))?;
        Ok(first.first().map(|s| s.timestamp()))
    }

    /// Latest timestamp stored for a track.
    fn max_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.most_recent(track_id)?.map(|s| s.timestamp()))
    }

    /// The latest sample stored for a track.
    fn most_recent(&self, track_id: &str) -> Result<Option<Self::Sample>> {
        let latest = self.range_query(track_id, &RangeQuery::descending().limit(1))?;
        Ok(latest.into_iter().next())
    }

    /// Number of samples of one track with `from <= timestamp <= to`.
    fn count_in_range(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self
            .range_query(track_id, &RangeQuery::ascending().from(from).to(to))?
            .len())
    }
}

impl<St: PositionStore + ?Sized> PositionStore for &St {
    type Sample = St::Sample;

    fn range_query(&self, track_id: &str, query: &RangeQuery) -> Result<Vec<Self::Sample>> {
        (**self).range_query(track_id, query)
    }
    fn positions_for_track(&self, track_id: &str) -> Result<Vec<Self::Sample>> {
        (**self).positions_for_track(track_id)
    }
    fn min_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        (**self).min_timestamp(track_id)
    }
    fn max_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        (**self).max_timestamp(track_id)
    }
    fn most_recent(&self, track_id: &str) -> Result<Option<Self::Sample>> {
        (**self).most_recent(track_id)
    }
    fn count_in_range(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize> {
        (**self).count_in_range(track_id, from, to)
    }
}

/// Find the stored sample nearest in time to `timestamp`.
///
/// An exact timestamp match wins outright. Otherwise the nearer of the latest
/// sample at or before and the earliest sample at or after is returned (the
/// earlier one on a tie), unless it is more than
/// `max_time_difference_seconds` away, in which case the answer is `None`.
pub fn closest_position<St: PositionStore + ?Sized>(
    store: &St,
    track_id: &str,
    timestamp: DateTime<Utc>,
    max_time_difference_seconds: f64,
) -> Result<Option<St::Sample>> {
    let before = store
        .range_query(track_id, &RangeQuery::descending().to(timestamp).limit(1))?
        .into_iter()
        .next();
    if before
        .as_ref()
        .map_or(false, |b| b.timestamp() == timestamp)
    {
        return Ok(before);
    }
    let after = store
        .range_query(track_id, &RangeQuery::ascending().from(timestamp).limit(1))?
        .into_iter()
        .next();

    let gap = |s: &St::Sample| seconds_between(s.timestamp(), timestamp).abs();
    let nearest = match (before, after) {
        (Some(b), Some(a)) => {
            if gap(&a) < gap(&b) {
                a
            } else {
                b
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return Ok(None),
    };

    if gap(&nearest) > max_time_difference_seconds {
        Ok(None)
    } else {
        Ok(Some(nearest))
    }
}

/// [`closest_position`] allowing the track's effective
/// `interpolate_max_seconds` as the time difference.
pub fn closest_track_position<St: PositionStore + ?Sized>(
    store: &St,
    track: &Track,
    global: &TrackConfig,
    timestamp: DateTime<Utc>,
) -> Result<Option<St::Sample>> {
    let config = track.effective_config(global)?;
    closest_position(store, &track.id, timestamp, config.interpolate_max_seconds)
}

// ============================================================================
// In-memory store
// ============================================================================

/// An in-memory [`PositionStore`], each track kept sorted by timestamp.
///
/// Samples with equal timestamps keep their insertion order.
#[derive(Debug, Clone)]
pub struct MemoryStore<S = Position> {
    tracks: HashMap<String, Vec<S>>,
}

impl<S: Sample + Clone> Default for MemoryStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample + Clone> MemoryStore<S> {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }

    /// Insert one sample, rejecting unusable coordinates.
    pub fn insert(&mut self, sample: S) -> Result<()> {
        if !sample.point().is_valid() {
            return Err(TrackError::InvalidSample {
                track_id: sample.track_id().to_string(),
                message: format!(
                    "coordinates ({}, {}) out of range",
                    sample.latitude(),
                    sample.longitude()
                ),
            });
        }

        let samples = self
            .tracks
            .entry(sample.track_id().to_string())
            .or_default();
        let t = sample.timestamp();
        let idx = samples.partition_point(|s| s.timestamp() <= t);
        samples.insert(idx, sample);
        Ok(())
    }

    /// Insert many samples. Stops at the first invalid one.
    pub fn extend<I: IntoIterator<Item = S>>(&mut self, samples: I) -> Result<()> {
        for sample in samples {
            self.insert(sample)?;
        }
        Ok(())
    }

    /// Number of samples stored for a track.
    pub fn len(&self, track_id: &str) -> usize {
        self.tracks.get(track_id).map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.values().all(|s| s.is_empty())
    }

    /// Ids of all tracks with at least one sample, sorted.
    pub fn track_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tracks
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl<S: Sample + Clone> PositionStore for MemoryStore<S> {
    type Sample = S;

    fn range_query(&self, track_id: &str, query: &RangeQuery) -> Result<Vec<S>> {
        let Some(samples) = self.tracks.get(track_id) else {
            return Ok(Vec::new());
        };

        let start = match query.from {
            Some(from) => samples.partition_point(|s| s.timestamp() < from),
            None => 0,
        };
        let end = match query.to {
            Some(to) => samples.partition_point(|s| s.timestamp() <= to),
            None => samples.len(),
        };
        if start >= end {
            return Ok(Vec::new());
        }

        let window = &samples[start..end];
        let limit = query.limit.unwrap_or(window.len());
        let result = match query.order {
            SortOrder::Ascending => window.iter().take(limit).cloned().collect(),
            SortOrder::Descending => window.iter().rev().take(limit).cloned().collect(),
        };
        Ok(result)
    }
}
