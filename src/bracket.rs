//! # Bracket Cache
//!
//! Finds the pair of stored samples that bracket a query timestamp, for one
//! track, without going back to the store on every query.
//!
//! The cache holds a window of samples (ascending by timestamp) plus a cursor
//! marking the bracket used by the previous query. Queries usually arrive in
//! increasing timestamp order (replaying a log, animating a track), so the
//! next bracket is found by scanning forward from the cursor, and the store
//! is only queried again once a query runs past the cached window.
//!
//! For N increasing queries over K stored samples the total work is
//! O(N + K). Out-of-order queries still get correct answers; they just cost
//! more refills.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::config::{non_negative, TrackConfig};
use crate::error::{Result, TrackError};
use crate::geo_utils::duration_from_seconds;
use crate::store::{PositionStore, RangeQuery};
use crate::Sample;

/// Windowed, cursor-accelerated bracket search over one track.
pub struct BracketCache<St: PositionStore> {
    store: St,
    track_id: String,
    /// How far before a query time a refill reaches back
    max_gap: Duration,
    capacity: usize,

    cache: Vec<St::Sample>,
    cache_min: Option<DateTime<Utc>>,
    cache_max: Option<DateTime<Utc>>,
    cursor: usize,

    // Extremes of the whole track, read once at construction
    global_min: Option<DateTime<Utc>>,
    global_max: Option<DateTime<Utc>>,

    refills: usize,
}

impl<St: PositionStore> BracketCache<St> {
    /// Create a cache for one track.
    ///
    /// Reads the track's earliest and latest timestamps from the store once;
    /// samples written later than that are outside the cache's view.
    pub fn new(
        store: St,
        track_id: impl Into<String>,
        max_interpolation_seconds: f64,
        capacity: usize,
    ) -> Result<Self> {
        non_negative("max_interpolation_seconds", max_interpolation_seconds)?;
        if capacity < 2 {
            return Err(TrackError::config("cache capacity must be at least 2"));
        }

        let track_id = track_id.into();
        let global_min = store.min_timestamp(&track_id)?;
        let global_max = store.max_timestamp(&track_id)?;

        Ok(Self {
            store,
            track_id,
            max_gap: duration_from_seconds(max_interpolation_seconds),
            capacity,
            cache: Vec::new(),
            cache_min: None,
            cache_max: None,
            cursor: 0,
            global_min,
            global_max,
            refills: 0,
        })
    }

    /// Create a cache using the interpolation window and capacity of a config.
    pub fn with_config(
        store: St,
        track_id: impl Into<String>,
        config: &TrackConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(
            store,
            track_id,
            config.interpolate_max_seconds,
            config.cache_capacity,
        )
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// Earliest and latest timestamps of the track, if it has any samples.
    pub fn global_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.global_min.zip(self.global_max)
    }

    /// Number of times the window has been reloaded from the store.
    pub fn refill_count(&self) -> usize {
        self.refills
    }

    /// Number of samples currently held in the window.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// The stored samples immediately before and after `timestamp`.
    ///
    /// Returns `before.timestamp <= timestamp < after.timestamp`, or `None`
    /// when the timestamp is outside the track's range or no sample precedes
    /// it within the interpolation window. A sample stored exactly at
    /// `timestamp` is returned on both sides.
    pub fn bracket(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<(&St::Sample, &St::Sample)>> {
        let Some((global_min, global_max)) = self.global_range() else {
            return Ok(None);
        };
        if timestamp < global_min || timestamp > global_max {
            return Ok(None);
        }

        let lookback = self.lookback(timestamp);
        let needs_refill = match (self.cache_min, self.cache_max) {
            (Some(lo), Some(hi)) if lo <= timestamp && timestamp <= hi => {
                // A window that starts after this query's look-back can be
                // missing the before-sample.
                self.cache[0].timestamp() > timestamp && lookback.map_or(true, |start| lo > start)
            }
            _ => true,
        };
        if needs_refill {
            self.refill(timestamp)?;
        } else if self.cache[self.cursor].timestamp() > timestamp {
            // query went backwards inside the window
            self.cursor = 0;
        }

        match self.cache.get(self.cursor) {
            Some(start) if start.timestamp() <= timestamp => {}
            _ => return Ok(None),
        }

        // Advance to the latest cached sample at or before the query.
        let n = self.cache.len();
        let mut i = self.cursor;
        while i + 1 < n && self.cache[i + 1].timestamp() <= timestamp {
            i += 1;
        }
        self.cursor = i;

        let before = &self.cache[i];
        if before.timestamp() == timestamp {
            return Ok(Some((before, before)));
        }
        let too_old = lookback.map_or(false, |start| before.timestamp() < start);
        if too_old || i + 1 >= n {
            return Ok(None);
        }
        Ok(Some((before, &self.cache[i + 1])))
    }

    /// Earliest timestamp a before-sample may have, or `None` when the
    /// interpolation window reaches past the representable time range.
    fn lookback(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        timestamp.checked_sub_signed(self.max_gap)
    }

    /// Reload the window starting `max_gap` before `timestamp`.
    fn refill(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        let window_start = self.lookback(timestamp);
        let mut query = RangeQuery::ascending().limit(self.capacity);
        if let Some(start) = window_start {
            query = query.from(start);
        }
        // an unbounded look-back loads from the start of the track
        let mut cache_min = window_start.or(self.global_min);
        let mut samples = self.store.range_query(&self.track_id, &query)?;

        // Dense track: the window filled up before reaching the query, so
        // re-anchor on the last sample at or before it.
        let fell_short = samples.len() == self.capacity
            && samples.last().map_or(false, |s| s.timestamp() < timestamp);
        if fell_short {
            let anchor = self
                .store
                .range_query(
                    &self.track_id,
                    &RangeQuery::descending().to(timestamp).limit(1),
                )?
                .into_iter()
                .next();
            if let Some(anchor) = anchor {
                let anchor_time = anchor.timestamp();
                // Skip other samples sharing the anchor's timestamp so a long
                // run of duplicates cannot crowd out the after-sample.
                let following = self.store.range_query(
                    &self.track_id,
                    &RangeQuery::ascending()
                        .from(timestamp)
                        .limit(self.capacity - 1),
                )?;
                cache_min = Some(anchor_time);
                samples = Vec::with_capacity(self.capacity);
                samples.push(anchor);
                samples.extend(following.into_iter().filter(|s| s.timestamp() > anchor_time));
            }
        }

        self.refills += 1;
        debug!(
            "[BracketCache] track '{}': loaded {} samples from {}{}",
            self.track_id,
            samples.len(),
            cache_min.map_or_else(|| "track start".to_string(), |t| t.to_string()),
            if fell_short { " (re-anchored)" } else { "" }
        );

        match samples.last() {
            Some(last) => {
                self.cache_min = cache_min;
                self.cache_max = Some(last.timestamp());
            }
            None => {
                self.cache_min = None;
                self.cache_max = None;
            }
        }
        self.cache = samples;
        self.cursor = 0;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
