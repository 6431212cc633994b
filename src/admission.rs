//! # Sample Admission
//!
//! Decides whether a newly observed sample is novel enough to keep.
//!
//! A filter remembers the last sample it *accepted* (not the last one it was
//! offered), so a resource creeping along in small steps is still recorded
//! once its cumulative displacement crosses the threshold. Accepted samples
//! are handed to a sink callback, typically "persist to the store".
//!
//! Filters hold per-track state and are not synchronized; a host feeding one
//! track from several threads must serialize calls to [`AdmissionFilter::offer`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::non_negative;
use crate::error::Result;
use crate::geo_utils::{sample_distance, seconds_between};
use crate::store::PositionStore;
use crate::Sample;

/// A stateful gate over incoming samples for one track.
pub trait AdmissionFilter<S> {
    /// Offer a sample. Returns `true` if it was accepted and passed to the sink.
    ///
    /// If the sink fails the error is returned and the filter state is left
    /// unchanged, so the same sample can be offered again.
    fn offer(&mut self, sample: S) -> Result<bool>;

    /// The last accepted sample, if any.
    fn previous(&self) -> Option<&S>;
}

fn accept<S, F>(previous: &mut Option<S>, on_accept: &mut F, sample: S) -> Result<bool>
where
    F: FnMut(&S) -> Result<()>,
{
    on_accept(&sample)?;
    *previous = Some(sample);
    Ok(true)
}

// ============================================================================
// Distance-only filter
// ============================================================================

/// Accepts a sample once it is more than `threshold_meters` from the last
/// accepted one.
pub struct DistanceFilter<S, F> {
    threshold_meters: f64,
    previous: Option<S>,
    on_accept: F,
}

impl<S, F> DistanceFilter<S, F>
where
    S: Sample,
    F: FnMut(&S) -> Result<()>,
{
    /// Create a filter that starts from `previous` (or accepts the first
    /// sample offered when `None`).
    pub fn new(threshold_meters: f64, previous: Option<S>, on_accept: F) -> Result<Self> {
        non_negative("threshold_meters", threshold_meters)?;
        Ok(Self {
            threshold_meters,
            previous,
            on_accept,
        })
    }

    /// Create a filter seeded with the most recent stored sample of a track,
    /// so admission continues where it left off before a restart.
    pub fn from_store<St>(
        store: &St,
        track_id: &str,
        threshold_meters: f64,
        on_accept: F,
    ) -> Result<Self>
    where
        St: PositionStore<Sample = S> + ?Sized,
    {
        let previous = store.most_recent(track_id)?;
        debug!(
            "[DistanceFilter] track '{}' seeded {}",
            track_id,
            if previous.is_some() { "from store" } else { "empty" }
        );
        Self::new(threshold_meters, previous, on_accept)
    }

    /// Whether `sample` would be accepted, without side effects.
    pub fn is_novel(&self, sample: &S) -> bool {
        match &self.previous {
            None => true,
            Some(prev) => sample_distance(sample, prev) > self.threshold_meters,
        }
    }
}

impl<S, F> AdmissionFilter<S> for DistanceFilter<S, F>
where
    S: Sample,
    F: FnMut(&S) -> Result<()>,
{
    fn offer(&mut self, sample: S) -> Result<bool> {
        if !self.is_novel(&sample) {
            return Ok(false);
        }
        accept(&mut self.previous, &mut self.on_accept, sample)
    }

    fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }
}

// ============================================================================
// Multi-criterion filter
// ============================================================================

/// Thresholds for [`MultiCriterionFilter`]. `None` disables a criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionThresholds {
    /// Accept once more than this many seconds have passed.
    pub seconds: Option<f64>,
    /// Accept once heading has changed by more than this many degrees
    /// (plain absolute difference: 359° -> 1° counts as 358°).
    pub degrees: Option<f64>,
    /// Accept once the resource has moved more than this many meters.
    pub meters: Option<f64>,
}

impl AdmissionThresholds {
    pub fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.seconds {
            non_negative("seconds threshold", seconds)?;
        }
        if let Some(degrees) = self.degrees {
            non_negative("degrees threshold", degrees)?;
        }
        if let Some(meters) = self.meters {
            non_negative("meters threshold", meters)?;
        }
        Ok(())
    }
}

/// Accepts a sample when any enabled criterion (elapsed time, heading change,
/// distance) exceeds its threshold relative to the last accepted sample.
///
/// With every criterion disabled only the very first sample is accepted.
pub struct MultiCriterionFilter<S, F> {
    thresholds: AdmissionThresholds,
    previous: Option<S>,
    on_accept: F,
}

impl<S, F> MultiCriterionFilter<S, F>
where
    S: Sample,
    F: FnMut(&S) -> Result<()>,
{
    pub fn new(thresholds: AdmissionThresholds, previous: Option<S>, on_accept: F) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            previous,
            on_accept,
        })
    }

    /// Create a filter seeded with the most recent stored sample of a track.
    pub fn from_store<St>(
        store: &St,
        track_id: &str,
        thresholds: AdmissionThresholds,
        on_accept: F,
    ) -> Result<Self>
    where
        St: PositionStore<Sample = S> + ?Sized,
    {
        let previous = store.most_recent(track_id)?;
        debug!(
            "[MultiCriterionFilter] track '{}' seeded {}",
            track_id,
            if previous.is_some() { "from store" } else { "empty" }
        );
        Self::new(thresholds, previous, on_accept)
    }

    pub fn thresholds(&self) -> &AdmissionThresholds {
        &self.thresholds
    }

    /// Whether `sample` would be accepted, without side effects.
    pub fn is_novel(&self, sample: &S) -> bool {
        let Some(prev) = &self.previous else {
            return true;
        };

        let time_tripped = self.thresholds.seconds.map_or(false, |limit| {
            seconds_between(sample.timestamp(), prev.timestamp()) > limit
        });
        let heading_tripped = match (self.thresholds.degrees, sample.heading(), prev.heading()) {
            (Some(limit), Some(h), Some(prev_h)) => (h - prev_h).abs() > limit,
            _ => false,
        };
        let distance_tripped = self
            .thresholds
            .meters
            .map_or(false, |limit| sample_distance(sample, prev) > limit);

        time_tripped || heading_tripped || distance_tripped
    }
}

impl<S, F> AdmissionFilter<S> for MultiCriterionFilter<S, F>
where
    S: Sample,
    F: FnMut(&S) -> Result<()>,
{
    fn offer(&mut self, sample: S) -> Result<bool> {
        if !self.is_novel(&sample) {
            return Ok(false);
        }
        accept(&mut self.previous, &mut self.on_accept, sample)
    }

    fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================
