//! Global tracking defaults and per-track overrides.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Upper bound on samples held by one bracket cache window.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Configuration shared by interpolation, caching and segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Consecutive samples farther apart than this start a new polyline.
    /// Default: None (a track renders as a single line)
    pub start_new_line_distance_meters: Option<f64>,

    /// Bracketing samples farther apart than this (in time) are not
    /// interpolated between. Also sets how far before the query time a
    /// cache refill reaches back.
    /// Default: 120.0 seconds
    pub interpolate_max_seconds: f64,

    /// Bracketing samples farther apart than this (in space) are not
    /// interpolated between, e.g. across a GPS outage.
    /// Default: None (no spatial check)
    pub interpolate_max_meters: Option<f64>,

    /// Maximum number of samples loaded into one cache window.
    /// Default: 10,000
    pub cache_capacity: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            start_new_line_distance_meters: None,
            interpolate_max_seconds: 120.0,
            interpolate_max_meters: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl TrackConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// ```
    /// use geotrack::TrackConfig;
    /// let config = TrackConfig::from_json(r#"{"interpolate_max_seconds": 3600}"#).unwrap();
    /// assert_eq!(config.interpolate_max_seconds, 3600.0);
    /// assert_eq!(config.cache_capacity, 10_000);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds that would make every query meaningless.
    pub fn validate(&self) -> Result<()> {
        non_negative("interpolate_max_seconds", self.interpolate_max_seconds)?;
        if let Some(meters) = self.interpolate_max_meters {
            non_negative("interpolate_max_meters", meters)?;
        }
        if let Some(meters) = self.start_new_line_distance_meters {
            non_negative("start_new_line_distance_meters", meters)?;
        }
        if self.cache_capacity < 2 {
            return Err(TrackError::config("cache_capacity must be at least 2"));
        }
        Ok(())
    }
}

pub(crate) fn non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(TrackError::config(format!(
            "{} must be a finite, non-negative number (got {})",
            name, value
        )));
    }
    Ok(())
}

/// A track identifier plus optional per-track threshold overrides.
///
/// Unset overrides fall back to the global [`TrackConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub start_new_line_distance_meters: Option<f64>,
    pub interpolate_max_meters: Option<f64>,
    pub interpolate_max_seconds: Option<f64>,
}

impl Track {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// The global configuration with this track's overrides applied.
    pub fn effective_config(&self, global: &TrackConfig) -> Result<TrackConfig> {
        let config = TrackConfig {
            start_new_line_distance_meters: self
                .start_new_line_distance_meters
                .or(global.start_new_line_distance_meters),
            interpolate_max_seconds: self
                .interpolate_max_seconds
                .unwrap_or(global.interpolate_max_seconds),
            interpolate_max_meters: self.interpolate_max_meters.or(global.interpolate_max_meters),
            cache_capacity: global.cache_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TrackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.start_new_line_distance_meters, None);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let negative = TrackConfig {
            interpolate_max_meters: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(TrackError::Config { .. })));

        let nan = TrackConfig {
            interpolate_max_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let tiny_cache = TrackConfig {
            cache_capacity: 1,
            ..Default::default()
        };
        assert!(tiny_cache.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = TrackConfig::from_json(
            r#"{"start_new_line_distance_meters": 50.0, "interpolate_max_meters": 500.0}"#,
        )
        .unwrap();
        assert_eq!(config.start_new_line_distance_meters, Some(50.0));
        assert_eq!(config.interpolate_max_meters, Some(500.0));
        assert_eq!(config.interpolate_max_seconds, 120.0);

        assert!(TrackConfig::from_json(r#"{"interpolate_max_seconds": -5}"#).is_err());
        assert!(matches!(
            TrackConfig::from_json("not json"),
            Err(TrackError::Json(_))
        ));
    }

    #[test]
    fn test_track_overrides() {
        let global = TrackConfig {
            interpolate_max_meters: Some(1000.0),
            ..Default::default()
        };
        let track = Track {
            interpolate_max_seconds: Some(3600.0),
            ..Track::new("rover")
        };

        let effective = track.effective_config(&global).unwrap();
        assert_eq!(effective.interpolate_max_seconds, 3600.0);
        assert_eq!(effective.interpolate_max_meters, Some(1000.0));

        let broken = Track {
            start_new_line_distance_meters: Some(-3.0),
            ..Track::new("rover")
        };
        assert!(broken.effective_config(&global).is_err());
    }
}
