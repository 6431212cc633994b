//! Unified error handling for the geotrack library.
//!
//! "No answer" outcomes (a timestamp outside the stored range, a gap that is
//! too wide to interpolate across, an empty track) are `Option::None`, not
//! errors. This type only covers configuration problems and store failures.

use thiserror::Error;

/// Unified error type for geotrack operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A threshold or capacity was malformed (negative, non-finite, too small).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A sample handed to a store has unusable coordinates.
    #[error("Track '{track_id}' has an invalid sample: {message}")]
    InvalidSample { track_id: String, message: String },

    /// Configuration JSON could not be parsed.
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite store failure, propagated unchanged.
    #[cfg(feature = "persistence")]
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Store failure from an implementation without its own error type.
    #[error("Store error: {message}")]
    Store { message: String },
}

impl TrackError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        TrackError::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for geotrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;

    /// Convert Option to Result with a generic store error.
    fn ok_or_store(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::config(message))
    }

    fn ok_or_store(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::Store {
            message: message.to_string(),
        })
    }
}
