//! Tunables for identity assignment and gesture recognition.
//!
//! Configuration is plain data with serde support, so hosts can embed it in
//! their own settings files or load a standalone TOML document:
//!
//! ```toml
//! [identity]
//! strict = true
//!
//! [gestures]
//! minimum_distance = 8.0
//! prediction_ms = 200.0
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration of a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity assignment options.
    pub identity: IdentityConfig,
    /// Gesture recognition options.
    pub gestures: GestureConfig,
}

impl Config {
    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the document is not valid TOML or
    /// has fields of the wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// Identity assignment options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Panic when two different paths in one tree hash to the same id.
    pub strict: bool,
}

/// Gesture recognition options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Default distance a drag must travel before it begins.
    pub minimum_distance: f32,
    /// Capacity of the per-gesture sample ring.
    pub velocity_samples: usize,
    /// Trailing window, in milliseconds, used to estimate velocity.
    pub velocity_window_ms: f64,
    /// Horizon, in milliseconds, used to extrapolate the predicted end location.
    pub prediction_ms: f64,
    /// Movement a tap tolerates before failing.
    pub tap_slop: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            minimum_distance: 10.0,
            velocity_samples: 8,
            velocity_window_ms: 100.0,
            prediction_ms: 250.0,
            tap_slop: 10.0,
        }
    }
}

impl GestureConfig {
    /// Velocity window as a [`Duration`].
    #[must_use]
    pub fn velocity_window(&self) -> Duration {
        millis(self.velocity_window_ms)
    }

    /// Prediction horizon as a [`Duration`].
    #[must_use]
    pub fn prediction(&self) -> Duration {
        millis(self.prediction_ms)
    }
}

fn millis(ms: f64) -> Duration {
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::ZERO)
}
