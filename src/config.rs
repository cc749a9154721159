//! Tunable guidance constants.
//!
//! Every field has a default, so hosts only send what they override:
//!
//! ```json
//! { "offRoute": { "cooldownSecs": 30, "thresholds": { "driving": 110, "cycling": 60, "walking": 40 } } }
//! ```

use serde::Deserialize;

use crate::debounce::{Boundary, Cooldown};
use crate::error::{NavError, Result};
use crate::geo::DEFAULT_MAX_SAMPLES;
use crate::route::TravelMode;

/// Complete guidance configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavConfig {
    /// Distance to a maneuver below which the next step becomes current (meters).
    pub step_advance_m: f64,

    /// Coarse-pass sample bound for nearest-vertex search.
    pub nearest_max_samples: usize,

    pub announce: AnnounceConfig,
    pub off_route: OffRouteConfig,
    pub suggestions: SuggestionConfig,
}

/// A distance per travel mode, in meters. All three modes must be given.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ModeThresholds {
    pub driving: f64,
    pub cycling: f64,
    pub walking: f64,
}

impl ModeThresholds {
    pub fn for_mode(&self, mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Driving => self.driving,
            TravelMode::Cycling => self.cycling,
            TravelMode::Walking => self.walking,
        }
    }

    fn all_positive(&self) -> bool {
        [self.driving, self.cycling, self.walking]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Background turn alerts.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnounceConfig {
    /// Alert radius around a maneuver per mode (meters).
    pub thresholds: ModeThresholds,

    /// Minimum time between two alerts (seconds).
    pub cooldown_secs: f64,
}

impl AnnounceConfig {
    pub fn cooldown(&self) -> Cooldown {
        Cooldown::from_secs(self.cooldown_secs, Boundary::Exclusive)
    }
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            thresholds: ModeThresholds {
                driving: 120.0,
                cycling: 70.0,
                walking: 45.0,
            },
            cooldown_secs: 25.0,
        }
    }
}

/// Off-route detection and reroute guards.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffRouteConfig {
    /// Allowed deviation from the polyline per mode (meters).
    pub thresholds: ModeThresholds,

    /// Polylines shorter than this are never checked.
    pub min_polyline_points: usize,

    /// Consecutive off-route samples needed before rerouting.
    pub required_streak: u32,

    /// Saturation point of the off-route streak counter.
    pub max_streak: u32,

    /// Minimum time between two reroutes (seconds).
    pub cooldown_secs: f64,

    /// Floor of the movement required since the last reroute origin (meters).
    pub min_movement_m: f64,

    /// Movement required as a fraction of the mode threshold.
    pub movement_ratio: f64,
}

impl OffRouteConfig {
    pub fn cooldown(&self) -> Cooldown {
        Cooldown::from_secs(self.cooldown_secs, Boundary::Inclusive)
    }

    /// Distance the traveler must cover from the last reroute origin.
    pub fn required_movement_m(&self, mode: TravelMode) -> f64 {
        self.min_movement_m
            .max(self.movement_ratio * self.thresholds.for_mode(mode))
    }
}

impl Default for OffRouteConfig {
    fn default() -> Self {
        Self {
            thresholds: ModeThresholds {
                driving: 90.0,
                cycling: 55.0,
                walking: 40.0,
            },
            min_polyline_points: 6,
            required_streak: 2,
            max_streak: 5,
            cooldown_secs: 18.0,
            min_movement_m: 35.0,
            movement_ratio: 0.6,
        }
    }
}

/// Nearby point-of-interest suggestions.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionConfig {
    /// Maximum distance of a suggested candidate (meters).
    pub radius_m: f64,

    /// Minimum time between two suggestions of the same candidate (seconds).
    pub throttle_secs: f64,

    /// Candidate categories eligible for suggestions (case-insensitive).
    pub categories: Vec<String>,
}

impl SuggestionConfig {
    pub fn cooldown(&self) -> Cooldown {
        Cooldown::from_secs(self.throttle_secs, Boundary::Exclusive)
    }

    pub fn allows_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category.trim()))
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            radius_m: 140.0,
            throttle_secs: 240.0,
            categories: ["bar", "lounge", "pub", "nightclub", "cocktail_bar"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            step_advance_m: 18.0,
            nearest_max_samples: DEFAULT_MAX_SAMPLES,
            announce: AnnounceConfig::default(),
            off_route: OffRouteConfig::default(),
            suggestions: SuggestionConfig::default(),
        }
    }
}

impl NavConfig {
    /// Parse a (partial) configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step_advance_m.is_finite() && self.step_advance_m > 0.0) {
            return Err(NavError::Config("stepAdvanceM must be positive".into()));
        }
        if self.nearest_max_samples == 0 {
            return Err(NavError::Config("nearestMaxSamples must be positive".into()));
        }
        if !self.announce.thresholds.all_positive() {
            return Err(NavError::Config("announce thresholds must be positive".into()));
        }
        if !self.off_route.thresholds.all_positive() {
            return Err(NavError::Config("off-route thresholds must be positive".into()));
        }
        if self.off_route.required_streak == 0
            || self.off_route.required_streak > self.off_route.max_streak
        {
            return Err(NavError::Config(
                "offRoute.requiredStreak must be in 1..=maxStreak".into(),
            ));
        }
        let ratio = self.off_route.movement_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(NavError::Config("offRoute.movementRatio must be in (0, 1]".into()));
        }
        if !(self.suggestions.radius_m.is_finite() && self.suggestions.radius_m > 0.0) {
            return Err(NavError::Config("suggestions.radiusM must be positive".into()));
        }
        Ok(())
    }
}
