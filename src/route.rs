//! Route data model.
//!
//! Routes arrive from an external provider as JSON and are immutable once
//! received. Field names follow the provider payload (camelCase) so the
//! host can hand the response body across the JNI boundary unchanged.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{NavError, Result};

/// A point on the Earth's surface in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True for finite coordinates inside the valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// How the traveler is moving. Selects the per-mode distance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
        }
    }

    /// Parse a mode name from the host. Unknown names fall back to driving.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "walking" | "walk" | "foot" => TravelMode::Walking,
            "cycling" | "bicycling" | "bike" => TravelMode::Cycling,
            _ => TravelMode::Driving,
        }
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the maneuver at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverModifier {
    Left,
    Right,
    Straight,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single maneuver instruction of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub distance_meters: f64,
    #[serde(default)]
    pub duration_seconds: f64,
    /// Where the maneuver happens. Malformed values decode as `None`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub maneuver_location: Option<Coordinate>,
    #[serde(default)]
    pub maneuver_modifier: ManeuverModifier,
}

/// A route as delivered by the route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub distance_meters: f64,
    #[serde(default)]
    pub duration_seconds: f64,
    pub polyline: Vec<Coordinate>,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

impl Route {
    /// Check the structural requirements for guidance.
    pub fn validate(&self) -> Result<()> {
        if self.polyline.len() < 2 {
            return Err(NavError::InvalidRoute(format!(
                "polyline needs at least 2 points, got {}",
                self.polyline.len()
            )));
        }
        if let Some(i) = self.polyline.iter().position(|c| !c.is_valid()) {
            return Err(NavError::InvalidRoute(format!(
                "polyline point {i} is not a valid coordinate"
            )));
        }
        Ok(())
    }

    /// Decode and validate a route from a provider JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let route: Route = serde_json::from_str(json)?;
        route.validate()?;
        Ok(route)
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.polyline.last().copied()
    }
}

fn lenient_coordinate<'de, D>(deserializer: D) -> std::result::Result<Option<Coordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Coordinate>(value)
        .ok()
        .filter(Coordinate::is_valid))
}
