//! Route progress.
//!
//! Pure functions of (location, polyline, following flag). The remaining
//! path starts one vertex behind the nearest vertex so the drawn line
//! still reaches the traveler.

use serde::Serialize;

use crate::geo::{haversine, nearest_polyline_index, polyline_length};
use crate::route::Coordinate;

/// Where the traveler is relative to the route polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProgress {
    /// Index of the nearest polyline vertex.
    pub nearest_index: usize,
    /// Distance from the traveler to that vertex, in meters.
    pub off_track_m: f64,
    /// Distance from the traveler along the rest of the route, in meters.
    pub remaining_m: f64,
}

/// The part of the route still ahead of the traveler.
///
/// When not following, the full polyline is returned unchanged.
pub fn remaining_polyline<'a>(
    location: &Coordinate,
    polyline: &'a [Coordinate],
    following: bool,
    max_samples: usize,
) -> &'a [Coordinate] {
    if !following || polyline.is_empty() {
        return polyline;
    }
    let Some(nearest) = nearest_polyline_index(location, polyline, max_samples) else {
        return polyline;
    };
    let start = nearest.index.saturating_sub(1).min(polyline.len() - 1);
    &polyline[start..]
}

/// Progress summary for the traveler's location. `None` for an empty polyline.
pub fn route_progress(
    location: &Coordinate,
    polyline: &[Coordinate],
    max_samples: usize,
) -> Option<RouteProgress> {
    let nearest = nearest_polyline_index(location, polyline, max_samples)?;
    let ahead = &polyline[nearest.index..];

    Some(RouteProgress {
        nearest_index: nearest.index,
        off_track_m: nearest.distance_m,
        remaining_m: haversine(location, &polyline[nearest.index]) + polyline_length(ahead),
    })
}
