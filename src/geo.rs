//! Geometry primitives.
//!
//! Spherical-earth distance and bearing, plus a bounded-cost nearest
//! vertex search over route polylines. All coordinates use WGS84
//! (lat/lng in degrees).

use serde::Serialize;

use crate::route::Coordinate;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Upper bound on coarse-pass comparisons in [`nearest_polyline_index`].
pub const DEFAULT_MAX_SAMPLES: usize = 220;

/// Nearest polyline vertex to a query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestPoint {
    /// Index into the polyline (0-based).
    pub index: usize,
    /// Distance from the query point to that vertex, in meters.
    pub distance_m: f64,
}

/// Haversine distance between two points in meters.
pub fn haversine(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `from` to `to` in degrees [0, 360).
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine(&w[0], &w[1]))
        .sum()
}

/// Find the polyline vertex nearest to `point`.
///
/// Two passes: a coarse scan at a stride that keeps the comparison count
/// at or below `max_samples`, then an exhaustive scan of `±2×stride`
/// around the coarse winner. Returns `None` for an empty polyline.
pub fn nearest_polyline_index(
    point: &Coordinate,
    polyline: &[Coordinate],
    max_samples: usize,
) -> Option<NearestPoint> {
    let (coarse, stride) = coarse_nearest(point, polyline, max_samples)?;

    let lo = coarse.index.saturating_sub(2 * stride);
    let hi = (coarse.index + 2 * stride).min(polyline.len() - 1);

    let mut best = coarse;
    for (i, p) in polyline.iter().enumerate().take(hi + 1).skip(lo) {
        let d = haversine(point, p);
        if d < best.distance_m {
            best = NearestPoint { index: i, distance_m: d };
        }
    }

    Some(best)
}

/// Sampling stride for a polyline of `len` points.
fn stride_for(len: usize, max_samples: usize) -> usize {
    len.div_ceil(max_samples.max(1)).max(1)
}

fn coarse_nearest(
    point: &Coordinate,
    polyline: &[Coordinate],
    max_samples: usize,
) -> Option<(NearestPoint, usize)> {
    let stride = stride_for(polyline.len(), max_samples);

    let best = polyline
        .iter()
        .enumerate()
        .step_by(stride)
        .map(|(index, p)| NearestPoint {
            index,
            distance_m: haversine(point, p),
        })
        .reduce(|best, candidate| {
            if candidate.distance_m < best.distance_m {
                candidate
            } else {
                best
            }
        })?;

    Some((best, stride))
}

/// Format a distance for display, rounded to 10 m below one kilometer.
pub fn format_distance(meters: f64) -> String {
    if !meters.is_finite() {
        return "--".to_string();
    }
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", (meters / 10.0).round() as i64 * 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    /// Dense west-east line along a parallel, ~1.1 m between vertices.
    fn dense_line(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| pt(48.0, 16.0 + i as f64 * 0.000_015)).collect()
    }

    #[test]
    fn haversine_same_point() {
        let p = pt(48.2082, 16.3738);
        assert!(haversine(&p, &p).abs() < 0.01);
    }

    #[test]
    fn haversine_known_distance() {
        // Vienna to Bratislava ~55 km
        let vienna = pt(48.2082, 16.3738);
        let bratislava = pt(48.1486, 17.1077);
        let dist = haversine(&vienna, &bratislava);
        assert!(dist > 50_000.0 && dist < 60_000.0,
            "Expected ~55 km, got {:.0} m", dist);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine(&pt(0.0, 0.0), &pt(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = pt(0.0, 0.0);
        assert!(bearing(&origin, &pt(1.0, 0.0)).abs() < 0.1);
        assert!((bearing(&origin, &pt(0.0, 1.0)) - 90.0).abs() < 0.1);
        assert!((bearing(&origin, &pt(-1.0, 0.0)) - 180.0).abs() < 0.1);
        assert!((bearing(&origin, &pt(0.0, -1.0)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn bearing_is_in_range() {
        let b = bearing(&pt(48.0, 16.0), &pt(47.9, 15.9));
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn polyline_length_simple() {
        let line = vec![pt(0.0, 0.0), pt(0.0, 1.0), pt(0.0, 2.0)];
        let len = polyline_length(&line);
        // Each degree of longitude at equator ~111 km
        assert!(len > 200_000.0 && len < 230_000.0,
            "Expected ~222 km, got {:.0} m", len);
    }

    #[test]
    fn nearest_on_empty_polyline() {
        assert!(nearest_polyline_index(&pt(0.0, 0.0), &[], DEFAULT_MAX_SAMPLES).is_none());
    }

    #[test]
    fn nearest_on_short_polyline_is_exact() {
        let line = vec![pt(48.0, 16.0), pt(48.0, 16.01), pt(48.0, 16.02)];
        let hit = nearest_polyline_index(&pt(48.001, 16.011), &line, DEFAULT_MAX_SAMPLES).unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn stride_bounds_comparisons() {
        assert_eq!(stride_for(10, 220), 1);
        assert_eq!(stride_for(220, 220), 1);
        assert_eq!(stride_for(221, 220), 2);
        assert_eq!(stride_for(10_000, 220), 46);
        assert!(10_000usize.div_ceil(stride_for(10_000, 220)) <= 220);
    }

    #[test]
    fn refinement_finds_vertex_between_samples() {
        let line = dense_line(5_000);
        let query = pt(48.0001, line[1_237].lng);

        let hit = nearest_polyline_index(&query, &line, DEFAULT_MAX_SAMPLES).unwrap();
        assert_eq!(hit.index, 1_237);
    }

    #[test]
    fn refinement_never_regresses() {
        let line = dense_line(3_000);
        for k in [0usize, 17, 500, 1_499, 2_222, 2_999] {
            let query = pt(48.0002, line[k].lng + 0.000_004);
            let (coarse, _) = coarse_nearest(&query, &line, DEFAULT_MAX_SAMPLES).unwrap();
            let refined = nearest_polyline_index(&query, &line, DEFAULT_MAX_SAMPLES).unwrap();
            assert!(refined.distance_m <= coarse.distance_m);
        }
    }

    #[test]
    fn format_distance_meters() {
        assert_eq!(format_distance(150.0), "150 m");
        assert_eq!(format_distance(5.0), "10 m");
    }

    #[test]
    fn format_distance_km() {
        assert_eq!(format_distance(2500.0), "2.5 km");
    }

    #[test]
    fn format_distance_infinite() {
        assert_eq!(format_distance(f64::INFINITY), "--");
    }
}
