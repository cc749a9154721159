//! Nearby point-of-interest suggestions.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::NavConfig;
use crate::debounce::KeyedThrottle;
use crate::geo::{format_distance, haversine};
use crate::route::Coordinate;

/// A point of interest the host has cached around the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub category: String,
    pub coordinate: Coordinate,
}

/// Transient "you are close to X" signal. The host expires it on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub distance_m: f64,
    pub distance_text: String,
}

/// Candidate set plus per-candidate throttle.
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    candidates: Vec<Candidate>,
    throttle: KeyedThrottle<String>,
}

impl SuggestionEngine {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            candidates: Vec::new(),
            throttle: KeyedThrottle::new(config.suggestions.cooldown()),
        }
    }

    /// Replace the cached candidate set. Throttle history is kept.
    pub fn set_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Suggest the closest eligible candidate within range, at most once per
    /// candidate per throttle window.
    pub fn check(&mut self, location: &Coordinate, now_ms: u64, config: &NavConfig) -> Option<Suggestion> {
        let rules = &config.suggestions;
        let (closest, distance_m) = self
            .candidates
            .iter()
            .filter(|c| rules.allows_category(&c.category) && c.coordinate.is_valid())
            .map(|c| (c, haversine(location, &c.coordinate)))
            .filter(|(_, d)| *d <= rules.radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        if !self.throttle.try_fire(closest.id.clone(), now_ms) {
            return None;
        }
        debug!("suggesting {} at {distance_m:.0} m", closest.id);

        let title = if closest.title.is_empty() {
            closest.id.clone()
        } else {
            closest.title.clone()
        };
        Some(Suggestion {
            id: closest.id.clone(),
            title,
            distance_m,
            distance_text: format_distance(distance_m),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M_PER_DEG: f64 = 111_194.93;
    const MINUTE_MS: u64 = 60_000;

    fn pt(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn here() -> Coordinate {
        pt(48.2, 16.37)
    }

    fn north(meters: f64) -> Coordinate {
        pt(here().lat + meters / M_PER_DEG, here().lng)
    }

    fn candidate(id: &str, category: &str, at: Coordinate) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: format!("{id} title"),
            category: category.to_string(),
            coordinate: at,
        }
    }

    fn engine(candidates: Vec<Candidate>) -> SuggestionEngine {
        let mut e = SuggestionEngine::new(&NavConfig::default());
        e.set_candidates(candidates);
        e
    }

    #[test]
    fn suggested_once_then_throttled_for_four_minutes() {
        let config = NavConfig::default();
        let mut e = engine(vec![candidate("loft", "bar", north(130.0))]);

        let s = e.check(&here(), 0, &config).unwrap();
        assert_eq!(s.id, "loft");
        assert_eq!(s.title, "loft title");
        assert_eq!(s.distance_text, "130 m");

        for t in [MINUTE_MS, 2 * MINUTE_MS, 4 * MINUTE_MS] {
            assert!(e.check(&here(), t, &config).is_none());
        }
        assert!(e.check(&here(), 4 * MINUTE_MS + 1, &config).is_some());
    }

    #[test]
    fn out_of_range_is_ignored() {
        let config = NavConfig::default();
        let mut e = engine(vec![candidate("far", "bar", north(150.0))]);
        assert!(e.check(&here(), 0, &config).is_none());
    }

    #[test]
    fn closest_eligible_candidate_wins() {
        let config = NavConfig::default();
        let mut e = engine(vec![
            candidate("museum", "museum", north(10.0)),
            candidate("pub", "pub", north(90.0)),
            candidate("lounge", "Lounge", north(40.0)),
        ]);
        assert_eq!(e.check(&here(), 0, &config).unwrap().id, "lounge");
    }

    #[test]
    fn throttled_closest_blocks_others() {
        let config = NavConfig::default();
        let mut e = engine(vec![
            candidate("a", "bar", north(20.0)),
            candidate("b", "bar", north(60.0)),
        ]);
        assert_eq!(e.check(&here(), 0, &config).unwrap().id, "a");
        assert!(e.check(&here(), 1_000, &config).is_none());
    }

    #[test]
    fn empty_title_falls_back_to_id() {
        let config = NavConfig::default();
        let mut c = candidate("x", "bar", north(5.0));
        c.title.clear();
        let mut e = engine(vec![c]);
        assert_eq!(e.check(&here(), 0, &config).unwrap().title, "x");
    }
}
