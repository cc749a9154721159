//! Off-route detection.
//!
//! A reroute fires only after a streak of samples beyond the mode
//! tolerance, never while a previous request is still in flight, and,
//! after the first reroute, only once both the reroute cooldown has
//! elapsed and the traveler has moved away from the last reroute origin.

use log::{debug, info};
use serde::Serialize;

use crate::config::NavConfig;
use crate::debounce::Streak;
use crate::geo::{haversine, nearest_polyline_index};
use crate::route::{Coordinate, TravelMode};

/// Outcome of one off-route evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OffRouteDecision {
    /// Preconditions not met: short polyline, overview mode or request in flight.
    NotChecked,
    OnRoute { distance_m: f64 },
    /// Beyond tolerance but the streak is still too short.
    Deviating { distance_m: f64, streak: u32 },
    /// Streak reached but the cooldown or movement guard holds.
    Held { distance_m: f64 },
    /// A reroute must be requested from this origin.
    Reroute { origin: Coordinate, distance_m: f64 },
}

/// Streak, cooldown and in-flight bookkeeping for one navigation.
#[derive(Debug, Clone)]
pub struct OffRouteMonitor {
    streak: Streak,
    last_reroute_at: Option<u64>,
    last_reroute_origin: Option<Coordinate>,
    in_flight: bool,
}

impl OffRouteMonitor {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            streak: Streak::new(config.off_route.max_streak),
            last_reroute_at: None,
            last_reroute_origin: None,
            in_flight: false,
        }
    }

    /// Apply a new configuration mid-navigation.
    ///
    /// The in-flight flag and the last reroute time and origin carry over,
    /// so a pending request still suppresses new triggers and the cooldown
    /// and movement guards keep counting from the last reroute. Only the
    /// streak restarts under the new limit.
    pub fn reconfigure(&mut self, config: &NavConfig) {
        self.streak = Streak::new(config.off_route.max_streak);
    }

    /// Evaluate one location sample against the route polyline.
    ///
    /// On [`OffRouteDecision::Reroute`] the monitor records the reroute and
    /// stays in flight until [`OffRouteMonitor::finish_reroute`] is called.
    pub fn check(
        &mut self,
        location: &Coordinate,
        polyline: &[Coordinate],
        following: bool,
        mode: TravelMode,
        now_ms: u64,
        config: &NavConfig,
    ) -> OffRouteDecision {
        let rules = &config.off_route;
        if polyline.len() < rules.min_polyline_points || !following || self.in_flight {
            return OffRouteDecision::NotChecked;
        }
        let Some(nearest) = nearest_polyline_index(location, polyline, config.nearest_max_samples)
        else {
            return OffRouteDecision::NotChecked;
        };
        let distance_m = nearest.distance_m;

        if distance_m <= rules.thresholds.for_mode(mode) {
            self.streak.reset();
            return OffRouteDecision::OnRoute { distance_m };
        }

        let streak = self.streak.hit();
        if streak < rules.required_streak {
            debug!("off route by {distance_m:.0} m, streak {streak}");
            return OffRouteDecision::Deviating { distance_m, streak };
        }

        if let (Some(at), Some(origin)) = (self.last_reroute_at, self.last_reroute_origin) {
            let cooled = rules.cooldown().is_ready(Some(at), now_ms);
            let moved = haversine(&origin, location) >= rules.required_movement_m(mode);
            if !(cooled && moved) {
                debug!("reroute held: cooled={cooled} moved={moved}");
                return OffRouteDecision::Held { distance_m };
            }
        }

        self.last_reroute_at = Some(now_ms);
        self.last_reroute_origin = Some(*location);
        self.streak.reset();
        self.in_flight = true;
        info!("off route by {distance_m:.0} m, requesting reroute");

        OffRouteDecision::Reroute {
            origin: *location,
            distance_m,
        }
    }

    /// Clear the in-flight flag after the reroute succeeded or failed.
    pub fn finish_reroute(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn streak(&self) -> u32 {
        self.streak.count()
    }
}
