//! Navigation session and its coordinator.
//!
//! [`SessionCoordinator`] is the single owner of the live session. The
//! foreground loop and the background task both go through it, one
//! location fix at a time, and it serializes them behind one mutex so the
//! two contexts may run on different threads. Fields are last-write-wins:
//! fixes carry increasing timestamps and every update is idempotent for a
//! given fix.

use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::announcer::{self, Announcement, Banner};
use crate::config::NavConfig;
use crate::error::Result;
use crate::off_route::{OffRouteDecision, OffRouteMonitor};
use crate::progress::{self, RouteProgress};
use crate::route::{Coordinate, Route, RouteStep, TravelMode};
use crate::suggestions::{Candidate, Suggestion, SuggestionEngine};

/// The live "navigation in progress" record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSession {
    pub active: bool,
    pub travel_mode: TravelMode,
    pub destination_name: Option<String>,
    pub steps: Vec<RouteStep>,
    /// Current step. Only grows between resets.
    pub next_step_index: usize,
    /// Step of the last alert, `None` if nothing was announced yet.
    pub last_announced_index: Option<usize>,
    /// Time of the last alert in milliseconds, `None` if never.
    pub last_announced_at: Option<u64>,
}

impl NavigationSession {
    pub fn inactive() -> Self {
        Self {
            active: false,
            travel_mode: TravelMode::default(),
            destination_name: None,
            steps: Vec::new(),
            next_step_index: 0,
            last_announced_index: None,
            last_announced_at: None,
        }
    }

    pub fn start(route: &Route, travel_mode: TravelMode, destination_name: Option<String>) -> Self {
        Self {
            active: true,
            travel_mode,
            destination_name,
            steps: route.steps.clone(),
            ..Self::inactive()
        }
    }

    /// Back to the first step with no announcement history.
    pub fn reset_progress(&mut self) {
        self.next_step_index = 0;
        self.last_announced_index = None;
        self.last_announced_at = None;
    }

    pub fn clear(&mut self) {
        *self = Self::inactive();
    }
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::inactive()
    }
}

/// One delivered device position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// Horizontal accuracy in meters, when the platform reports it.
    pub accuracy_m: Option<f64>,
    pub timestamp_ms: u64,
}

impl LocationFix {
    pub fn new(coordinate: Coordinate, accuracy_m: Option<f64>, timestamp_ms: u64) -> Self {
        Self {
            coordinate,
            accuracy_m,
            timestamp_ms,
        }
    }
}

/// A reroute the host must request from the route provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerouteRequest {
    /// Session generation the result belongs to.
    pub generation: u64,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: TravelMode,
}

/// Everything the foreground loop derives from one fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundOutput {
    pub active: bool,
    pub remaining_polyline: Vec<Coordinate>,
    pub progress: Option<RouteProgress>,
    pub banner: Option<Banner>,
    pub advanced_to: Option<usize>,
    /// Turn alert, shared throttle with the background path.
    pub announcement: Option<Announcement>,
    pub arrived: bool,
    pub off_route: OffRouteDecision,
    pub reroute: Option<RerouteRequest>,
    pub suggestion: Option<Suggestion>,
}

impl ForegroundOutput {
    fn inactive() -> Self {
        Self {
            active: false,
            remaining_polyline: Vec::new(),
            progress: None,
            banner: None,
            advanced_to: None,
            announcement: None,
            arrived: false,
            off_route: OffRouteDecision::NotChecked,
            reroute: None,
            suggestion: None,
        }
    }
}

/// State behind the coordinator lock.
#[derive(Debug)]
struct Guidance {
    config: NavConfig,
    session: NavigationSession,
    route: Option<Route>,
    following: bool,
    off_route: OffRouteMonitor,
    suggestions: SuggestionEngine,
    /// Bumped on every start and stop so late reroute results can be dropped.
    generation: u64,
}

/// Owner of the shared navigation state.
#[derive(Debug)]
pub struct SessionCoordinator {
    inner: Mutex<Guidance>,
}

impl SessionCoordinator {
    pub fn new(config: NavConfig) -> Self {
        Self {
            inner: Mutex::new(Guidance {
                off_route: OffRouteMonitor::new(&config),
                suggestions: SuggestionEngine::new(&config),
                config,
                session: NavigationSession::inactive(),
                route: None,
                following: true,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Guidance> {
        // Every update leaves the state consistent, so a panic elsewhere
        // does not invalidate it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the configuration. A pending reroute stays in flight and
    /// the reroute cooldown keeps running; suggestion history restarts.
    pub fn configure(&self, config: NavConfig) -> Result<()> {
        config.validate()?;
        let mut g = self.lock();
        g.off_route.reconfigure(&config);
        let candidates = g.suggestions.candidates().to_vec();
        g.suggestions = SuggestionEngine::new(&config);
        g.suggestions.set_candidates(candidates);
        g.config = config;
        Ok(())
    }

    /// Start navigating `route`, replacing any previous session.
    pub fn start(
        &self,
        route: Route,
        travel_mode: TravelMode,
        destination_name: Option<String>,
    ) -> Result<()> {
        route.validate()?;
        let mut g = self.lock();
        g.session = NavigationSession::start(&route, travel_mode, destination_name);
        g.off_route = OffRouteMonitor::new(&g.config);
        g.route = Some(route);
        g.following = true;
        g.generation += 1;
        info!(
            "navigation started: {} steps, mode {travel_mode}",
            g.session.steps.len()
        );
        Ok(())
    }

    /// End the session. Later fixes produce no output until the next start.
    pub fn stop(&self) {
        let mut g = self.lock();
        if g.session.active {
            info!("navigation stopped");
        }
        g.session.clear();
        g.route = None;
        g.off_route = OffRouteMonitor::new(&g.config);
        g.generation += 1;
    }

    /// Toggle between following the traveler and the route overview.
    pub fn set_following(&self, following: bool) {
        self.lock().following = following;
    }

    pub fn set_candidates(&self, candidates: Vec<Candidate>) {
        self.lock().suggestions.set_candidates(candidates);
    }

    pub fn is_active(&self) -> bool {
        self.lock().session.active
    }

    pub fn reroute_in_flight(&self) -> bool {
        self.lock().off_route.in_flight()
    }

    /// Copy of the current session record.
    pub fn session(&self) -> NavigationSession {
        self.lock().session.clone()
    }

    /// Foreground tick: progress, banner, turn alert, off-route and
    /// suggestions.
    pub fn update_foreground(&self, fix: &LocationFix) -> ForegroundOutput {
        let mut g = self.lock();
        let Guidance {
            config,
            session,
            route,
            following,
            off_route,
            suggestions,
            generation,
        } = &mut *g;

        let Some(route) = route.as_ref().filter(|_| session.active) else {
            return ForegroundOutput::inactive();
        };
        let location = &fix.coordinate;
        let now = fix.timestamp_ms;

        let advanced_to = announcer::advance_step(session, location, config);
        let announcement = announcer::maybe_announce(session, location, now, config);
        let arrived = announcer::has_arrived(session, location, config);
        let polyline = &route.polyline;

        let decision = off_route.check(
            location,
            polyline,
            *following,
            session.travel_mode,
            now,
            config,
        );
        let reroute = match decision {
            OffRouteDecision::Reroute { origin, .. } => {
                // The old steps no longer describe the way ahead.
                session.reset_progress();
                session.steps.clear();
                route.destination().map(|destination| RerouteRequest {
                    generation: *generation,
                    origin,
                    destination,
                    mode: session.travel_mode,
                })
            }
            _ => None,
        };

        ForegroundOutput {
            active: true,
            remaining_polyline: progress::remaining_polyline(
                location,
                polyline,
                *following,
                config.nearest_max_samples,
            )
            .to_vec(),
            progress: progress::route_progress(location, polyline, config.nearest_max_samples),
            banner: announcer::banner(session, location),
            advanced_to,
            announcement,
            arrived,
            off_route: decision,
            reroute,
            suggestion: suggestions.check(location, now, config),
        }
    }

    /// Background tick: step advance and the throttled alert only.
    pub fn update_background(&self, fix: &LocationFix) -> Option<Announcement> {
        let mut g = self.lock();
        let Guidance {
            config, session, ..
        } = &mut *g;
        if !session.active {
            return None;
        }
        announcer::advance_step(session, &fix.coordinate, config);
        announcer::maybe_announce(session, &fix.coordinate, fix.timestamp_ms, config)
    }

    /// Feed back the outcome of a reroute request.
    ///
    /// Always clears the in-flight flag for the current generation. A
    /// result for a stopped or replaced session is dropped.
    pub fn complete_reroute(&self, generation: u64, result: Result<Route>) {
        let mut g = self.lock();
        if generation != g.generation || !g.session.active {
            debug!("dropping reroute result for stale session {generation}");
            return;
        }
        g.off_route.finish_reroute();

        match result.and_then(|route| route.validate().map(|_| route)) {
            Ok(route) => {
                g.session.steps = route.steps.clone();
                g.session.reset_progress();
                g.route = Some(route);
                info!("reroute applied: {} steps", g.session.steps.len());
            }
            Err(e) => warn!("reroute failed: {e}"),
        }
    }
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new(NavConfig::default())
    }
}
