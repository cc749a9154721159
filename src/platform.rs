//! Host collaborators and the runtime that wires them to the coordinator.
//!
//! The host supplies two location feeds (foreground and background), a
//! route provider and a notification emitter. [`GuidanceRuntime`] keeps the
//! subscriptions, runs reroute requests on a worker thread and tears
//! everything down when the traveler leaves navigation.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::error::{NavError, Result};
use crate::route::{Coordinate, Route, TravelMode};
use crate::session::{ForegroundOutput, LocationFix, RerouteRequest, SessionCoordinator};

/// Callback invoked once per delivered location fix.
pub type LocationCallback = Box<dyn FnMut(LocationFix) + Send + 'static>;

/// Callback receiving each foreground result, typically the UI layer.
pub type ForegroundListener = Box<dyn FnMut(&ForegroundOutput) + Send + 'static>;

/// An active location subscription.
pub trait Subscription: Send {
    fn unsubscribe(self: Box<Self>);
}

/// Push-style location feed.
pub trait LocationSource {
    /// Start delivering fixes to `on_update`.
    ///
    /// Background sources return [`crate::error::NavError::BackgroundUnavailable`]
    /// when the permission or runtime support is missing.
    fn subscribe(&self, on_update: LocationCallback) -> Result<Box<dyn Subscription>>;
}

/// Computes routes. The core does not care which provider or protocol.
pub trait RouteProvider: Send + Sync {
    fn request(&self, origin: Coordinate, destination: Coordinate, mode: TravelMode) -> Result<Route>;
}

/// Fire-and-forget OS notifications.
pub trait NotificationEmitter: Send + Sync {
    fn emit(&self, title: &str, body: &str) -> Result<()>;
}

/// Reports a failed reroute if the worker unwinds before completing.
struct RerouteGuard {
    coordinator: Arc<SessionCoordinator>,
    generation: u64,
    completed: bool,
}

impl RerouteGuard {
    fn complete(mut self, result: Result<Route>) {
        self.completed = true;
        self.coordinator.complete_reroute(self.generation, result);
    }
}

impl Drop for RerouteGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!("route provider panicked");
            self.coordinator.complete_reroute(
                self.generation,
                Err(NavError::RouteProvider("route provider panicked".into())),
            );
        }
    }
}

/// Request a route for `request` on a worker thread and feed the result
/// back to the coordinator, success or failure.
pub fn dispatch_reroute(
    coordinator: Arc<SessionCoordinator>,
    provider: Arc<dyn RouteProvider>,
    request: RerouteRequest,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let guard = RerouteGuard {
            coordinator,
            generation: request.generation,
            completed: false,
        };
        debug!("requesting reroute from {:?}", request.origin);
        let result = provider.request(request.origin, request.destination, request.mode);
        guard.complete(result);
    })
}

/// Foreground and background wiring for one navigation screen.
pub struct GuidanceRuntime {
    coordinator: Arc<SessionCoordinator>,
    route_provider: Arc<dyn RouteProvider>,
    notifier: Arc<dyn NotificationEmitter>,
    foreground: Option<Box<dyn Subscription>>,
    background: Option<Box<dyn Subscription>>,
}

impl GuidanceRuntime {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        route_provider: Arc<dyn RouteProvider>,
        notifier: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self {
            coordinator,
            route_provider,
            notifier,
            foreground: None,
            background: None,
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// Subscribe the foreground feed. Replaces an earlier foreground
    /// subscription.
    pub fn start_foreground(
        &mut self,
        source: &dyn LocationSource,
        mut listener: ForegroundListener,
    ) -> Result<()> {
        if let Some(old) = self.foreground.take() {
            old.unsubscribe();
        }
        let coordinator = Arc::clone(&self.coordinator);
        let provider = Arc::clone(&self.route_provider);

        let subscription = source.subscribe(Box::new(move |fix| {
            let output = coordinator.update_foreground(&fix);
            if let Some(request) = &output.reroute {
                dispatch_reroute(Arc::clone(&coordinator), Arc::clone(&provider), request.clone());
            }
            listener(&output);
        }))?;

        self.foreground = Some(subscription);
        Ok(())
    }

    /// Subscribe the background feed. Missing support is logged and
    /// otherwise ignored; foreground guidance works without it.
    pub fn start_background(&mut self, source: &dyn LocationSource) {
        if let Some(old) = self.background.take() {
            old.unsubscribe();
        }
        let coordinator = Arc::clone(&self.coordinator);
        let notifier = Arc::clone(&self.notifier);

        let subscribed = source.subscribe(Box::new(move |fix| {
            let Some(announcement) = coordinator.update_background(&fix) else {
                return;
            };
            if let Err(e) = notifier.emit(&announcement.title, &announcement.body) {
                debug!("turn alert dropped: {e}");
            }
        }));

        match subscribed {
            Ok(subscription) => {
                info!("background guidance started");
                self.background = Some(subscription);
            }
            Err(e) => warn!("background guidance unavailable: {e}"),
        }
    }

    pub fn background_running(&self) -> bool {
        self.background.is_some()
    }

    /// Leave navigation: drop both feeds and clear the session.
    pub fn leave(&mut self) {
        if let Some(sub) = self.foreground.take() {
            sub.unsubscribe();
        }
        if let Some(sub) = self.background.take() {
            sub.unsubscribe();
            info!("background guidance stopped");
        }
        self.coordinator.stop();
    }
}

impl Drop for GuidanceRuntime {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;
    use crate::route::{ManeuverModifier, RouteStep};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    const M_PER_DEG: f64 = 111_194.93;

    fn vertex(i: usize) -> Coordinate {
        Coordinate::new(48.0 + i as f64 * 100.0 / M_PER_DEG, 16.0)
    }

    fn east_of(c: Coordinate, meters: f64) -> Coordinate {
        Coordinate::new(c.lat, c.lng + meters / (M_PER_DEG * c.lat.to_radians().cos()))
    }

    fn route() -> Route {
        Route {
            distance_meters: 1_900.0,
            duration_seconds: 240.0,
            polyline: (0..20).map(vertex).collect(),
            steps: vec![
                RouteStep {
                    instruction: "Turn right".into(),
                    distance_meters: 500.0,
                    duration_seconds: 60.0,
                    maneuver_location: Some(vertex(5)),
                    maneuver_modifier: ManeuverModifier::Right,
                },
                RouteStep {
                    instruction: "Arrive".into(),
                    distance_meters: 1_400.0,
                    duration_seconds: 180.0,
                    maneuver_location: Some(vertex(19)),
                    maneuver_modifier: ManeuverModifier::Straight,
                },
            ],
        }
    }

    type Slot = Arc<Mutex<Option<LocationCallback>>>;

    #[derive(Default)]
    struct FakeSource {
        slot: Slot,
        unsupported: bool,
    }

    struct FakeSubscription(Slot);

    impl Subscription for FakeSubscription {
        fn unsubscribe(self: Box<Self>) {
            self.0.lock().unwrap().take();
        }
    }

    impl LocationSource for FakeSource {
        fn subscribe(&self, on_update: LocationCallback) -> Result<Box<dyn Subscription>> {
            if self.unsupported {
                return Err(NavError::BackgroundUnavailable("sandbox".into()));
            }
            *self.slot.lock().unwrap() = Some(on_update);
            Ok(Box::new(FakeSubscription(Arc::clone(&self.slot))))
        }
    }

    impl FakeSource {
        fn push(&self, at: Coordinate, t: u64) {
            if let Some(cb) = self.slot.lock().unwrap().as_mut() {
                cb(LocationFix::new(at, Some(5.0), t));
            }
        }

        fn subscribed(&self) -> bool {
            self.slot.lock().unwrap().is_some()
        }
    }

    struct FakeProvider {
        fail: bool,
    }

    struct PanickingProvider;

    impl RouteProvider for PanickingProvider {
        fn request(&self, _: Coordinate, _: Coordinate, _: TravelMode) -> Result<Route> {
            panic!("provider bug");
        }
    }

    impl RouteProvider for FakeProvider {
        fn request(&self, origin: Coordinate, destination: Coordinate, _mode: TravelMode) -> Result<Route> {
            if self.fail {
                return Err(NavError::RouteProvider("timeout".into()));
            }
            let mut r = route();
            r.polyline[0] = origin;
            *r.polyline.last_mut().unwrap() = destination;
            r.steps.truncate(1);
            Ok(r)
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        denied: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl NotificationEmitter for FakeNotifier {
        fn emit(&self, title: &str, body: &str) -> Result<()> {
            if self.denied {
                return Err(NavError::NotificationUnavailable("permission denied".into()));
            }
            self.sent.lock().unwrap().push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct Harness {
        runtime: GuidanceRuntime,
        notifier: Arc<FakeNotifier>,
        outputs: Arc<Mutex<Vec<ForegroundOutput>>>,
        fg: FakeSource,
        bg: FakeSource,
    }

    fn harness(provider_fails: bool, notifications_denied: bool) -> Harness {
        let coordinator = Arc::new(SessionCoordinator::default());
        coordinator.start(route(), TravelMode::Driving, None).unwrap();
        let notifier = Arc::new(FakeNotifier {
            denied: notifications_denied,
            ..Default::default()
        });
        let mut runtime = GuidanceRuntime::new(
            coordinator,
            Arc::new(FakeProvider { fail: provider_fails }),
            notifier.clone(),
        );
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outputs);
        let fg = FakeSource::default();
        let bg = FakeSource::default();
        runtime
            .start_foreground(&fg, Box::new(move |o| sink.lock().unwrap().push(o.clone())))
            .unwrap();
        runtime.start_background(&bg);
        Harness {
            runtime,
            notifier,
            outputs,
            fg,
            bg,
        }
    }

    fn wait_for_reroute(coordinator: &SessionCoordinator) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while coordinator.reroute_in_flight() {
            assert!(Instant::now() < deadline, "reroute never completed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn foreground_fixes_reach_the_listener() {
        let h = harness(false, false);
        h.fg.push(vertex(1), 1_000);
        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].banner.is_some());
    }

    #[test]
    fn background_fix_emits_one_notification() {
        let h = harness(false, false);
        let near = Coordinate::new(vertex(5).lat - 80.0 / M_PER_DEG, 16.0);
        h.bg.push(near, 100_000);
        h.bg.push(near, 101_000);
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Turn right");
    }

    #[test]
    fn denied_notifications_are_silent() {
        let h = harness(false, true);
        let near = Coordinate::new(vertex(5).lat - 80.0 / M_PER_DEG, 16.0);
        h.bg.push(near, 100_000);
        h.fg.push(near, 100_500);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert!(h.outputs.lock().unwrap()[0].banner.is_some());
    }

    #[test]
    fn unsupported_background_is_not_fatal() {
        let coordinator = Arc::new(SessionCoordinator::default());
        let mut runtime = GuidanceRuntime::new(
            coordinator,
            Arc::new(FakeProvider { fail: false }),
            Arc::new(FakeNotifier::default()),
        );
        runtime.start_background(&FakeSource {
            unsupported: true,
            ..Default::default()
        });
        assert!(!runtime.background_running());
    }

    #[test]
    fn reroute_round_trip_installs_new_route() {
        let h = harness(false, false);
        h.fg.push(east_of(vertex(8), 95.0), 10_000);
        h.fg.push(east_of(vertex(9), 95.0), 11_000);
        assert!(h.outputs.lock().unwrap()[1].reroute.is_some());

        let coordinator = h.runtime.coordinator();
        wait_for_reroute(coordinator);
        let session = coordinator.session();
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.next_step_index, 0);
    }

    #[test]
    fn failed_reroute_clears_in_flight() {
        let h = harness(true, false);
        h.fg.push(east_of(vertex(8), 95.0), 10_000);
        h.fg.push(east_of(vertex(9), 95.0), 11_000);
        let coordinator = h.runtime.coordinator();
        wait_for_reroute(coordinator);
        assert!(coordinator.is_active());
    }

    #[test]
    fn panicking_provider_does_not_leave_reroute_in_flight() {
        let coordinator = Arc::new(SessionCoordinator::default());
        coordinator.start(route(), TravelMode::Driving, None).unwrap();
        coordinator.update_foreground(&LocationFix::new(east_of(vertex(8), 95.0), None, 10_000));
        let request = coordinator
            .update_foreground(&LocationFix::new(east_of(vertex(9), 95.0), None, 11_000))
            .reroute
            .unwrap();
        assert!(coordinator.reroute_in_flight());

        let handle = dispatch_reroute(Arc::clone(&coordinator), Arc::new(PanickingProvider), request);
        assert!(handle.join().is_err());
        assert!(!coordinator.reroute_in_flight());
        assert!(coordinator.is_active());
    }

    #[test]
    fn leave_unsubscribes_and_clears_session() {
        let mut h = harness(false, false);
        h.runtime.leave();
        assert!(!h.fg.subscribed());
        assert!(!h.bg.subscribed());
        assert!(!h.runtime.background_running());
        assert!(!h.runtime.coordinator().is_active());

        h.fg.push(vertex(5), 1_000);
        h.bg.push(vertex(5), 1_000);
        assert!(h.outputs.lock().unwrap().is_empty());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }
}
