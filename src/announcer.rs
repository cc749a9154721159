//! Turn announcements.
//!
//! Tracks the current maneuver step of a [`NavigationSession`], builds the
//! always-fresh foreground banner and decides when a throttled alert should
//! be raised for a traveler who cannot see the banner.

use log::{debug, info};
use serde::Serialize;

use crate::config::NavConfig;
use crate::geo::{format_distance, haversine};
use crate::route::{Coordinate, ManeuverModifier, RouteStep};
use crate::session::NavigationSession;

/// Foreground banner for the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub step_index: usize,
    pub direction: String,
    pub instruction: String,
    /// `None` when the step has no usable maneuver location.
    pub distance_m: Option<f64>,
    pub distance_text: Option<String>,
}

/// A turn alert to be shown as a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub step_index: usize,
    pub title: String,
    pub body: String,
    pub distance_m: f64,
}

/// Distance to the step's maneuver point; infinite if it has none.
pub fn distance_to_maneuver(location: &Coordinate, step: &RouteStep) -> f64 {
    match step.maneuver_location {
        Some(target) if target.is_valid() && location.is_valid() => haversine(location, &target),
        _ => f64::INFINITY,
    }
}

pub fn direction_text(modifier: ManeuverModifier) -> &'static str {
    match modifier {
        ManeuverModifier::Left => "Turn left",
        ManeuverModifier::Right => "Turn right",
        ManeuverModifier::Straight | ManeuverModifier::Unknown => "Next step",
    }
}

/// The current step index clamped into the step list.
pub fn current_step_index(session: &NavigationSession) -> Option<usize> {
    let last = session.steps.len().checked_sub(1)?;
    Some(session.next_step_index.min(last))
}

/// Move to the next step once the traveler is close to the current
/// maneuver. The terminal step never advances.
///
/// Returns the new step index if it changed.
pub fn advance_step(
    session: &mut NavigationSession,
    location: &Coordinate,
    config: &NavConfig,
) -> Option<usize> {
    let i = current_step_index(session)?;
    let last = session.steps.len() - 1;
    if i < last && distance_to_maneuver(location, &session.steps[i]) < config.step_advance_m {
        session.next_step_index = i + 1;
        debug!("advanced to step {} of {}", i + 1, session.steps.len());
        return Some(i + 1);
    }
    None
}

/// True when the traveler is within the advance radius of the final maneuver.
pub fn has_arrived(session: &NavigationSession, location: &Coordinate, config: &NavConfig) -> bool {
    match current_step_index(session) {
        Some(i) if i + 1 == session.steps.len() => {
            distance_to_maneuver(location, &session.steps[i]) < config.step_advance_m
        }
        _ => false,
    }
}

/// Banner text for the current step. Recomputed on every update.
pub fn banner(session: &NavigationSession, location: &Coordinate) -> Option<Banner> {
    let i = current_step_index(session)?;
    let step = &session.steps[i];
    let distance = distance_to_maneuver(location, step);
    let distance_m = distance.is_finite().then_some(distance);

    Some(Banner {
        step_index: i,
        direction: direction_text(step.maneuver_modifier).to_string(),
        instruction: step.instruction.clone(),
        distance_m,
        distance_text: distance_m.map(format_distance),
    })
}

/// Decide whether the current step warrants an alert at `now_ms`.
///
/// Fires once per step, only inside the mode radius and only after the
/// announce cooldown has passed since the previous alert.
pub fn maybe_announce(
    session: &mut NavigationSession,
    location: &Coordinate,
    now_ms: u64,
    config: &NavConfig,
) -> Option<Announcement> {
    let i = current_step_index(session)?;
    let step = &session.steps[i];
    let distance = distance_to_maneuver(location, step);

    if distance > config.announce.thresholds.for_mode(session.travel_mode) {
        return None;
    }
    if session.last_announced_index == Some(i) {
        return None;
    }
    if !config.announce.cooldown().is_ready(session.last_announced_at, now_ms) {
        return None;
    }

    let announcement = Announcement {
        step_index: i,
        title: format!(
            "{} in {}",
            direction_text(step.maneuver_modifier),
            format_distance(distance)
        ),
        body: step.instruction.clone(),
        distance_m: distance,
    };

    session.last_announced_index = Some(i);
    session.last_announced_at = Some(now_ms);
    info!("announcing step {i} at {distance:.0} m");

    Some(announcement)
}
