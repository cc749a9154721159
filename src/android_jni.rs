//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to an `external fun` declaration
//! in NavBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! Structured values cross the boundary as JSON strings. The navigation
//! state lives in a process-wide coordinator, so a fresh process always
//! starts with no active session. Foreground and background callbacks may
//! arrive on different threads; the coordinator serializes them.

use std::sync::OnceLock;

use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jdouble, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{error, warn};
use serde::Serialize;

use crate::config::NavConfig;
use crate::error::NavError;
use crate::route::{Coordinate, Route, TravelMode};
use crate::session::{LocationFix, SessionCoordinator};
use crate::suggestions::Candidate;

fn coordinator() -> &'static SessionCoordinator {
    static COORDINATOR: OnceLock<SessionCoordinator> = OnceLock::new();
    COORDINATOR.get_or_init(SessionCoordinator::default)
}

/// Read a Java string, `None` for null or unreadable input.
fn read_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    match env.get_string(value) {
        Ok(s) => Some(s.into()),
        Err(e) => {
            error!("failed to read Java string: {e}");
            None
        }
    }
}

fn new_string(env: &JNIEnv, value: &str) -> jstring {
    match env.new_string(value) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            error!("failed to create Java string: {e}");
            std::ptr::null_mut()
        }
    }
}

fn to_json<T: Serialize>(env: &JNIEnv, value: &T) -> jstring {
    match serde_json::to_string(value) {
        Ok(json) => new_string(env, &json),
        Err(e) => {
            error!("JSON serialize error: {e}");
            std::ptr::null_mut()
        }
    }
}

fn as_jboolean(ok: bool) -> jboolean {
    if ok { JNI_TRUE } else { JNI_FALSE }
}

fn fix(lat: jdouble, lng: jdouble, accuracy: jdouble, time_ms: jlong) -> LocationFix {
    let accuracy_m = (accuracy.is_finite() && accuracy >= 0.0).then_some(accuracy);
    LocationFix::new(
        Coordinate::new(lat, lng),
        accuracy_m,
        u64::try_from(time_ms).unwrap_or(0),
    )
}

/// Install the Android log backend. Safe to call more than once.
/// Maps to: NavBridge.init()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_init(_env: JNIEnv, _class: JClass) {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("navcore"),
    );
}

/// Returns the library version.
/// Maps to: NavBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_version(
    env: JNIEnv,
    _class: JClass,
) -> jstring {
    new_string(&env, crate::VERSION)
}

/// Replace the guidance configuration with a (partial) JSON config.
/// Maps to: NavBridge.configure(json: String) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_configure(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jboolean {
    let Some(json) = read_string(&mut env, &json) else {
        return JNI_FALSE;
    };
    let result = NavConfig::from_json(&json).and_then(|c| coordinator().configure(c));
    if let Err(e) = &result {
        warn!("configure rejected: {e}");
    }
    as_jboolean(result.is_ok())
}

/// Start navigating a provider route.
/// Maps to: NavBridge.startNavigation(routeJson: String, mode: String, destinationName: String?) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_startNavigation(
    mut env: JNIEnv,
    _class: JClass,
    route_json: JString,
    mode: JString,
    destination_name: JString,
) -> jboolean {
    let Some(route_json) = read_string(&mut env, &route_json) else {
        return JNI_FALSE;
    };
    let mode = read_string(&mut env, &mode)
        .map(|m| TravelMode::parse(&m))
        .unwrap_or_default();
    let destination_name = read_string(&mut env, &destination_name);

    let result = Route::from_json(&route_json)
        .and_then(|route| coordinator().start(route, mode, destination_name));
    if let Err(e) = &result {
        warn!("navigation not started: {e}");
    }
    as_jboolean(result.is_ok())
}

/// Maps to: NavBridge.setFollowing(following: Boolean)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_setFollowing(
    _env: JNIEnv,
    _class: JClass,
    following: jboolean,
) {
    coordinator().set_following(following != JNI_FALSE);
}

/// Replace the cached nearby candidates with a JSON array.
/// Maps to: NavBridge.setNearbyCandidates(json: String) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_setNearbyCandidates(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jboolean {
    let Some(json) = read_string(&mut env, &json) else {
        return JNI_FALSE;
    };
    match serde_json::from_str::<Vec<Candidate>>(&json) {
        Ok(candidates) => {
            coordinator().set_candidates(candidates);
            JNI_TRUE
        }
        Err(e) => {
            warn!("bad candidate list: {e}");
            JNI_FALSE
        }
    }
}

/// Foreground location update. Returns the foreground output as JSON.
/// Maps to: NavBridge.onForegroundLocation(lat: Double, lng: Double, accuracy: Double, timeMs: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_onForegroundLocation(
    env: JNIEnv,
    _class: JClass,
    lat: jdouble,
    lng: jdouble,
    accuracy: jdouble,
    time_ms: jlong,
) -> jstring {
    let output = coordinator().update_foreground(&fix(lat, lng, accuracy, time_ms));
    to_json(&env, &output)
}

/// Background location update. Returns an announcement as JSON, or null.
/// Maps to: NavBridge.onBackgroundLocation(lat: Double, lng: Double, accuracy: Double, timeMs: Long) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_onBackgroundLocation(
    env: JNIEnv,
    _class: JClass,
    lat: jdouble,
    lng: jdouble,
    accuracy: jdouble,
    time_ms: jlong,
) -> jstring {
    match coordinator().update_background(&fix(lat, lng, accuracy, time_ms)) {
        Some(announcement) => to_json(&env, &announcement),
        None => std::ptr::null_mut(),
    }
}

/// Deliver the provider response for a reroute request.
/// Maps to: NavBridge.completeReroute(generation: Long, routeJson: String)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_completeReroute(
    mut env: JNIEnv,
    _class: JClass,
    generation: jlong,
    route_json: JString,
) {
    let result = match read_string(&mut env, &route_json) {
        Some(json) => Route::from_json(&json),
        None => Err(NavError::RouteProvider("missing route payload".into())),
    };
    coordinator().complete_reroute(u64::try_from(generation).unwrap_or(0), result);
}

/// Report a failed reroute request so a later update can retry.
/// Maps to: NavBridge.failReroute(generation: Long, message: String?)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_failReroute(
    mut env: JNIEnv,
    _class: JClass,
    generation: jlong,
    message: JString,
) {
    let message = read_string(&mut env, &message).unwrap_or_else(|| "unknown error".into());
    coordinator().complete_reroute(
        u64::try_from(generation).unwrap_or(0),
        Err(NavError::RouteProvider(message)),
    );
}

/// Maps to: NavBridge.stopNavigation()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_stopNavigation(_env: JNIEnv, _class: JClass) {
    coordinator().stop();
}

/// Maps to: NavBridge.isActive() -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_navcore_app_NavBridge_isActive(_env: JNIEnv, _class: JClass) -> jboolean {
    as_jboolean(coordinator().is_active())
}
