//! Debounce policies shared by the announcer, the off-route monitor and
//! the suggestion engine.
//!
//! Timestamps are milliseconds supplied by the caller. "Never fired" is
//! `None` rather than epoch zero so that tests and hosts with a
//! monotonic clock starting near zero behave the same as a wall clock.

use std::collections::HashMap;
use std::hash::Hash;

/// Whether a cooldown window closes on or strictly after its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Ready once `now - last >= window`.
    Inclusive,
    /// Ready once `now - last > window`.
    Exclusive,
}

/// Minimum time between two firings of the same signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    window_ms: u64,
    boundary: Boundary,
}

impl Cooldown {
    pub fn new(window_ms: u64, boundary: Boundary) -> Self {
        Self { window_ms, boundary }
    }

    pub fn from_secs(secs: f64, boundary: Boundary) -> Self {
        Self::new((secs.max(0.0) * 1000.0).round() as u64, boundary)
    }

    /// True if a signal last fired at `last` may fire again at `now`.
    ///
    /// A clock that went backwards counts as zero elapsed time.
    pub fn is_ready(&self, last: Option<u64>, now: u64) -> bool {
        let Some(last) = last else {
            return true;
        };
        let elapsed = now.saturating_sub(last);
        match self.boundary {
            Boundary::Inclusive => elapsed >= self.window_ms,
            Boundary::Exclusive => elapsed > self.window_ms,
        }
    }
}

/// Saturating counter of consecutive positive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    count: u32,
    max: u32,
}

impl Streak {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// Record a positive sample and return the new count.
    pub fn hit(&mut self) -> u32 {
        self.count = (self.count + 1).min(self.max);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Per-key cooldown, e.g. one suggestion per point of interest.
#[derive(Debug, Clone)]
pub struct KeyedThrottle<K> {
    cooldown: Cooldown,
    last_fired: HashMap<K, u64>,
}

impl<K: Eq + Hash> KeyedThrottle<K> {
    pub fn new(cooldown: Cooldown) -> Self {
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Fire for `key` at `now` if its cooldown has elapsed, recording the
    /// time. Returns whether it fired.
    pub fn try_fire(&mut self, key: K, now: u64) -> bool {
        let last = self.last_fired.get(&key).copied();
        if !self.cooldown.is_ready(last, now) {
            return false;
        }
        self.last_fired.insert(key, now);
        true
    }
}
