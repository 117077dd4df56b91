//! Admission control for connector activation.
//!
//! Two independent gates, checked in order at activation time:
//! a sliding-window rate limit on activations, then a capacity limit on
//! simultaneously active connectors. Both are advisory-once: a caller who
//! frees a slot must re-issue the request; nothing is queued or retried.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use halo_core::{ConnectorConfig, LaunchSpec};

use crate::hygiene;
use crate::registry;

/// Maximum connectors active simultaneously (prevents session overload).
pub const MAX_ACTIVE: usize = 8;

/// Maximum activations per rate window.
pub const RATE_MAX: usize = 5;

/// Rate window length in seconds.
pub const RATE_WINDOW_SECS: i64 = 60;

/// Sliding window of activation timestamps.
///
/// Stale timestamps are pruned lazily on every check. The window only
/// records *successful* activations; callers check first and record after
/// the activation goes through.
#[derive(Debug)]
pub struct ActivationWindow {
    timestamps: Vec<DateTime<Utc>>,
    max: usize,
    window: Duration,
}

impl ActivationWindow {
    /// Window with the production limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(RATE_MAX, Duration::seconds(RATE_WINDOW_SECS))
    }

    /// Window with custom limits (tests).
    #[must_use]
    pub fn with_limit(max: usize, window: Duration) -> Self {
        Self {
            timestamps: Vec::new(),
            max,
            window,
        }
    }

    /// Whether a new activation at `now` would exceed the limit.
    ///
    /// Prunes timestamps older than the window as a side effect.
    pub fn is_limited(&mut self, now: DateTime<Utc>) -> bool {
        let start = now - self.window;
        self.timestamps.retain(|t| *t > start);
        self.timestamps.len() >= self.max
    }

    /// Record a successful activation.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.timestamps.push(now);
    }

    /// Seconds until the next activation would be admitted, when limited.
    #[must_use]
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let start = now - self.window;
        self.timestamps
            .iter()
            .filter(|t| **t > start)
            .min()
            .map_or(0, |oldest| ((*oldest + self.window) - now).num_seconds().max(0))
    }

    /// Number of activations inside the current window.
    #[must_use]
    pub fn count(&self, now: DateTime<Utc>) -> usize {
        let start = now - self.window;
        self.timestamps.iter().filter(|t| **t > start).count()
    }
}

impl Default for ActivationWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Count of currently active connector slots.
///
/// Boot-enabled, non-placeholder connectors count once; dynamically
/// activated connectors count only when their persisted entry would not
/// already be counted (i.e. it is disabled in config but live in this
/// session). Native subsystems never count.
#[must_use]
pub fn active_count(
    connectors: &HashMap<String, ConnectorConfig>,
    dynamic: &HashMap<String, LaunchSpec>,
) -> usize {
    let boot_active = connectors
        .iter()
        .filter(|(name, config)| {
            !registry::is_native_subsystem(name)
                && !config.disabled
                && !hygiene::has_placeholder_values(config)
        })
        .count();

    let dynamic_only = dynamic
        .keys()
        .filter(|name| connectors.get(*name).is_some_and(|c| c.disabled))
        .count();

    boot_active + dynamic_only
}

/// Outcome of the capacity gate.
#[derive(Debug, Clone)]
pub enum CapacityDecision {
    /// A slot is free.
    Admitted {
        /// Slots in use before this activation.
        active: usize,
    },
    /// Every slot is in use.
    Exhausted {
        /// Slots in use.
        active: usize,
        /// Dynamically-activated, non-core connectors the caller could
        /// deactivate to free a slot, sorted by name.
        candidates: Vec<String>,
    },
}

/// Evaluate the capacity gate for a new activation.
#[must_use]
pub fn check_capacity(
    connectors: &HashMap<String, ConnectorConfig>,
    dynamic: &HashMap<String, LaunchSpec>,
) -> CapacityDecision {
    let active = active_count(connectors, dynamic);
    if active < MAX_ACTIVE {
        return CapacityDecision::Admitted { active };
    }

    let mut candidates: Vec<String> = dynamic
        .keys()
        .filter(|name| !registry::is_core(name))
        .cloned()
        .collect();
    candidates.sort();

    CapacityDecision::Exhausted { active, candidates }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_limits_and_prunes() {
        let now = Utc::now();
        let mut window = ActivationWindow::with_limit(2, Duration::seconds(60));

        assert!(!window.is_limited(now));
        window.record(now);
        window.record(now);
        assert!(window.is_limited(now));

        // Once the entries fall out of the window, the limit clears.
        let later = now + Duration::seconds(61);
        assert!(!window.is_limited(later));
        assert_eq!(window.count(later), 0);
    }

    #[test]
    fn test_retry_after() {
        let now = Utc::now();
        let mut window = ActivationWindow::with_limit(1, Duration::seconds(60));
        window.record(now);
        assert!(window.is_limited(now));

        let wait = window.retry_after_secs(now + Duration::seconds(10));
        assert!(wait > 0 && wait <= 50, "unexpected retry-after {wait}");
    }

    fn boot_config(disabled: bool) -> ConnectorConfig {
        let config = ConnectorConfig::process("npx");
        if disabled { config.disabled() } else { config }
    }

    #[test]
    fn test_active_count_skips_placeholders_and_native() {
        let mut connectors = HashMap::new();
        connectors.insert("github".to_string(), boot_config(false));
        connectors.insert("hindsight".to_string(), boot_config(false));
        connectors.insert(
            "stripe".to_string(),
            ConnectorConfig::process("npx").with_env("KEY", "YOUR_KEY"),
        );

        assert_eq!(active_count(&connectors, &HashMap::new()), 1);
    }

    #[test]
    fn test_dynamic_connectors_count_once() {
        let mut connectors = HashMap::new();
        connectors.insert("github".to_string(), boot_config(false));
        connectors.insert("vercel".to_string(), boot_config(true));

        let mut dynamic = HashMap::new();
        // vercel: disabled at boot, dynamically activated -> +1
        dynamic.insert("vercel".to_string(), LaunchSpec::default());
        // github: already counted as boot-active -> no double count
        dynamic.insert("github".to_string(), LaunchSpec::default());

        assert_eq!(active_count(&connectors, &dynamic), 2);
    }

    #[test]
    fn test_capacity_exhausted_suggests_non_core_dynamic() {
        let mut connectors = HashMap::new();
        for i in 0..MAX_ACTIVE {
            connectors.insert(format!("conn-{i}"), boot_config(false));
        }
        connectors.insert("vercel".to_string(), boot_config(true));
        connectors.insert("memory".to_string(), boot_config(true));

        let mut dynamic = HashMap::new();
        dynamic.insert("vercel".to_string(), LaunchSpec::default());
        dynamic.insert("memory".to_string(), LaunchSpec::default()); // core

        match check_capacity(&connectors, &dynamic) {
            CapacityDecision::Exhausted { active, candidates } => {
                assert_eq!(active, MAX_ACTIVE + 2);
                assert_eq!(candidates, vec!["vercel".to_string()]);
            }
            CapacityDecision::Admitted { .. } => panic!("expected exhaustion"),
        }
    }

    #[test]
    fn test_capacity_admitted_below_limit() {
        let mut connectors = HashMap::new();
        connectors.insert("github".to_string(), boot_config(false));
        match check_capacity(&connectors, &HashMap::new()) {
            CapacityDecision::Admitted { active } => assert_eq!(active, 1),
            CapacityDecision::Exhausted { .. } => panic!("expected admission"),
        }
    }
}
