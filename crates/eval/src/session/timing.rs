//! Time accounting for a test session.
//!
//! There is no timer. Every transition hands in the current instant and
//! the time since the previous one is credited to the components the
//! candidate is in. Suspended sessions accrue nothing.

use std::collections::BTreeMap;

use qti_core::TimeLimits;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Which level of the test a time limit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitLevel {
    Test,
    TestPart,
    Section,
    Item,
}

/// A maximum time that forced a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLimitExit {
    pub level: LimitLevel,
    pub component: String,
    pub spent: Duration,
}

/// Durations of the test, its parts and sections, keyed by identifier.
/// Item durations live in their item sessions.
#[derive(Debug, Clone, Default)]
pub struct Timing {
    pub(crate) durations: BTreeMap<String, Duration>,
    pub(crate) last: Option<OffsetDateTime>,
}

impl Timing {
    pub fn start(&mut self, now: OffsetDateTime) {
        self.last = Some(now);
    }

    pub fn stop(&mut self) {
        self.last = None;
    }

    pub fn is_running(&self) -> bool {
        self.last.is_some()
    }

    /// Time since the previous instant; clocks going backwards count as
    /// no time at all.
    pub fn elapse(&mut self, now: OffsetDateTime) -> Duration {
        let Some(last) = self.last.replace(now) else {
            return Duration::ZERO;
        };
        let elapsed = now - last;
        if elapsed.is_negative() {
            Duration::ZERO
        } else {
            elapsed
        }
    }

    pub fn add(&mut self, component: &str, elapsed: Duration) {
        *self
            .durations
            .entry(component.to_string())
            .or_insert(Duration::ZERO) += elapsed;
    }

    pub fn get(&self, component: &str) -> Duration {
        self.durations
            .get(component)
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Whether `spent` runs over the maximum of `limits` in a way that forces
/// the component to end.
pub fn max_exceeded(limits: &TimeLimits, spent: Duration) -> bool {
    !limits.allow_late_submission && limits.max_time.is_some_and(|max| spent > max)
}

/// Whether leaving now would be before the minimum of `limits`.
pub fn min_not_reached(limits: &TimeLimits, spent: Duration) -> bool {
    limits.min_time.is_some_and(|min| spent < min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn elapsed_time_is_credited_between_instants() {
        let mut t = Timing::default();
        assert_eq!(t.elapse(datetime!(2024-01-01 10:00 UTC)), Duration::ZERO);
        t.start(datetime!(2024-01-01 10:00 UTC));
        let d = t.elapse(datetime!(2024-01-01 10:01 UTC));
        assert_eq!(d, Duration::minutes(1));
        t.add("P", d);
        t.add("P", Duration::seconds(5));
        assert_eq!(t.get("P"), Duration::seconds(65));
        assert_eq!(t.get("Q"), Duration::ZERO);
    }

    #[test]
    fn clocks_going_backwards_accrue_nothing() {
        let mut t = Timing::default();
        t.start(datetime!(2024-01-01 10:00 UTC));
        assert_eq!(t.elapse(datetime!(2024-01-01 09:00 UTC)), Duration::ZERO);
    }

    #[test]
    fn late_submission_suppresses_forcing() {
        let mut limits = TimeLimits::max(Duration::seconds(30));
        assert!(max_exceeded(&limits, Duration::seconds(31)));
        assert!(!max_exceeded(&limits, Duration::seconds(30)));
        limits.allow_late_submission = true;
        assert!(!max_exceeded(&limits, Duration::seconds(31)));

        limits.min_time = Some(Duration::seconds(10));
        assert!(min_not_reached(&limits, Duration::seconds(9)));
        assert!(!min_not_reached(&limits, Duration::seconds(10)));
    }
}
