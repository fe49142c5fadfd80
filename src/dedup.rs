//! In-run duplicate suppression keyed by normalized phone number.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Outcome of a cooldown check for one normalized phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// No recently completed processing for this number.
    Proceed,
    /// The number finished processing within the cooldown window.
    SuppressDuplicate,
}

/// Tracks which callers already completed processing during this run.
///
/// Two-phase: `reserve` checks the cooldown before any CRM work starts,
/// `commit` records completion once the call reaches a terminal state. A call
/// that fails mid-processing never commits, so a later call from the same
/// number gets a fresh attempt. Single-threaded, so this is a sequencing
/// discipline rather than a lock.
pub struct DedupGuard {
    cooldown: Duration,
    completed: HashMap<String, DateTime<Utc>>,
}

impl DedupGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            completed: HashMap::new(),
        }
    }

    /// Check whether this number completed processing within the cooldown.
    pub fn reserve(&self, normalized_phone: &str, now: DateTime<Utc>) -> Reservation {
        match self.completed.get(normalized_phone) {
            Some(done_at) if now - *done_at < self.cooldown => Reservation::SuppressDuplicate,
            _ => Reservation::Proceed,
        }
    }

    /// Record that this number reached a terminal processing state.
    pub fn commit(&mut self, normalized_phone: &str, now: DateTime<Utc>) {
        self.completed.insert(normalized_phone.to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, second).unwrap()
    }

    #[test]
    fn test_unknown_number_proceeds() {
        let guard = DedupGuard::new(Duration::minutes(5));
        assert_eq!(guard.reserve("2025550123", at(0, 0)), Reservation::Proceed);
    }

    #[test]
    fn test_committed_number_suppressed_within_cooldown() {
        let mut guard = DedupGuard::new(Duration::minutes(5));
        guard.commit("2025550123", at(0, 0));
        assert_eq!(
            guard.reserve("2025550123", at(3, 0)),
            Reservation::SuppressDuplicate
        );
    }

    #[test]
    fn test_committed_number_proceeds_after_cooldown() {
        let mut guard = DedupGuard::new(Duration::minutes(5));
        guard.commit("2025550123", at(0, 0));
        assert_eq!(guard.reserve("2025550123", at(5, 0)), Reservation::Proceed);
        assert_eq!(guard.reserve("2025550123", at(6, 30)), Reservation::Proceed);
    }

    #[test]
    fn test_uncommitted_reservation_does_not_suppress() {
        let guard = DedupGuard::new(Duration::minutes(5));
        assert_eq!(guard.reserve("2025550123", at(0, 0)), Reservation::Proceed);
        // No commit happened, so the next call from the number proceeds too
        assert_eq!(guard.reserve("2025550123", at(0, 30)), Reservation::Proceed);
    }

    #[test]
    fn test_commit_refreshes_cooldown() {
        let mut guard = DedupGuard::new(Duration::minutes(5));
        guard.commit("2025550123", at(0, 0));
        guard.commit("2025550123", at(4, 0));
        assert_eq!(
            guard.reserve("2025550123", at(8, 0)),
            Reservation::SuppressDuplicate
        );
    }

    #[test]
    fn test_zero_cooldown_never_suppresses() {
        let mut guard = DedupGuard::new(Duration::minutes(0));
        guard.commit("2025550123", at(0, 0));
        assert_eq!(guard.reserve("2025550123", at(0, 0)), Reservation::Proceed);
    }

    #[test]
    fn test_numbers_are_tracked_independently() {
        let mut guard = DedupGuard::new(Duration::minutes(5));
        guard.commit("2025550123", at(0, 0));
        assert_eq!(guard.reserve("3015550199", at(1, 0)), Reservation::Proceed);
    }
}
