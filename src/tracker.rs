/*  This file is part of basic-axum-guard
 *  Copyright (C) 2025  Grant DeFayette
 *
 *  basic-axum-guard is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Lesser General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  basic-axum-guard is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Lesser General Public License for more details.
 *
 *  You should have received a copy of the GNU Lesser General Public License
 *  along with basic-axum-guard.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::config::TrackerConfig;
use crate::store::chrono_window;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct AttemptEntry {
    count: u64,
    last_attempt: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
    pub count: u64,
    pub escalated: bool,
}

/// Counts 403 responses per identity and reports repeat offenders.
///
/// Purely observational: it never changes a response.
#[derive(Clone)]
pub struct BlockedAttemptTracker {
    attempts: Arc<DashMap<String, AttemptEntry>>,
    config: TrackerConfig,
}

impl BlockedAttemptTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Records the final status of a request; only 403 counts.
    pub fn observe(&self, key: &str, status: StatusCode) -> Option<TrackOutcome> {
        if status == StatusCode::FORBIDDEN {
            Some(self.record(key))
        } else {
            None
        }
    }

    pub fn record(&self, key: &str) -> TrackOutcome {
        let now = Utc::now();

        let count = {
            let mut entry = self
                .attempts
                .entry(key.to_string())
                .or_insert_with(|| AttemptEntry {
                    count: 0,
                    last_attempt: now,
                });

            if let Some(decay) = self.config.decay {
                if now.signed_duration_since(entry.last_attempt) >= chrono_window(decay) {
                    entry.count = 0;
                }
            }
            entry.count = entry.count.saturating_add(1);
            entry.last_attempt = now;
            entry.count
        };

        let escalated = count >= self.config.threshold;
        if escalated {
            tracing::error!(
                ip = %key,
                blocked_attempts = count,
                "Repeated blocked attempts from {} ({} so far)",
                key,
                count
            );
            crate::metrics::record_escalation();
        }

        TrackOutcome { count, escalated }
    }

    pub fn count(&self, key: &str) -> u64 {
        self.attempts.get(key).map(|entry| entry.count).unwrap_or(0)
    }

    pub fn reset(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Drops decayed identities. Does nothing when counts never decay.
    pub fn cleanup_cache(&self) {
        let Some(decay) = self.config.decay else {
            return;
        };
        let now = Utc::now();
        let decay = chrono_window(decay);

        let before_count = self.attempts.len();
        self.attempts
            .retain(|_, entry| now.signed_duration_since(entry.last_attempt) < decay);
        let after_count = self.attempts.len();

        if before_count > after_count {
            tracing::info!(
                "Cleaned up {} decayed blocked-attempt entries ({} -> {} entries)",
                before_count - after_count,
                before_count,
                after_count
            );
        }
    }

    pub fn tracked_identities(&self) -> usize {
        self.attempts.len()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_forbidden_is_counted() {
        let tracker = BlockedAttemptTracker::new(TrackerConfig::default());

        assert!(tracker.observe("1.2.3.4", StatusCode::OK).is_none());
        assert!(tracker.observe("1.2.3.4", StatusCode::NOT_FOUND).is_none());
        assert!(tracker.observe("1.2.3.4", StatusCode::TOO_MANY_REQUESTS).is_none());
        assert_eq!(tracker.count("1.2.3.4"), 0);

        let outcome = tracker.observe("1.2.3.4", StatusCode::FORBIDDEN).unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(tracker.count("1.2.3.4"), 1);
    }

    #[test]
    fn test_escalates_once_threshold_reached() {
        let tracker = BlockedAttemptTracker::new(TrackerConfig::new(5));

        let escalations: Vec<bool> = (0..5).map(|_| tracker.record("1.2.3.4").escalated).collect();
        assert_eq!(escalations, vec![false, false, false, false, true]);
        assert_eq!(tracker.count("1.2.3.4"), 5);

        // Every further attempt stays escalated
        assert!(tracker.record("1.2.3.4").escalated);
        assert_eq!(tracker.count("1.2.3.4"), 6);
    }

    #[test]
    fn test_counts_never_expire_without_decay() {
        let tracker = BlockedAttemptTracker::new(TrackerConfig::new(5));
        tracker.record("5.6.7.8");
        tracker.cleanup_cache();
        assert_eq!(tracker.count("5.6.7.8"), 1);
    }

    #[test]
    fn test_decay_restarts_count() {
        let tracker =
            BlockedAttemptTracker::new(TrackerConfig::new(5).with_decay(Duration::from_millis(100)));

        tracker.record("9.9.9.9");
        tracker.record("9.9.9.9");
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(tracker.record("9.9.9.9").count, 1);

        std::thread::sleep(Duration::from_millis(150));
        tracker.cleanup_cache();
        assert_eq!(tracker.tracked_identities(), 0);
    }

    #[test]
    fn test_identities_are_independent() {
        let tracker = BlockedAttemptTracker::new(TrackerConfig::new(2));
        tracker.record("a");
        tracker.record("a");
        assert_eq!(tracker.record("b").count, 1);
        assert!(!tracker.record("c").escalated);
    }
}
