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

use crate::config::SlowDownConfig;
use crate::store::{HitStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Progressive delay for identities past a soft request threshold.
///
/// Keeps its own counters, separate from the rate limiter's, so the two
/// thresholds can use different windows. It never rejects a request.
#[derive(Clone)]
pub struct SpeedLimiter {
    store: Arc<dyn HitStore>,
    config: SlowDownConfig,
}

impl SpeedLimiter {
    pub fn new(config: SlowDownConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: SlowDownConfig, store: Arc<dyn HitStore>) -> Self {
        Self { store, config }
    }

    /// Counts the request and returns how long to hold it, if at all.
    pub async fn check(&self, key: &str) -> Option<Duration> {
        let hit = self.store.hit(key, self.config.window).await;
        self.config.delay_for_count(hit.count)
    }

    pub async fn reset_key(&self, key: &str) {
        self.store.reset(key).await;
    }

    pub fn cleanup_cache(&self) {
        let removed = self.store.prune(self.config.window);
        if removed > 0 {
            tracing::info!("Cleaned up {} expired slow-down windows", removed);
        }
    }

    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }

    pub fn config(&self) -> &SlowDownConfig {
        &self.config
    }
}
