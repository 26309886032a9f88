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

use crate::config::RateLimitConfig;
use crate::store::{HitStore, MemoryStore};
use crate::types::{OnBlocked, SecurityContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// First rejection for this identity in the current window.
    pub newly_limited: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        let millis = self.reset_at.signed_duration_since(now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }
}

pub struct RateLimiter<B: OnBlocked> {
    store: Arc<dyn HitStore>,
    config: RateLimitConfig,
    on_blocked: Arc<B>,
}

impl<B: OnBlocked + 'static> RateLimiter<B> {
    pub fn new(config: RateLimitConfig, on_blocked: B) -> Self {
        Self::with_store(config, on_blocked, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: RateLimitConfig, on_blocked: B, store: Arc<dyn HitStore>) -> Self {
        Self {
            store,
            config,
            on_blocked: Arc::new(on_blocked),
        }
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        context: &SecurityContext,
        path: &str,
    ) -> RateLimitDecision {
        let hit = self.store.hit(key, self.config.window).await;
        let limit = self.config.max_requests;

        let decision = RateLimitDecision {
            allowed: hit.count <= limit,
            newly_limited: hit.count == limit.saturating_add(1),
            limit,
            remaining: limit.saturating_sub(hit.count),
            reset_at: hit.reset_at,
        };

        if decision.newly_limited {
            tracing::warn!(
                "IP exceeded rate limit: {} (path: {}, requests: {}, limit: {})",
                context.ip_address,
                path,
                hit.count,
                limit
            );

            let on_blocked = self.on_blocked.clone();
            let ip = context.ip_address.clone();
            let path = path.to_string();
            let context = context.clone();

            tokio::spawn(async move {
                on_blocked.on_blocked(&ip, &path, &context).await;
            });
        }

        decision
    }

    pub async fn reset_key(&self, key: &str) {
        self.store.reset(key).await;
    }

    pub fn cleanup_cache(&self) {
        let before_count = self.store.len();
        let removed = self.store.prune(self.config.window);

        if removed > 0 {
            tracing::info!(
                "Cleaned up {} expired rate limit windows ({} -> {} entries)",
                removed,
                before_count,
                self.store.len()
            );
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }
}

impl<B: OnBlocked> Clone for RateLimiter<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            on_blocked: self.on_blocked.clone(),
        }
    }
}
