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

use crate::{
    config::{GuardConfig, RateLimitConfig, SlowDownConfig, TrackerConfig},
    context::security_context_middleware,
    error::GuardError,
    limiter::RateLimiter,
    logger::request_logging_middleware,
    middleware::{
        blocked_attempt_middleware, rate_limit_middleware, screening_middleware,
        slow_down_middleware,
    },
    screener::{RequestScreener, ScreeningConfig},
    slow_down::SpeedLimiter,
    store::HitStore,
    tracker::BlockedAttemptTracker,
    types::{NoOpOnBlocked, OnBlocked},
};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The admission chain: every stage with its own state, composed in a fixed
/// order around a router.
///
/// Request flow, outermost first:
/// security context, request logger, blocked-attempt tracker, scanner
/// screening, rate limiter, slow-down, then the route handler.
pub struct AdmissionGuard<B: OnBlocked = NoOpOnBlocked> {
    screener: Arc<RequestScreener>,
    rate_limiter: RateLimiter<B>,
    speed_limiter: SpeedLimiter,
    tracker: BlockedAttemptTracker,
}

impl AdmissionGuard<NoOpOnBlocked> {
    pub fn builder() -> AdmissionGuardBuilder {
        AdmissionGuardBuilder::default()
    }
}

impl<B: OnBlocked + 'static> AdmissionGuard<B> {
    pub fn new(config: GuardConfig, on_blocked: B) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self {
            screener: Arc::new(RequestScreener::new(&config.screening)?),
            rate_limiter: RateLimiter::new(config.rate_limit, on_blocked),
            speed_limiter: SpeedLimiter::new(config.slow_down),
            tracker: BlockedAttemptTracker::new(config.tracker),
        })
    }

    /// Wraps `router` with the whole chain. Serve the result with
    /// `into_make_service_with_connect_info::<SocketAddr>()`.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // Layers added last run first.
        router
            .layer(middleware::from_fn_with_state(
                self.speed_limiter.clone(),
                slow_down_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware::<B>,
            ))
            .layer(middleware::from_fn_with_state(
                self.screener.clone(),
                screening_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.tracker.clone(),
                blocked_attempt_middleware,
            ))
            .layer(middleware::from_fn(request_logging_middleware))
            .layer(middleware::from_fn(security_context_middleware))
    }

    /// Periodically drops elapsed windows and decayed attempt counts.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        let speed_limiter = self.speed_limiter.clone();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                rate_limiter.cleanup_cache();
                speed_limiter.cleanup_cache();
                tracker.cleanup_cache();

                crate::metrics::update_tracked_identities(
                    "rate_limit",
                    rate_limiter.tracked_identities(),
                );
                crate::metrics::update_tracked_identities(
                    "slow_down",
                    speed_limiter.tracked_identities(),
                );
                crate::metrics::update_tracked_identities(
                    "blocked_attempts",
                    tracker.tracked_identities(),
                );
            }
        })
    }

    pub fn screener(&self) -> &RequestScreener {
        &self.screener
    }

    pub fn rate_limiter(&self) -> &RateLimiter<B> {
        &self.rate_limiter
    }

    pub fn speed_limiter(&self) -> &SpeedLimiter {
        &self.speed_limiter
    }

    pub fn tracker(&self) -> &BlockedAttemptTracker {
        &self.tracker
    }
}

impl<B: OnBlocked> Clone for AdmissionGuard<B> {
    fn clone(&self) -> Self {
        Self {
            screener: self.screener.clone(),
            rate_limiter: self.rate_limiter.clone(),
            speed_limiter: self.speed_limiter.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

/// Builds an [`AdmissionGuard`], optionally with externally owned stores.
#[derive(Default)]
pub struct AdmissionGuardBuilder {
    config: GuardConfig,
    rate_store: Option<Arc<dyn HitStore>>,
    slow_down_store: Option<Arc<dyn HitStore>>,
}

impl AdmissionGuardBuilder {
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn screening(mut self, screening: ScreeningConfig) -> Self {
        self.config.screening = screening;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn slow_down(mut self, slow_down: SlowDownConfig) -> Self {
        self.config.slow_down = slow_down;
        self
    }

    pub fn tracker(mut self, tracker: TrackerConfig) -> Self {
        self.config.tracker = tracker;
        self
    }

    pub fn rate_limit_store(mut self, store: Arc<dyn HitStore>) -> Self {
        self.rate_store = Some(store);
        self
    }

    pub fn slow_down_store(mut self, store: Arc<dyn HitStore>) -> Self {
        self.slow_down_store = Some(store);
        self
    }

    pub fn build(self) -> Result<AdmissionGuard<NoOpOnBlocked>, GuardError> {
        self.build_with(NoOpOnBlocked)
    }

    pub fn build_with<B: OnBlocked + 'static>(
        self,
        on_blocked: B,
    ) -> Result<AdmissionGuard<B>, GuardError> {
        let Self {
            config,
            rate_store,
            slow_down_store,
        } = self;
        config.validate()?;

        let rate_limiter = match rate_store {
            Some(store) => RateLimiter::with_store(config.rate_limit, on_blocked, store),
            None => RateLimiter::new(config.rate_limit, on_blocked),
        };
        let speed_limiter = match slow_down_store {
            Some(store) => SpeedLimiter::with_store(config.slow_down, store),
            None => SpeedLimiter::new(config.slow_down),
        };

        Ok(AdmissionGuard {
            screener: Arc::new(RequestScreener::new(&config.screening)?),
            rate_limiter,
            speed_limiter,
            tracker: BlockedAttemptTracker::new(config.tracker),
        })
    }
}
