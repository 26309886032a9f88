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

pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod limiter;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod screener;
pub mod slow_down;
pub mod store;
pub mod tracker;
pub mod types;

#[cfg(feature = "metrics")]
pub mod routes;

pub use config::{DelayPolicy, GuardConfig, RateLimitConfig, SlowDownConfig, TrackerConfig};
pub use context::security_context_middleware;
pub use error::GuardError;
pub use guard::{AdmissionGuard, AdmissionGuardBuilder};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use logger::{request_logging_middleware, RequestLogRecord};
pub use middleware::{
    blocked_attempt_middleware, rate_limit_middleware, screening_middleware,
    slow_down_middleware, ACCESS_DENIED,
};
pub use screener::{RequestScreener, ScreeningConfig, ScreeningReason, ScreeningResult};
pub use slow_down::SpeedLimiter;
pub use store::{HitStore, MemoryStore, WindowHit};
pub use tracker::{BlockedAttemptTracker, TrackOutcome};
pub use types::{NoOpOnBlocked, OnBlocked, SecurityContext};

#[cfg(feature = "metrics")]
pub use routes::metrics_handler;
