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
    config::RateLimitConfig,
    limiter::{RateLimitDecision, RateLimiter},
    screener::RequestScreener,
    slow_down::SpeedLimiter,
    tracker::BlockedAttemptTracker,
    types::{OnBlocked, SecurityContext},
};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

pub const ACCESS_DENIED: &str = "Access Denied";

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

fn security_context(request: &Request<axum::body::Body>) -> Result<SecurityContext, Response> {
    match request.extensions().get::<SecurityContext>() {
        Some(ctx) => Ok(ctx.clone()),
        None => {
            tracing::error!("SecurityContext not found in request extensions. security_context_middleware should run before the admission filters.");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

pub async fn screening_middleware(
    State(screener): State<Arc<RequestScreener>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let security_context = match security_context(&request) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let path = request.uri().path();
    // Screen the full header; the logged copy is truncated.
    let verdict = screener.check(request.method(), path, &security_context.raw_user_agent);
    if let Some(result) = verdict {
        tracing::warn!(
            "Blocked request: {} {} from {} (user-agent: {}, reason: {})",
            request.method(),
            path,
            security_context.ip_address,
            security_context.user_agent,
            result.reason
        );
        crate::metrics::record_screening_block(result.reason.label());

        return (StatusCode::FORBIDDEN, ACCESS_DENIED).into_response();
    }

    next.run(request).await
}

pub async fn rate_limit_middleware<B: OnBlocked + 'static>(
    State(limiter): State<RateLimiter<B>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let security_context = match security_context(&request) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let path = request.uri().path().to_string();
    let rate_limit_key = security_context.ip_address.clone();

    let decision = limiter
        .check_rate_limit(&rate_limit_key, &security_context, &path)
        .await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::debug!(
            "Rate limited request: {} (path: {})",
            security_context.ip_address,
            path
        );
        crate::metrics::record_rate_limit_rejection();

        let retry_after = decision.seconds_until_reset(Utc::now());
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, HeaderValue::from(retry_after))],
            limiter.config().message.clone(),
        )
            .into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), limiter.config(), &decision);
    response
}

pub(crate) fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    config: &RateLimitConfig,
    decision: &RateLimitDecision,
) {
    let now = Utc::now();

    if config.standard_headers {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        headers.insert(
            RATELIMIT_RESET,
            HeaderValue::from(decision.seconds_until_reset(now)),
        );
        let policy = format!("{};w={}", decision.limit, config.window.as_secs());
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
    }

    if config.legacy_headers {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        headers.insert(
            X_RATELIMIT_RESET,
            HeaderValue::from(decision.reset_at.timestamp().max(0) as u64),
        );
    }
}

pub async fn slow_down_middleware(
    State(limiter): State<SpeedLimiter>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let security_context = match security_context(&request) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    if let Some(delay) = limiter.check(&security_context.ip_address).await {
        tracing::debug!(
            "Slowing down {} by {}ms (path: {})",
            security_context.ip_address,
            delay.as_millis(),
            request.uri().path()
        );
        crate::metrics::record_slow_down(delay.as_secs_f64());

        // Dropping this future (client gone) cancels the sleep and the forward.
        tokio::time::sleep(delay).await;
    }

    next.run(request).await
}

pub async fn blocked_attempt_middleware(
    State(tracker): State<BlockedAttemptTracker>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<SecurityContext>()
        .map(|ctx| ctx.ip_address.clone());

    let response = next.run(request).await;

    match ip {
        Some(ip) => {
            tracker.observe(&ip, response.status());
        }
        None => tracing::debug!("No SecurityContext, skipping blocked-attempt tracking"),
    }

    response
}
