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

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;
#[cfg(feature = "metrics")]
use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram,
    register_histogram_vec, Counter, CounterVec, GaugeVec, Histogram, HistogramVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref SCREENING_BLOCKS: CounterVec = register_counter_vec!(
        "guard_screening_blocks_total",
        "Total number of requests rejected by scanner screening",
        &["reason"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_REJECTIONS: Counter = register_counter!(
        "guard_rate_limit_rejections_total",
        "Total number of requests rejected by the rate limiter"
    )
    .unwrap();
    pub static ref SLOW_DOWN_DELAYS: Histogram = register_histogram!(
        "guard_slow_down_delay_seconds",
        "Delay applied to requests past the slow-down threshold"
    )
    .unwrap();
    pub static ref BLOCKED_ATTEMPT_ESCALATIONS: Counter = register_counter!(
        "guard_blocked_attempt_escalations_total",
        "Total number of 403 responses past the escalation threshold"
    )
    .unwrap();
    pub static ref TRACKED_IDENTITIES: GaugeVec = register_gauge_vec!(
        "guard_tracked_identities",
        "Current number of identities held by each stage",
        &["stage"]
    )
    .unwrap();
    pub static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "http_requests_total",
        "Total HTTP requests by status code",
        &["status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["status"]
    )
    .unwrap();
}

#[cfg(feature = "metrics")]
pub fn record_screening_block(reason: &str) {
    SCREENING_BLOCKS.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_rate_limit_rejection() {
    RATE_LIMIT_REJECTIONS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_slow_down(delay_seconds: f64) {
    SLOW_DOWN_DELAYS.observe(delay_seconds);
}

#[cfg(feature = "metrics")]
pub fn record_escalation() {
    BLOCKED_ATTEMPT_ESCALATIONS.inc();
}

#[cfg(feature = "metrics")]
pub fn update_tracked_identities(stage: &str, count: usize) {
    TRACKED_IDENTITIES
        .with_label_values(&[stage])
        .set(count as f64);
}

#[cfg(feature = "metrics")]
pub fn record_http_request(status: u16, duration_seconds: f64) {
    HTTP_REQUESTS
        .with_label_values(&[&status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&status.to_string()])
        .observe(duration_seconds);
}

// No-op versions when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_screening_block(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_rate_limit_rejection() {}

#[cfg(not(feature = "metrics"))]
pub fn record_slow_down(_delay_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_escalation() {}

#[cfg(not(feature = "metrics"))]
pub fn update_tracked_identities(_stage: &str, _count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_http_request(_status: u16, _duration_seconds: f64) {}
