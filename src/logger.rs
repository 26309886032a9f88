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

use axum::{
    body::HttpBody,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::types::SecurityContext;

/// One access-log line, built when the response for a request is ready.
#[derive(Debug, Clone)]
pub struct RequestLogRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: f64,
    pub ip: String,
    pub user_agent: String,
    pub referer: String,
    pub content_length: Option<u64>,
}

impl RequestLogRecord {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} {} {:.3}ms",
            self.method, self.url, self.status, self.duration_ms
        )
    }

    pub fn emit(&self) {
        let content_length = self
            .content_length
            .map(|len| len.to_string())
            .unwrap_or_else(|| "-".to_string());

        let summary = self.summary();

        if self.is_error() {
            tracing::warn!(
                timestamp = %self.timestamp.to_rfc3339(),
                method = %self.method,
                url = %self.url,
                status = self.status,
                duration_ms = self.duration_ms,
                ip = %self.ip,
                user_agent = %self.user_agent,
                referer = %self.referer,
                content_length = %content_length,
                "{}",
                summary
            );
        } else {
            tracing::info!(
                timestamp = %self.timestamp.to_rfc3339(),
                method = %self.method,
                url = %self.url,
                status = self.status,
                duration_ms = self.duration_ms,
                ip = %self.ip,
                user_agent = %self.user_agent,
                referer = %self.referer,
                content_length = %content_length,
                "{}",
                summary
            );
        }
    }
}

/// Logs every request exactly once, after the inner layers produced a status.
/// Never touches the request or the response.
pub async fn request_logging_middleware(
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let timestamp = Utc::now();

    let method = request.method().to_string();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let context = request
        .extensions()
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_else(|| SecurityContext::new(String::new(), String::new()));

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let record = RequestLogRecord {
        timestamp,
        method,
        url,
        status: status.as_u16(),
        duration_ms: elapsed.as_secs_f64() * 1000.0,
        ip: context.ip_address,
        user_agent: context.user_agent,
        referer: context.referer,
        content_length: response_content_length(&response),
    };
    record.emit();

    crate::metrics::record_http_request(record.status, elapsed.as_secs_f64());

    response
}

fn response_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
}
