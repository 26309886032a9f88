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
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

use crate::types::SecurityContext;

const MAX_HEADER_LENGTH: usize = 500;

/// Derives the client identity and stores a [`SecurityContext`] in the
/// request extensions. Must be the outermost layer of the chain.
pub async fn security_context_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ip_address = extract_client_ip(&headers, addr.ip());
    let raw_user_agent = raw_header_value(&headers, header::USER_AGENT);
    let user_agent = sanitize_header(&raw_user_agent);
    let referer = header_value(&headers, header::REFERER);

    tracing::debug!(
        "Incoming request: method={} uri={} ip={} user_agent={}",
        request.method(),
        request.uri(),
        ip_address,
        user_agent
    );

    let security_context = SecurityContext::new(ip_address.to_string(), user_agent)
        .with_raw_user_agent(raw_user_agent)
        .with_referer(referer);

    request.extensions_mut().insert(security_context);

    next.run(request).await
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(sanitize_header)
        .unwrap_or_default()
}

/// Untruncated header value. Bytes outside UTF-8 are replaced, not dropped,
/// so a header that fails `to_str` is still screened.
fn raw_header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
        .unwrap_or_default()
}

pub(crate) fn extract_client_ip(headers: &HeaderMap, fallback_ip: IpAddr) -> IpAddr {
    if let Some(forwarded_for) = headers.get("X-Forwarded-For") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    tracing::debug!("Using X-Forwarded-For IP: {}", ip);
                    return ip;
                }
            }
        }
    }

    tracing::debug!("Using socket IP (no proxy headers): {}", fallback_ip);
    fallback_ip
}

fn sanitize_header(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || *c == ' ' || *c == '\t')
        .take(MAX_HEADER_LENGTH)
        .collect()
}
