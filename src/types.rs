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

use chrono::{DateTime, Utc};

/// Counter state for one identity inside a fixed window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub count: u64,
    pub window_start: DateTime<Utc>,
}

impl WindowEntry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.window_start) >= window
    }
}

#[derive(Debug, Clone)]
pub struct SecurityContext {
    pub ip_address: String,
    /// Sanitized and truncated, for logs.
    pub user_agent: String,
    /// The full `User-Agent` header as received, for screening.
    pub raw_user_agent: String,
    pub referer: String,
}

impl SecurityContext {
    pub fn new(ip_address: String, user_agent: String) -> Self {
        Self {
            ip_address,
            raw_user_agent: user_agent.clone(),
            user_agent,
            referer: String::new(),
        }
    }

    pub fn with_raw_user_agent(mut self, raw_user_agent: String) -> Self {
        self.raw_user_agent = raw_user_agent;
        self
    }

    pub fn with_referer(mut self, referer: String) -> Self {
        self.referer = referer;
        self
    }
}

/// Called once per window when an identity first goes over the rate limit.
#[async_trait::async_trait]
pub trait OnBlocked: Send + Sync {
    async fn on_blocked(&self, ip: &str, path: &str, context: &SecurityContext);
}

pub struct NoOpOnBlocked;

#[async_trait::async_trait]
impl OnBlocked for NoOpOnBlocked {
    async fn on_blocked(&self, _ip: &str, _path: &str, _context: &SecurityContext) {}
}
