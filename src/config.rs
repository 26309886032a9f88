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

use crate::error::GuardError;
use crate::screener::ScreeningConfig;
use chrono::Utc;
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RATE_LIMIT_MESSAGE: &str =
    "Too many requests from this IP, please try again later.";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u64,
    pub message: String,
    /// Emit `RateLimit-*` headers.
    pub standard_headers: bool,
    /// Emit the deprecated `X-RateLimit-*` headers.
    pub legacy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: 100,
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
            standard_headers: true,
            legacy_headers: false,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn with_standard_headers(mut self, enabled: bool) -> Self {
        self.standard_headers = enabled;
        self
    }

    pub fn with_legacy_headers(mut self, enabled: bool) -> Self {
        self.legacy_headers = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.window.is_zero() {
            return Err(GuardError::config("rate limit window must be non-zero"));
        }
        if self.max_requests == 0 {
            return Err(GuardError::config("max_requests must be at least 1"));
        }
        check_window(self.window, "rate limit window")
    }
}

/// Windows are added to wall-clock timestamps, so they must fit chrono's range.
fn check_window(window: Duration, what: &str) -> Result<(), GuardError> {
    let representable = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| Utc::now().checked_add_signed(window))
        .is_some();
    if representable {
        Ok(())
    } else {
        Err(GuardError::config(format!("{} is too large", what)))
    }
}

/// How long a request over the slow-down threshold is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    /// Same delay for every request past the threshold.
    Constant(Duration),
    /// `step` multiplied by how far past the threshold the count is.
    Linear(Duration),
}

impl DelayPolicy {
    pub fn delay_for(&self, over_by: u64) -> Duration {
        match *self {
            DelayPolicy::Constant(delay) => delay,
            DelayPolicy::Linear(step) => {
                step.saturating_mul(u32::try_from(over_by).unwrap_or(u32::MAX))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlowDownConfig {
    pub window: Duration,
    pub delay_after: u64,
    pub delay: DelayPolicy,
    pub max_delay: Duration,
}

impl Default for SlowDownConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            delay_after: 100,
            delay: DelayPolicy::Constant(Duration::from_millis(500)),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl SlowDownConfig {
    pub fn new(delay_after: u64, window: Duration) -> Self {
        Self {
            delay_after,
            window,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: DelayPolicy) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay for the `count`-th request of a window, `None` while under the threshold.
    pub fn delay_for_count(&self, count: u64) -> Option<Duration> {
        if count <= self.delay_after {
            return None;
        }
        let delay = self
            .delay
            .delay_for(count - self.delay_after)
            .min(self.max_delay);
        if delay.is_zero() {
            None
        } else {
            Some(delay)
        }
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.window.is_zero() {
            return Err(GuardError::config("slow-down window must be non-zero"));
        }
        check_window(self.window, "slow-down window")
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Count at which every further 403 is logged at error level.
    pub threshold: u64,
    /// Forget an identity once this long has passed since its last 403.
    /// `None` keeps counts for the life of the process.
    pub decay: Option<Duration>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            decay: None,
        }
    }
}

impl TrackerConfig {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    pub fn with_decay(mut self, decay: Duration) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.threshold == 0 {
            return Err(GuardError::config("tracker threshold must be at least 1"));
        }
        match self.decay {
            Some(decay) if decay.is_zero() => {
                Err(GuardError::config("tracker decay must be non-zero"))
            }
            Some(decay) => check_window(decay, "tracker decay"),
            None => Ok(()),
        }
    }
}

/// Static configuration for the whole admission chain, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    pub screening: ScreeningConfig,
    pub rate_limit: RateLimitConfig,
    pub slow_down: SlowDownConfig,
    pub tracker: TrackerConfig,
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), GuardError> {
        self.screening.validate()?;
        self.rate_limit.validate()?;
        self.slow_down.validate()?;
        self.tracker.validate()
    }
}
