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
use axum::http::Method;
use regex::{RegexSet, RegexSetBuilder};

pub const DEFAULT_API_PREFIX: &str = "/api/";
const UNKNOWN_USER_AGENT: &str = "Unknown";

/// Scanner and crawler signatures seen against small business sites.
const RECOMMENDED_USER_AGENTS: &[&str] = &[
    "Apache-HttpClient",
    "python-requests",
    "Go-http-client",
    "libredtail-http",
    "zgrab",
    "masscan",
    "nmap",
    "sqlmap",
    "nikto",
    "Nuclei",
    "WPScan",
    "CensysInspect",
    "Expanse",
    "l9explore",
    "Mozi.",
];

const RECOMMENDED_PATHS: &[&str] = &[
    "/wp-admin",
    "/wp-login",
    "/wp-content",
    "/wp-includes",
    "/xmlrpc",
    ".php",
    "/.env",
    "/.git",
    "/.aws",
    "/phpmyadmin",
    "/cgi-bin",
    "/vendor/",
    "/boaform",
    "/actuator",
    "/config.json",
    "/server-status",
];

#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    /// Substrings that mark a user agent as a scanner (case-insensitive)
    pub user_agent_patterns: Vec<String>,
    /// Substrings that mark a path as a probe (matched against the lower-cased path)
    pub path_patterns: Vec<String>,
    /// Paths under this prefix are never screened by `path_patterns`
    pub api_prefix: String,
    /// Rejects an absent or empty user agent and the literal `Unknown`.
    pub block_empty_user_agent: bool,
    pub block_root_head: bool,
    /// Rejects every GET and POST to `/`. Off unless the site serves nothing there.
    pub block_root_get_post: bool,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            user_agent_patterns: Vec::new(),
            path_patterns: Vec::new(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            block_empty_user_agent: true,
            block_root_head: true,
            block_root_get_post: false,
        }
    }
}

impl ScreeningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recommended() -> Self {
        Self::default()
            .with_user_agent_patterns(RECOMMENDED_USER_AGENTS.iter().map(|s| s.to_string()).collect())
            .with_path_patterns(RECOMMENDED_PATHS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_path_pattern(mut self, pattern: &str) -> Self {
        self.path_patterns.push(pattern.to_string());
        self
    }

    pub fn with_path_patterns(mut self, patterns: Vec<String>) -> Self {
        self.path_patterns.extend(patterns);
        self
    }

    pub fn with_user_agent_pattern(mut self, pattern: &str) -> Self {
        self.user_agent_patterns.push(pattern.to_string());
        self
    }

    pub fn with_user_agent_patterns(mut self, patterns: Vec<String>) -> Self {
        self.user_agent_patterns.extend(patterns);
        self
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = prefix.to_string();
        self
    }

    pub fn with_empty_user_agent_blocking(mut self, enabled: bool) -> Self {
        self.block_empty_user_agent = enabled;
        self
    }

    pub fn with_root_head_blocking(mut self, enabled: bool) -> Self {
        self.block_root_head = enabled;
        self
    }

    pub fn with_root_get_post_blocking(mut self, enabled: bool) -> Self {
        self.block_root_get_post = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.user_agent_patterns.iter().any(|p| p.is_empty())
            || self.path_patterns.iter().any(|p| p.is_empty())
        {
            return Err(GuardError::config("blocklist patterns must not be empty"));
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(GuardError::config("api_prefix must start with '/'"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ScreeningResult {
    pub reason: ScreeningReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreeningReason {
    MaliciousUserAgent(String),
    SuspiciousPath(String),
    MissingUserAgent,
    RootProbe(Method),
}

impl ScreeningReason {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ScreeningReason::MaliciousUserAgent(_) => "user_agent",
            ScreeningReason::SuspiciousPath(_) => "path",
            ScreeningReason::MissingUserAgent => "missing_user_agent",
            ScreeningReason::RootProbe(_) => "root_probe",
        }
    }
}

impl std::fmt::Display for ScreeningReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreeningReason::MaliciousUserAgent(pattern) => {
                write!(f, "malicious user agent: {}", pattern)
            }
            ScreeningReason::SuspiciousPath(pattern) => {
                write!(f, "suspicious path pattern: {}", pattern)
            }
            ScreeningReason::MissingUserAgent => write!(f, "missing user agent"),
            ScreeningReason::RootProbe(method) => write!(f, "{} probe on root path", method),
        }
    }
}

#[derive(Clone)]
pub struct RequestScreener {
    user_agent_regex_set: RegexSet,
    user_agent_patterns: Vec<String>,
    path_regex_set: RegexSet,
    path_patterns: Vec<String>,
    api_prefix: String,
    block_empty_user_agent: bool,
    block_root_head: bool,
    block_root_get_post: bool,
}

impl RequestScreener {
    pub fn new(config: &ScreeningConfig) -> Result<Self, GuardError> {
        config.validate()?;

        // Patterns are literal substrings, not regexes
        let user_agent_regex_set = RegexSetBuilder::new(
            config.user_agent_patterns.iter().map(|p| regex::escape(p)),
        )
        .case_insensitive(true)
        .build()?;

        let path_regex_set =
            RegexSet::new(config.path_patterns.iter().map(|p| regex::escape(&p.to_lowercase())))?;

        Ok(Self {
            user_agent_regex_set,
            user_agent_patterns: config.user_agent_patterns.clone(),
            path_regex_set,
            path_patterns: config.path_patterns.clone(),
            api_prefix: config.api_prefix.to_lowercase(),
            block_empty_user_agent: config.block_empty_user_agent,
            block_root_head: config.block_root_head,
            block_root_get_post: config.block_root_get_post,
        })
    }

    /// Applies the rules in order; the first match decides.
    pub fn check(&self, method: &Method, path: &str, user_agent: &str) -> Option<ScreeningResult> {
        let reject = |reason| Some(ScreeningResult { reason });

        if let Some(idx) = self.user_agent_regex_set.matches(user_agent).iter().next() {
            return reject(ScreeningReason::MaliciousUserAgent(
                self.user_agent_patterns[idx].clone(),
            ));
        }

        let path = path.to_lowercase();
        let is_api = !self.api_prefix.is_empty() && path.starts_with(&self.api_prefix);
        if !is_api {
            if let Some(idx) = self.path_regex_set.matches(&path).iter().next() {
                return reject(ScreeningReason::SuspiciousPath(self.path_patterns[idx].clone()));
            }
        }

        if self.block_empty_user_agent
            && (user_agent.is_empty() || user_agent == UNKNOWN_USER_AGENT)
        {
            return reject(ScreeningReason::MissingUserAgent);
        }

        if path == "/" {
            if self.block_root_head && method == Method::HEAD {
                return reject(ScreeningReason::RootProbe(method.clone()));
            }
            if self.block_root_get_post && (method == Method::GET || method == Method::POST) {
                return reject(ScreeningReason::RootProbe(method.clone()));
            }
        }

        None
    }
}
