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

use thiserror::Error;

/// Errors raised while building the admission chain. Request handling never
/// returns these; rejections are expressed as HTTP responses.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid blocklist pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GuardError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        GuardError::InvalidConfig(message.into())
    }
}
