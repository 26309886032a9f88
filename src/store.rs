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

use crate::types::WindowEntry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

/// Snapshot of a key's window after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

/// Keyed fixed-window counters shared by the limiters.
///
/// `hit` must reset an elapsed window and increment in one atomic step per
/// key. Implementations backed by a shared cache let several instances
/// enforce one global limit.
#[async_trait::async_trait]
pub trait HitStore: Send + Sync {
    async fn hit(&self, key: &str, window: Duration) -> WindowHit;

    async fn peek(&self, key: &str, window: Duration) -> Option<WindowHit>;

    async fn reset(&self, key: &str);

    /// Drop entries whose window has elapsed. Returns how many were removed.
    fn prune(&self, window: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Saturates instead of failing; configs reject such windows in `validate`.
pub(crate) fn chrono_window(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or(chrono::TimeDelta::MAX)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, WindowEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(entry: &WindowEntry, window: chrono::Duration) -> WindowHit {
        WindowHit {
            count: entry.count,
            window_start: entry.window_start,
            reset_at: entry
                .window_start
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[async_trait::async_trait]
impl HitStore for MemoryStore {
    async fn hit(&self, key: &str, window: Duration) -> WindowHit {
        let now = Utc::now();
        let window = chrono_window(window);

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry::new(now));

        if entry.is_expired(now, window) {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count = entry.count.saturating_add(1);

        Self::snapshot(&entry, window)
    }

    async fn peek(&self, key: &str, window: Duration) -> Option<WindowHit> {
        let now = Utc::now();
        let window = chrono_window(window);
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now, window))
            .map(|entry| Self::snapshot(&entry, window))
    }

    async fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    fn prune(&self, window: Duration) -> usize {
        let now = Utc::now();
        let window = chrono_window(window);
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, window));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
