//! Cache entry with freshness and inactivity tracking

use std::time::Duration;
use tokio::time::Instant;

use crate::models::EncodedLogo;

/// A resolved lookup held in the cache.
///
/// `value` of `None` records a resolved failure (or a non-image body), so a
/// broken origin is retried at freshness-window granularity instead of on
/// every request. Timestamps are monotonic; they feed timing decisions, not
/// persistence.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Option<EncodedLogo>,
    pub fetched_at: Instant,
    pub last_accessed: Instant,
}

impl CacheEntry {
    pub fn new(value: Option<EncodedLogo>) -> Self {
        let now = Instant::now();
        Self {
            value,
            fetched_at: now,
            last_accessed: now,
        }
    }

    /// Still inside the freshness window: serve without contacting the origin
    pub fn is_fresh(&self, freshness: Duration) -> bool {
        self.fetched_at.elapsed() < freshness
    }

    /// No request within the retention window: eligible for eviction
    pub fn is_idle_expired(&self, retention: Duration) -> bool {
        self.last_accessed.elapsed() >= retention
    }

    /// Record an access, resetting the inactivity clock
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}
