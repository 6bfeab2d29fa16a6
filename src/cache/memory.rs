// ABOUTME: In-process SWR cache backend backed by DashMap
// ABOUTME: Suitable for a single-process deployment; see config/tunables.rs for the redis-backend feature
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::SwrCache;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::time::{Duration, Instant};

struct Entry {
    bytes: Vec<u8>,
    written_at: Instant,
}

/// In-memory, process-wide SWR cache. Safe to clone cheaply; clones share the
/// same underlying maps via `Arc`-backed `DashMap`/`DashSet`.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    store: std::sync::Arc<DashMap<String, Entry>>,
    in_flight: std::sync::Arc<DashSet<String>>,
}

impl InMemoryCache {
    /// Construct an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry (used by tests).
    pub fn clear(&self) {
        self.store.clear();
        self.in_flight.clear();
    }

    /// Number of stored entries (used by tests/diagnostics).
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl SwrCache for InMemoryCache {
    async fn read_raw(&self, key: &str) -> Option<(Vec<u8>, Duration)> {
        self.store.get(key).map(|entry| (entry.bytes.clone(), entry.written_at.elapsed()))
    }

    async fn write_raw(&self, key: &str, value: Vec<u8>) {
        self.store.insert(key.to_string(), Entry { bytes: value, written_at: Instant::now() });
    }

    async fn try_claim_refresh(&self, key: &str) -> bool {
        self.in_flight.insert(key.to_string())
    }

    async fn release_refresh(&self, key: &str) {
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Freshness, TtlWindow};

    #[tokio::test]
    async fn fresh_then_stale_then_miss_classification() {
        let cache = InMemoryCache::new();
        cache.write_raw("k", serde_json::to_vec(&7i32).unwrap()).await;

        let fresh_window = TtlWindow { fresh: Duration::from_secs(60), hard: Duration::from_secs(120) };
        let read = cache.get::<i32>("k", fresh_window).await;
        assert_eq!(read.freshness, Freshness::Fresh);

        let already_stale_window = TtlWindow { fresh: Duration::ZERO, hard: Duration::from_secs(120) };
        let read = cache.get::<i32>("k", already_stale_window).await;
        assert_eq!(read.freshness, Freshness::Stale);

        let already_hard_expired = TtlWindow { fresh: Duration::ZERO, hard: Duration::ZERO };
        let read = cache.get::<i32>("k", already_hard_expired).await;
        assert_eq!(read.freshness, Freshness::Miss);
    }

    #[tokio::test]
    async fn only_first_caller_claims_the_refresh_marker() {
        // P6: concurrent calls for the same key trigger at most one refresh.
        let cache = InMemoryCache::new();
        assert!(cache.try_claim_refresh("k").await);
        assert!(!cache.try_claim_refresh("k").await);
        cache.release_refresh("k").await;
        assert!(cache.try_claim_refresh("k").await);
    }
}
