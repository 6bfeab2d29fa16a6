// ABOUTME: Stale-while-revalidate cache abstraction shared by the price client and nutrition resolver
// ABOUTME: get -> compute -> set with in-flight refresh markers to suppress the thundering herd on stale keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Stale-while-revalidate (SWR) cache.
//!
//! Every external call from the price client (C6) and the nutrition resolver's
//! external tier (C5) is wrapped in an instance of [`SwrCache`]. A value has
//! three states relative to `now`: fresh (serve directly), stale-but-live
//! (serve immediately, schedule exactly one background refresh), and
//! hard-expired (treated as a miss). Concurrent callers for the same key while
//! a refresh is in flight never trigger a second one (P6).

/// In-memory backend implementation.
pub mod memory;

pub use memory::InMemoryCache;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Whether a cache read was served fresh, stale (with a refresh scheduled), or
/// missed entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Value was within its fresh window.
    Fresh,
    /// Value was stale but within its hard TTL; a background refresh was
    /// scheduled (or one was already in flight and this call piggybacked).
    Stale,
    /// No usable value; the caller must fetch synchronously.
    Miss,
}

/// A value read from the cache, tagged with its freshness.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    /// The cached value, if any.
    pub value: Option<T>,
    /// The read's freshness classification.
    pub freshness: Freshness,
}

/// TTL pair for one resource class: the fresh window and the hard expiry.
#[derive(Debug, Clone, Copy)]
pub struct TtlWindow {
    /// Time past which the value is considered stale (but still usable).
    pub fresh: Duration,
    /// Time past which the value is considered a miss.
    pub hard: Duration,
}

/// Pluggable SWR cache backend.
#[async_trait]
pub trait SwrCache: Send + Sync {
    /// Read the raw bytes stored at `key`, along with when they were written.
    async fn read_raw(&self, key: &str) -> Option<(Vec<u8>, Duration)>;

    /// Store raw bytes at `key`, overwriting any prior value.
    async fn write_raw(&self, key: &str, value: Vec<u8>);

    /// Attempt to claim the in-flight refresh marker for `key`. Returns `true`
    /// if this caller won the race and should perform the refresh; `false` if
    /// another caller already holds it.
    async fn try_claim_refresh(&self, key: &str) -> bool;

    /// Release the in-flight refresh marker for `key`.
    async fn release_refresh(&self, key: &str);

    /// Read a typed value at `key`, classified against `window`.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str, window: TtlWindow) -> CacheRead<T> {
        let Some((bytes, age)) = self.read_raw(key).await else {
            return CacheRead { value: None, freshness: Freshness::Miss };
        };
        let Ok(value) = serde_json::from_slice::<T>(&bytes) else {
            return CacheRead { value: None, freshness: Freshness::Miss };
        };
        if age <= window.fresh {
            CacheRead { value: Some(value), freshness: Freshness::Fresh }
        } else if age <= window.hard {
            CacheRead { value: Some(value), freshness: Freshness::Stale }
        } else {
            CacheRead { value: None, freshness: Freshness::Miss }
        }
    }

    /// Serialize and store a typed value at `key`.
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.write_raw(key, bytes).await;
        }
    }
}

/// Drive the SWR read-through pattern for one key: serve fresh/stale values
/// immediately, triggering at most one background `refresh` when stale, and
/// fall through to a synchronous `refresh` on a miss.
///
/// `refresh` is only ever awaited inline on a miss; on a stale hit it is
/// spawned onto its own task and its result is not observed by this call —
/// the next caller for the same key will see the refreshed value.
///
/// Every freshly fetched value is cached unconditionally. Callers whose
/// fetch result needs post-fetch validation before it is trusted as a cache
/// entry (e.g. a fingerprint check) must use [`get_or_refresh_checked`]
/// instead, so that a rejected value is never written to the cache as if it
/// had succeeded.
pub async fn get_or_refresh<C, T, F, Fut>(
    cache: &std::sync::Arc<C>,
    key: &str,
    window: TtlWindow,
    refresh: F,
) -> Result<T, crate::errors::AppError>
where
    C: SwrCache + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + Clone + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T, crate::errors::AppError>> + Send + 'static,
{
    get_or_refresh_checked(cache, key, window, refresh, |_| true).await
}

/// Like [`get_or_refresh`], but `accept` gates whether a freshly fetched
/// value is written to the cache. A value for which `accept` returns
/// `false` is still returned to the caller (so it can be inspected,
/// logged, or turned into a rejection outcome) but is never persisted —
/// the next caller for the same key re-fetches instead of seeing a
/// poisoned hit.
pub async fn get_or_refresh_checked<C, T, F, Fut, A>(
    cache: &std::sync::Arc<C>,
    key: &str,
    window: TtlWindow,
    refresh: F,
    accept: A,
) -> Result<T, crate::errors::AppError>
where
    C: SwrCache + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + Clone + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T, crate::errors::AppError>> + Send + 'static,
    A: Fn(&T) -> bool + Send + Sync + 'static,
{
    let read = cache.get::<T>(key, window).await;
    match read.freshness {
        Freshness::Fresh => {
            // Safe: Fresh implies `value` is populated by `get`'s own contract.
            Ok(read.value.unwrap_or_else(|| unreachable!("fresh read without a value")))
        }
        Freshness::Stale => {
            let stale_value = read.value.unwrap_or_else(|| unreachable!("stale read without a value"));
            if cache.try_claim_refresh(key).await {
                let cache = std::sync::Arc::clone(cache);
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Ok(fresh) = refresh().await {
                        if accept(&fresh) {
                            cache.set(&key, &fresh).await;
                        }
                    }
                    cache.release_refresh(&key).await;
                });
            }
            Ok(stale_value)
        }
        Freshness::Miss => {
            let value = refresh().await?;
            if accept(&value) {
                cache.set(key, &value).await;
            }
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn miss_fetches_synchronously_and_populates_cache() {
        let cache = Arc::new(InMemoryCache::new());
        let window = TtlWindow { fresh: Duration::from_secs(60), hard: Duration::from_secs(120) };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let value: i32 = get_or_refresh(&cache, "k", window, move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let read = cache.get::<i32>("k", window).await;
        assert_eq!(read.freshness, Freshness::Fresh);
        assert_eq!(read.value, Some(42));
    }
}
