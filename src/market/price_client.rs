// ABOUTME: Supermarket price search client (C6): token-bucket gated, SWR cached, retried on transient failure
// ABOUTME: Cache key is (store, normalized_query, page); results overwrite the cache on upstream success
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Price Client (C6).
//!
//! A synchronous miss pays the token-bucket wait and reports it back to the
//! caller via [`FetchOutcome::bucket_wait_ms`]; a stale hit is served
//! immediately (wait reported as zero) with a background refresh scheduled,
//! mirroring the SWR contract every other external tier uses.

use crate::cache::{Freshness, SwrCache, TtlWindow};
use crate::config::RateLimitConfig;
use crate::market::token_bucket::{AcquireOutcome, TokenBucket};
use crate::model::{PackSize, SizeUnit, SkuCandidate};
use crate::normalizer;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// C6's error taxonomy, each distinguishable by the caller as fatal or retryable.
#[derive(Debug, Clone)]
pub enum PriceError {
    /// Missing/invalid configuration (base URL, credentials).
    Config(String),
    /// The request itself was malformed.
    BadRequest(String),
    /// Caller waited the bounded window and no token became available,
    /// or the upstream itself returned 429 after the single extra retry.
    RateLimited,
    /// Upstream returned a 5xx.
    Upstream5xx(String),
    /// The HTTP call timed out.
    Timeout,
    /// Connection-level failure (DNS, refused, aborted).
    Network(String),
}

impl PriceError {
    /// A representative HTTP-ish status code, for callers that want to classify fatal vs. retryable.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::BadRequest(_) => 400,
            Self::RateLimited => 429,
            Self::Upstream5xx(_) => 502,
            Self::Timeout | Self::Network(_) => 504,
        }
    }
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSku {
    title: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    category: Option<String>,
    price: f64,
    size_value: f64,
    #[serde(default = "default_size_unit")]
    size_unit: String,
    url: String,
    #[serde(default)]
    barcode: Option<String>,
}

fn default_size_unit() -> String {
    "g".to_string()
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    results: Vec<WireSku>,
}

impl From<WireSku> for SkuCandidate {
    fn from(wire: WireSku) -> Self {
        let unit = if wire.size_unit.eq_ignore_ascii_case("ml") { SizeUnit::Ml } else { SizeUnit::G };
        SkuCandidate::new(
            wire.title,
            wire.brand,
            wire.category,
            wire.price,
            PackSize { value: wire.size_value, unit },
            wire.url,
            wire.barcode,
        )
    }
}

/// Result of one [`PriceClient::fetch_prices`] call.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Candidates returned (from cache or upstream).
    pub candidates: Vec<SkuCandidate>,
    /// Milliseconds spent waiting on the token bucket for this call specifically
    /// (zero when served from cache without a synchronous upstream fetch).
    pub bucket_wait_ms: u64,
}

/// Price search client, generic over its SWR cache backend.
pub struct PriceClient<C: SwrCache + 'static> {
    http: reqwest::Client,
    bucket: Arc<TokenBucket>,
    cache: Arc<C>,
    rate_limit: RateLimitConfig,
    base_url: String,
}

impl<C: SwrCache + 'static> PriceClient<C> {
    /// Construct a client against `base_url`, sharing `bucket` and `cache` across calls.
    #[must_use]
    pub fn new(base_url: impl Into<String>, bucket: Arc<TokenBucket>, cache: Arc<C>, rate_limit: RateLimitConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(rate_limit.http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, bucket, cache, rate_limit, base_url: base_url.into() }
    }

    fn window(&self) -> TtlWindow {
        TtlWindow { fresh: self.rate_limit.price_fresh_ttl, hard: self.rate_limit.price_hard_ttl }
    }

    /// Fetch prices for `query` at `store`, page 1-indexed.
    pub async fn fetch_prices(&self, store: &str, query: &str, page: u32) -> Result<FetchOutcome, PriceError> {
        let normalized = normalizer::normalize(query);
        let cache_key = format!("price:{store}:{normalized}:{page}");

        let read = self.cache.get::<Vec<SkuCandidate>>(&cache_key, self.window()).await;
        match read.freshness {
            Freshness::Fresh => Ok(FetchOutcome { candidates: read.value.unwrap_or_default(), bucket_wait_ms: 0 }),
            Freshness::Stale => {
                if self.cache.try_claim_refresh(&cache_key).await {
                    let store = store.to_string();
                    let query = normalized;
                    let cache = Arc::clone(&self.cache);
                    let this = self.clone_service();
                    let cache_key_bg = cache_key.clone();
                    tokio::spawn(async move {
                        if let Ok((candidates, _)) = this.fetch_from_upstream(&store, &query, page).await {
                            cache.set(&cache_key_bg, &candidates).await;
                        }
                        cache.release_refresh(&cache_key_bg).await;
                    });
                }
                Ok(FetchOutcome { candidates: read.value.unwrap_or_default(), bucket_wait_ms: 0 })
            }
            Freshness::Miss => {
                let (candidates, waited) = self.fetch_from_upstream(store, &normalized, page).await?;
                self.cache.set(&cache_key, &candidates).await;
                Ok(FetchOutcome { candidates, bucket_wait_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX) })
            }
        }
    }

    /// Cheap clone for moving into a background refresh task (cheap `Arc` clones inside).
    fn clone_service(&self) -> Self {
        Self {
            http: self.http.clone(),
            bucket: Arc::clone(&self.bucket),
            cache: Arc::clone(&self.cache),
            rate_limit: self.rate_limit,
            base_url: self.base_url.clone(),
        }
    }

    async fn fetch_from_upstream(
        &self,
        store: &str,
        normalized_query: &str,
        page: u32,
    ) -> Result<(Vec<SkuCandidate>, Duration), PriceError> {
        let waited = match self.bucket.try_acquire(store, self.rate_limit.max_wait).await {
            AcquireOutcome::Acquired { waited } => waited,
            AcquireOutcome::TimedOut => return Err(PriceError::RateLimited),
        };

        let mut attempt: u32 = 0;
        let mut retried_429 = false;
        loop {
            attempt += 1;
            match self.call_upstream(store, normalized_query, page).await {
                Ok(candidates) => return Ok((candidates, waited)),
                Err(PriceError::RateLimited) if !retried_429 => {
                    retried_429 = true;
                    tokio::time::sleep(self.rate_limit.retry_429_delay).await;
                }
                Err(err @ (PriceError::Upstream5xx(_) | PriceError::Timeout | PriceError::Network(_)))
                    if attempt < self.rate_limit.max_retries =>
                {
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt.saturating_sub(1)));
                    tokio::time::sleep(backoff).await;
                    let _ = err;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_upstream(&self, store: &str, query: &str, page: u32) -> Result<Vec<SkuCandidate>, PriceError> {
        if self.base_url.is_empty() {
            return Err(PriceError::Config("price client base_url is empty".to_string()));
        }
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("store", store), ("query", query), ("page", &page.to_string()), ("page_size", "20")])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let parsed: WireSearchResponse = response.json().await?;
                Ok(parsed.results.into_iter().map(SkuCandidate::from).collect())
            }
            status if status.as_u16() == 429 => Err(PriceError::RateLimited),
            status if status.is_server_error() => Err(PriceError::Upstream5xx(format!("HTTP {status}"))),
            status => Err(PriceError::BadRequest(format!("HTTP {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    #[tokio::test]
    async fn empty_base_url_surfaces_as_config_error() {
        let client = PriceClient::new(
            String::new(),
            Arc::new(TokenBucket::new(10.0, 10.0)),
            Arc::new(InMemoryCache::new()),
            RateLimitConfig::default(),
        );
        let outcome = client.fetch_prices("S1", "chicken breast", 1).await;
        assert!(matches!(outcome, Err(PriceError::Config(_))));
    }

    #[test]
    fn status_codes_distinguish_fatal_from_retryable() {
        assert_eq!(PriceError::RateLimited.status_code(), 429);
        assert_eq!(PriceError::BadRequest("x".into()).status_code(), 400);
    }
}
