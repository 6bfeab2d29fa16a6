// ABOUTME: Per-ingredient query-ladder fan-out with a bounded worker pool (C8)
// ABOUTME: tight -> normal -> wide rungs, outlier pruning, cheapest-by-unit-price selection, skip heuristic
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Market Run (C8).
//!
//! Each ingredient is an independent task; one ingredient's failure never
//! aborts its peers (`Outcome = Success(x) | Failure(reason, context)`, never
//! a short-circuit). Workers share the market-run semaphore, the price
//! client's token bucket, and its SWR cache.

use crate::cache::SwrCache;
use crate::config::MarketConfig;
use crate::market::price_client::PriceClient;
use crate::market::validator::{apply_price_outlier_guard, validate};
use crate::model::{RejectedCandidate, SkuCandidate};
use crate::registry::{self, IngredientSpec, LadderQuery, QueryRung};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Per-ingredient market-run result.
#[derive(Debug, Clone)]
pub enum IngredientOutcome {
    /// A SKU was found and validated.
    Discovery {
        /// The chosen candidate.
        sku: SkuCandidate,
        /// The validator's match-quality score for the chosen candidate.
        score: f64,
    },
    /// Every rung returned results but none passed validation.
    Failed {
        /// Every candidate rejected, across every rung tried.
        rejected: Vec<RejectedCandidate>,
    },
    /// An unrecoverable fetch error occurred on every rung.
    Error {
        /// The last error's description.
        reason: String,
    },
    /// No candidate surfaced from any rung, with no rejections and no fetch
    /// errors. This module cannot say whether that becomes a canonical
    /// fallback (nutrition still resolves by name) or a true miss — nutrition
    /// resolution is a separate, later phase this module never sees. The
    /// caller classifies the final outcome once both phases have run.
    NoCandidate,
}

/// One ingredient's full market-run result, including the diagnostic trail.
#[derive(Debug, Clone)]
pub struct MarketResult {
    /// Canonical ingredient descriptor this result is for.
    pub cid: String,
    /// Every query string issued, in ladder order.
    pub queries: Vec<String>,
    /// Outcome of the run.
    pub outcome: IngredientOutcome,
}

async fn run_ladder<C: SwrCache + 'static>(
    client: &PriceClient<C>,
    spec: &IngredientSpec,
    store: &str,
    market: &MarketConfig,
) -> MarketResult {
    let ladder = registry::build_queries_for_cid(spec, store);
    let mut queries = Vec::with_capacity(ladder.len());
    let mut accepted: Vec<(SkuCandidate, f64)> = Vec::new();
    let mut rejected: Vec<RejectedCandidate> = Vec::new();
    let mut seen_urls = std::collections::HashSet::new();
    let mut last_error: Option<String> = None;

    for LadderQuery { rung, query } in ladder {
        queries.push(query.clone());
        match client.fetch_prices(store, &query, 1).await {
            Ok(outcome) => {
                for candidate in outcome.candidates {
                    if !seen_urls.insert(candidate.url.clone()) {
                        continue;
                    }
                    let result = validate(
                        &candidate,
                        spec,
                        market.size_sanity_lower,
                        market.size_sanity_upper,
                        market.size_sanity_upper_pantry,
                    );
                    if result.pass {
                        accepted.push((candidate, result.score));
                    } else {
                        rejected.push(RejectedCandidate {
                            title: candidate.title,
                            reason: result.reason.unwrap_or_default(),
                        });
                    }
                }
            }
            Err(err) => {
                last_error = Some(format!("{query}: {err:?}"));
                continue;
            }
        }

        let survivors: Vec<SkuCandidate> = accepted.iter().map(|(c, _)| c.clone()).collect();
        let survivors = apply_price_outlier_guard(survivors, market.outlier_z_threshold);
        let survivor_urls: std::collections::HashSet<&str> = survivors.iter().map(|c| c.url.as_str()).collect();
        accepted.retain(|(c, _)| survivor_urls.contains(c.url.as_str()));

        if rung == QueryRung::Tight {
            if let Some((_, best_score)) = accepted.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
                if *best_score >= market.skip_heuristic_score {
                    break;
                }
            }
        }
    }

    if let Some((sku, score)) = accepted
        .into_iter()
        .min_by(|a, b| a.0.unit_price_per_100.total_cmp(&b.0.unit_price_per_100))
    {
        return MarketResult { cid: spec.cid.to_string(), queries, outcome: IngredientOutcome::Discovery { sku, score } };
    }

    let outcome = if !rejected.is_empty() {
        IngredientOutcome::Failed { rejected }
    } else if let Some(reason) = last_error {
        IngredientOutcome::Error { reason }
    } else {
        IngredientOutcome::NoCandidate
    };
    MarketResult { cid: spec.cid.to_string(), queries, outcome }
}

/// Run the market-run phase over every resolved CID, bounded by `market.worker_count`
/// concurrent workers. Every `cid` passed in already has a registry entry (the
/// caller filters those out before this is invoked); a CID with no registry
/// entry is silently dropped from the result set rather than ever reaching C8.
pub async fn run_market<C: SwrCache + 'static>(
    client: Arc<PriceClient<C>>,
    cids: &[String],
    store: &str,
    market: MarketConfig,
) -> Vec<MarketResult> {
    let semaphore = Arc::new(Semaphore::new(market.worker_count.max(1)));
    let mut handles = Vec::with_capacity(cids.len());

    for cid in cids {
        let Some(spec) = registry::lookup(cid) else { continue };
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let store = store.to_string();
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return MarketResult {
                    cid: spec.cid.to_string(),
                    queries: Vec::new(),
                    outcome: IngredientOutcome::Error { reason: "worker semaphore closed".to_string() },
                };
            };
            run_ladder(&client, spec, &store, &market).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(result) = handle.await {
            results.push(result);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::RateLimitConfig;
    use crate::market::token_bucket::TokenBucket;

    #[tokio::test]
    async fn unregistered_cid_is_skipped_without_panicking() {
        let client = Arc::new(PriceClient::new(
            String::new(),
            Arc::new(TokenBucket::new(10.0, 10.0)),
            Arc::new(InMemoryCache::new()),
            RateLimitConfig::default(),
        ));
        let results = run_market(client, &["not_a_real_cid".to_string()], "S1", MarketConfig::default()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn config_error_on_every_rung_surfaces_as_error_outcome() {
        let client = Arc::new(PriceClient::new(
            String::new(),
            Arc::new(TokenBucket::new(10.0, 10.0)),
            Arc::new(InMemoryCache::new()),
            RateLimitConfig::default(),
        ));
        let results = run_market(client, &["chicken_breast".to_string()], "S1", MarketConfig::default()).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].outcome, IngredientOutcome::Error { .. }));
    }
}
