// ABOUTME: Tiered nutrition resolver (C5): hot-path -> canonical store -> external by barcode -> external by query
// ABOUTME: Every external hit is cached SWR and fingerprint-validated against the CID's expected macros
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Nutrition Resolver (C5).
//!
//! Walks the tiers in order, stopping at the first source that produces a row
//! passing validation. Hot-path and canonical-store rows are trusted as-is
//! (they already passed their own ingestion gates, P1/P2); external rows are
//! additionally checked against the CID's expected per-100g fingerprint, and a
//! failed check is never written to the cache as if it had succeeded — the
//! next caller for the same key re-fetches rather than seeing a poisoned hit.

use crate::cache::{get_or_refresh_checked, SwrCache, TtlWindow};
use crate::config::{NutritionConfig, RateLimitConfig};
use crate::errors::AppError;
use crate::external::NutritionProvider;
use crate::model::{Macros, NutritionRow};
use crate::normalizer;
use crate::registry;
use std::sync::Arc;

/// The result of resolving one ingredient's nutrition data.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// A row was found and (if external) passed fingerprint validation.
    Resolved(NutritionRow),
    /// An external row was found but rejected by the fingerprint gate.
    Rejected {
        /// Source tier the rejected row came from (for diagnostics).
        source: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// No tier produced a usable row.
    NotFound,
}

/// Relative deviation between `value` and `expected`, `0.0` when `expected` is zero.
fn relative_error(value: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return if value <= 0.0 { 0.0 } else { f64::INFINITY };
    }
    (value - expected).abs() / expected
}

/// Validate an externally sourced row's per-100g macros against the CID's
/// expected fingerprint, using [`NutritionConfig`]'s tolerances.
fn validate_fingerprint(row: &NutritionRow, expected: Macros, config: &NutritionConfig) -> Result<(), String> {
    let kcal_err = relative_error(row.kcal_per_100g, expected.kcal);
    if kcal_err > config.fingerprint_kcal_tolerance_pct {
        return Err(format!(
            "kcal {:.1} deviates {:.0}% from expected {:.1} (tolerance {:.0}%)",
            row.kcal_per_100g,
            kcal_err * 100.0,
            expected.kcal,
            config.fingerprint_kcal_tolerance_pct * 100.0
        ));
    }
    for (label, value, target) in [
        ("protein", row.protein_per_100g, expected.protein_g),
        ("fat", row.fat_per_100g, expected.fat_g),
        ("carb", row.carb_per_100g, expected.carb_g),
    ] {
        let err = relative_error(value, target);
        if err > config.fingerprint_macro_tolerance_pct {
            return Err(format!(
                "{label} {value:.1} deviates {:.0}% from expected {target:.1} (tolerance {:.0}%)",
                err * 100.0,
                config.fingerprint_macro_tolerance_pct * 100.0
            ));
        }
    }
    Ok(())
}

/// Tiered nutrition resolver, generic over its SWR cache backend.
pub struct NutritionResolver<C: SwrCache + 'static> {
    store: crate::nutrition::store::CanonicalStore,
    provider: Arc<dyn NutritionProvider>,
    cache: Arc<C>,
    nutrition_config: NutritionConfig,
    rate_limit_config: RateLimitConfig,
}

impl<C: SwrCache + 'static> NutritionResolver<C> {
    /// Construct a resolver over a canonical store, an external provider, and a cache backend.
    #[must_use]
    pub fn new(
        store: crate::nutrition::store::CanonicalStore,
        provider: Arc<dyn NutritionProvider>,
        cache: Arc<C>,
        nutrition_config: NutritionConfig,
        rate_limit_config: RateLimitConfig,
    ) -> Self {
        Self { store, provider, cache, nutrition_config, rate_limit_config }
    }

    fn window(&self) -> TtlWindow {
        TtlWindow { fresh: self.rate_limit_config.nutrition_fresh_ttl, hard: self.rate_limit_config.nutrition_hard_ttl }
    }

    /// Resolve nutrition for one ingredient.
    ///
    /// `cid`, if present, is used both for the canonical-store lookup key and
    /// as the expected-fingerprint source for external tiers; `display_name`
    /// is normalized and used as the query fallback when `cid` is absent or
    /// unregistered.
    pub async fn resolve(
        &self,
        cid: Option<&str>,
        display_name: &str,
        barcode: Option<&str>,
    ) -> ResolveOutcome {
        let normalized_key = cid.map_or_else(|| normalizer::normalize(display_name), ToString::to_string);

        if let Some(row) = crate::nutrition::hot_path::lookup(&normalized_key) {
            return ResolveOutcome::Resolved(row);
        }

        if let Some(row) = self.store.lookup(&normalized_key) {
            return ResolveOutcome::Resolved(row);
        }
        for candidate in normalizer::fuzzy_candidates(&normalized_key) {
            if let Some(row) = self.store.lookup(&candidate) {
                return ResolveOutcome::Resolved(row);
            }
        }

        let expected_fingerprint = cid.and_then(registry::lookup).map(|spec| registry::expected_fingerprint(spec));

        if let Some(barcode) = barcode {
            match self.fetch_external(&format!("nutrition:barcode:{barcode}"), barcode, true, expected_fingerprint).await {
                Ok(Some(row)) => match self.accept_or_reject(row, expected_fingerprint, "external_barcode") {
                    Ok(outcome) => return outcome,
                    Err(reason) => {
                        tracing::warn!(barcode, reason, "external barcode lookup rejected by fingerprint gate");
                    }
                },
                Ok(None) | Err(_) => {}
            }
        }

        let query = display_name.to_string();
        match self.fetch_external(&format!("nutrition:query:{normalized_key}"), &query, false, expected_fingerprint).await {
            Ok(Some(row)) => match self.accept_or_reject(row, expected_fingerprint, "external_query") {
                Ok(outcome) => return outcome,
                Err(reason) => return ResolveOutcome::Rejected { source: "external_query", reason },
            },
            Ok(None) | Err(_) => {}
        }

        ResolveOutcome::NotFound
    }

    fn accept_or_reject(
        &self,
        row: NutritionRow,
        expected_fingerprint: Option<Macros>,
        source: &'static str,
    ) -> Result<ResolveOutcome, String> {
        if let Some(expected) = expected_fingerprint {
            if let Err(reason) = validate_fingerprint(&row, expected, &self.nutrition_config) {
                return Err(reason);
            }
        }
        let _ = source;
        Ok(ResolveOutcome::Resolved(row))
    }

    /// Fetch (or serve cached) nutrition for `argument`, validating any freshly
    /// fetched row against `expected_fingerprint` before it is allowed into the
    /// cache. A row failing that check is still returned to the caller for
    /// `accept_or_reject` to report, but is never persisted as a cache hit.
    async fn fetch_external(
        &self,
        cache_key: &str,
        argument: &str,
        by_barcode: bool,
        expected_fingerprint: Option<Macros>,
    ) -> Result<Option<NutritionRow>, AppError> {
        let provider = Arc::clone(&self.provider);
        let argument = argument.to_string();
        let nutrition_config = self.nutrition_config;
        get_or_refresh_checked(
            &self.cache,
            cache_key,
            self.window(),
            move || async move {
                if by_barcode {
                    provider.by_barcode(&argument).await
                } else {
                    provider.by_query(&argument).await
                }
            },
            move |maybe_row: &Option<NutritionRow>| match (maybe_row, expected_fingerprint) {
                (Some(row), Some(expected)) => validate_fingerprint(row, expected, &nutrition_config).is_ok(),
                _ => true,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Freshness, InMemoryCache};
    use crate::external::usda_client::MockUsdaProvider;
    use crate::model::{NutritionSource, NutritionState};

    fn mock_row(kcal: f64, p: f64, f: f64, c: f64) -> NutritionRow {
        NutritionRow {
            kcal_per_100g: kcal,
            protein_per_100g: p,
            fat_per_100g: f,
            carb_per_100g: c,
            fiber_per_100g: 0.0,
            state: NutritionState::AsSold,
            yield_factor: None,
            density_g_per_ml: None,
            source: NutritionSource::ExternalQuery,
            confidence: 0.6,
        }
    }

    #[tokio::test]
    async fn hot_path_short_circuits_before_any_external_call() {
        let provider = Arc::new(MockUsdaProvider::default());
        let resolver = NutritionResolver::new(
            crate::nutrition::store::CanonicalStore::empty(),
            provider,
            Arc::new(InMemoryCache::new()),
            NutritionConfig::default(),
            RateLimitConfig::default(),
        );
        let outcome = resolver.resolve(None, "Chicken Breast", None).await;
        assert!(matches!(outcome, ResolveOutcome::Resolved(row) if (row.kcal_per_100g - 165.0).abs() < 1.0));
    }

    #[tokio::test]
    async fn external_row_failing_fingerprint_is_rejected_not_cached_as_success() {
        // 900 kcal/100g for "chicken_breast" is wildly outside its expected fingerprint.
        let provider = Arc::new(MockUsdaProvider::with_row("Mystery Protein", mock_row(900.0, 5.0, 99.0, 0.0)));
        let resolver = NutritionResolver::new(
            crate::nutrition::store::CanonicalStore::empty(),
            provider,
            Arc::new(InMemoryCache::new()),
            NutritionConfig::default(),
            RateLimitConfig::default(),
        );
        let outcome = resolver.resolve(Some("chicken_breast"), "Mystery Protein", None).await;
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn fetch_external_does_not_cache_a_row_rejected_by_its_accept_hook() {
        let provider = Arc::new(MockUsdaProvider::with_row("Mystery Protein", mock_row(900.0, 5.0, 99.0, 0.0)));
        let cache = Arc::new(InMemoryCache::new());
        let rate_limit_config = RateLimitConfig::default();
        let resolver = NutritionResolver::new(
            crate::nutrition::store::CanonicalStore::empty(),
            provider,
            Arc::clone(&cache),
            NutritionConfig::default(),
            rate_limit_config,
        );
        let expected = Macros { kcal: 165.0, protein_g: 31.0, fat_g: 3.6, carb_g: 0.0 };
        let result = resolver.fetch_external("nutrition:query:mystery", "Mystery Protein", false, Some(expected)).await;
        assert!(matches!(result, Ok(Some(_))));

        // The 900 kcal/100g row badly fails the fingerprint, so it must not be cached.
        let window = TtlWindow { fresh: rate_limit_config.nutrition_fresh_ttl, hard: rate_limit_config.nutrition_hard_ttl };
        let read = cache.get::<Option<NutritionRow>>("nutrition:query:mystery", window).await;
        assert_eq!(read.freshness, Freshness::Miss);
    }

    #[test]
    fn validate_fingerprint_zero_expected_kcal_does_not_divide_by_zero() {
        let expected = Macros { kcal: 0.0, protein_g: 0.0, fat_g: 0.0, carb_g: 0.0 };
        let row = mock_row(0.0, 0.0, 0.0, 0.0);
        assert!(validate_fingerprint(&row, expected, &NutritionConfig::default()).is_ok());
    }
}
