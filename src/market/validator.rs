// ABOUTME: Deterministic SKU candidate validator (C7): ordered allow/deny gates with first-failure short-circuit
// ABOUTME: Also hosts the price-outlier guard applied after validation across a rung's accepted candidates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Product Validator (C7).
//!
//! [`validate`] runs six gates in order, stopping at the first failure:
//! global banned keywords, CID-specific excluded terms, a required-word ANY
//! check (with a small lemmatizer), a category gate, a size-sanity check, and
//! a unit-price sanity check. [`apply_price_outlier_guard`] is a separate,
//! later pass over a whole rung's accepted candidates.

use crate::registry::IngredientSpec;
use crate::model::{SizeUnit, SkuCandidate};

/// Keywords that disqualify any candidate regardless of CID, title hits only.
const GLOBAL_BANNED_KEYWORDS: &[&str] =
    &["cigarette", "tobacco", "pet food", "cat food", "dog food", "bleach", "detergent", "shampoo", "lotion"];

/// Outcome of validating one candidate against one [`IngredientSpec`].
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the candidate passed every gate.
    pub pass: bool,
    /// The reason for rejection, if any.
    pub reason: Option<String>,
    /// A `[0.0, 1.0]` match-quality score, only meaningful when `pass` is true.
    pub score: f64,
}

impl ValidationResult {
    fn reject(reason: impl Into<String>) -> Self {
        Self { pass: false, reason: Some(reason.into()), score: 0.0 }
    }
}

fn title_contains_any(title_lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| title_lower.contains(&term.to_lowercase()))
}

/// A tiny lemmatizer for the required-word gate: strips a trailing `s`, or
/// rewrites a trailing `ies` to `y`, so "tomatoes"/"berries" match "tomato"/"berry".
fn lemmatize(token: &str) -> String {
    if let Some(stem) = token.strip_suffix("ies") {
        return format!("{stem}y");
    }
    token.strip_suffix('s').map_or_else(|| token.to_string(), ToString::to_string)
}

fn title_contains_any_lemmatized(title_lower: &str, terms: &[&str]) -> bool {
    let tokens: Vec<String> = title_lower.split_whitespace().map(lemmatize).collect();
    terms.iter().any(|term| {
        let term = term.to_lowercase();
        tokens.iter().any(|tok| *tok == term || *tok == lemmatize(&term))
    })
}

fn base_unit_value(size: crate::model::PackSize) -> f64 {
    size.value
}

/// Validate one candidate against `spec`'s gates, in order.
#[must_use]
pub fn validate(candidate: &SkuCandidate, spec: &IngredientSpec, size_sanity_lower: f64, size_sanity_upper: f64, size_sanity_upper_pantry: f64) -> ValidationResult {
    let title_lower = candidate.title.to_lowercase();

    if title_contains_any(&title_lower, GLOBAL_BANNED_KEYWORDS) {
        return ValidationResult::reject("title matches a globally banned keyword");
    }

    if title_contains_any(&title_lower, spec.must_exclude) {
        return ValidationResult::reject("title matches a CID-excluded keyword");
    }

    if !spec.must_include.is_empty() && !title_contains_any_lemmatized(&title_lower, spec.must_include) {
        return ValidationResult::reject("title matches none of the required terms");
    }

    let category_hit = candidate
        .category
        .as_deref()
        .is_some_and(|c| spec.allowed_store_categories.iter().any(|allowed| c.to_lowercase().contains(&allowed.to_lowercase())));
    if !spec.allowed_store_categories.is_empty() {
        if spec.requires_category_match && !category_hit {
            return ValidationResult::reject("category is missing or mismatched, and this CID requires a category match");
        }
        if candidate.category.is_some() && !category_hit {
            return ValidationResult::reject("category does not match allowed categories");
        }
    }

    if !spec.is_produce && !spec.typical_pack_sizes.is_empty() {
        let reference =
            spec.typical_pack_sizes.iter().copied().sum::<f64>() / spec.typical_pack_sizes.len() as f64;
        let lower = reference * size_sanity_lower;
        let upper = reference * if spec.is_pantry { size_sanity_upper_pantry } else { size_sanity_upper };
        let parsed = base_unit_value(candidate.size);
        if !(lower..=upper).contains(&parsed) {
            return ValidationResult::reject(format!("size {parsed} outside sanity range [{lower:.0}, {upper:.0}]"));
        }
    }

    if !(candidate.unit_price_per_100 > 0.0 && candidate.unit_price_per_100 < 1000.0) {
        return ValidationResult::reject(format!("unit price {:.2} outside sanity range", candidate.unit_price_per_100));
    }

    let term_score = if spec.must_include.is_empty() { 1.0 } else { 0.6 };
    let category_score = if category_hit || spec.allowed_store_categories.is_empty() { 0.4 } else { 0.0 };
    ValidationResult { pass: true, reason: None, score: term_score + category_score }
}

/// Drop candidates whose unit price is a statistical outlier (z-score `> 2.0`)
/// relative to the rest of the set; requires at least 3 candidates to apply.
#[must_use]
pub fn apply_price_outlier_guard(candidates: Vec<SkuCandidate>, z_threshold: f64) -> Vec<SkuCandidate> {
    if candidates.len() < 3 {
        return candidates;
    }
    let prices: Vec<f64> = candidates.iter().map(|c| c.unit_price_per_100).collect();
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
    let stdev = variance.sqrt();
    if stdev <= f64::EPSILON {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| ((c.unit_price_per_100 - mean) / stdev).abs() <= z_threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackSize;

    fn candidate(title: &str, category: &str, price: f64, size: f64) -> SkuCandidate {
        SkuCandidate::new(
            title.to_string(),
            None,
            Some(category.to_string()),
            price,
            PackSize { value: size, unit: SizeUnit::G },
            format!("https://example.test/{title}"),
            None,
        )
    }

    #[test]
    fn rejects_globally_banned_keyword() {
        let spec = crate::registry::lookup("chicken_breast").unwrap();
        let sku = candidate("Chicken Breast Cat Food Treats", "meat", 5.0, 500.0);
        let result = validate(&sku, spec, 0.5, 2.0, 3.0);
        assert!(!result.pass);
    }

    #[test]
    fn accepts_plausible_chicken_breast_listing() {
        let spec = crate::registry::lookup("chicken_breast").unwrap();
        let sku = candidate("Boneless Chicken Breast 900g", "fresh_meat", 8.0, 900.0);
        let result = validate(&sku, spec, 0.5, 2.0, 3.0);
        assert!(result.pass, "{:?}", result.reason);
    }

    #[test]
    fn hard_required_category_rejects_a_missing_category() {
        let spec = crate::registry::lookup("olive_oil").unwrap();
        assert!(spec.requires_category_match);
        let sku = SkuCandidate::new(
            "Extra Virgin Olive Oil 750ml".to_string(),
            None,
            None,
            6.0,
            PackSize { value: 750.0, unit: SizeUnit::G },
            "https://example.test/olive-oil".to_string(),
            None,
        );
        let result = validate(&sku, spec, 0.5, 2.0, 3.0);
        assert!(!result.pass);
    }

    #[test]
    fn hard_required_category_rejects_a_mismatched_category() {
        let spec = crate::registry::lookup("olive_oil").unwrap();
        let sku = candidate("Extra Virgin Olive Oil 750ml", "cleaning_supplies", 6.0, 750.0);
        let result = validate(&sku, spec, 0.5, 2.0, 3.0);
        assert!(!result.pass);
    }

    #[test]
    fn soft_category_gate_still_accepts_a_missing_category() {
        let spec = crate::registry::lookup("chicken_breast").unwrap();
        assert!(!spec.requires_category_match);
        let sku = SkuCandidate::new(
            "Boneless Chicken Breast 900g".to_string(),
            None,
            None,
            8.0,
            PackSize { value: 900.0, unit: SizeUnit::G },
            "https://example.test/chicken-breast".to_string(),
            None,
        );
        let result = validate(&sku, spec, 0.5, 2.0, 3.0);
        assert!(result.pass, "{:?}", result.reason);
    }

    #[test]
    fn outlier_guard_requires_at_least_three_candidates() {
        let candidates = vec![candidate("a", "meat", 5.0, 500.0), candidate("b", "meat", 50.0, 500.0)];
        assert_eq!(apply_price_outlier_guard(candidates.clone(), 2.0).len(), candidates.len());
    }

    #[test]
    fn outlier_guard_drops_extreme_price() {
        let candidates = vec![
            candidate("a", "meat", 5.0, 500.0),
            candidate("b", "meat", 5.5, 500.0),
            candidate("c", "meat", 6.0, 500.0),
            candidate("outlier", "meat", 900.0, 500.0),
        ];
        let filtered = apply_price_outlier_guard(candidates, 2.0);
        assert!(filtered.iter().all(|c| c.title != "outlier"));
    }
}
