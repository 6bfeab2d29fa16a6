// ABOUTME: Shared test fixtures: a canned meal-sketch collaborator and a price-cache seeding helper
// ABOUTME: Lets integration tests drive the orchestrator without a live LLM or supermarket upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Test Fixtures.
//!
//! [`StubCollaborator`] answers [`crate::orchestrator::MealSketchCollaborator`]
//! from a canned per-day table instead of calling a real model. [`seed_price_cache`]
//! writes directly into an [`SwrCache`] at the exact key [`crate::market::price_client::PriceClient`]
//! reads, so a test can make the market-run phase see canned SKUs without a live
//! supermarket endpoint — the same approach the resolver's own tests use for
//! its hot-path/canonical-store tiers.

use crate::cache::SwrCache;
use crate::errors::{AppError, AppResult};
use crate::llm::{RawMealSketch, RawMeal};
use crate::model::{Profile, SkuCandidate};
use crate::normalizer;
use crate::orchestrator::MealSketchCollaborator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A [`MealSketchCollaborator`] that answers from a fixed per-day table,
/// recording every request it received for assertions.
pub struct StubCollaborator {
    sketches: HashMap<u32, RawMealSketch>,
    requests: Mutex<Vec<u32>>,
}

impl StubCollaborator {
    /// An empty stub; every `sketch_day` call fails until [`Self::with_day`] is used.
    #[must_use]
    pub fn new() -> Self {
        Self { sketches: HashMap::new(), requests: Mutex::new(Vec::new()) }
    }

    /// Register the sketch to return for `day`.
    #[must_use]
    pub fn with_day(mut self, day: u32, meals: Vec<RawMeal>) -> Self {
        self.sketches.insert(day, RawMealSketch { day, meals });
        self
    }

    /// Every day number requested so far, in call order.
    #[must_use]
    pub fn requested_days(&self) -> Vec<u32> {
        self.requests.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl Default for StubCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MealSketchCollaborator for StubCollaborator {
    async fn sketch_day(&self, _profile: &Profile, day: u32) -> AppResult<RawMealSketch> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(day);
        }
        self.sketches
            .get(&day)
            .cloned()
            .ok_or_else(|| AppError::upstream_permanent("stub_collaborator", format!("no sketch registered for day {day}")))
    }
}

/// Write `skus` into `cache` at the exact key `PriceClient::fetch_prices` would
/// read for `(store, query, page)`, so a test-driven market run serves them
/// without a live supermarket endpoint.
pub async fn seed_price_cache<C: SwrCache>(cache: &C, store: &str, query: &str, page: u32, skus: &[SkuCandidate]) {
    let normalized = normalizer::normalize(query);
    let cache_key = format!("price:{store}:{normalized}:{page}");
    cache.set(&cache_key, &skus.to_vec()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RawIngredient;
    use crate::model::{ActivityLevel, EatingOccasions, Goal, Sex};

    fn profile() -> Profile {
        Profile {
            height_cm: 175.0,
            weight_kg: 70.0,
            age: 28,
            sex: Sex::Female,
            activity: ActivityLevel::Light,
            goal: Goal::Maintain,
            dietary_tags: vec![],
            cuisine_prompt: None,
            days: 1,
            eating_occasions: EatingOccasions::new(3).unwrap(),
            store: "S1".to_string(),
            preferred_stores: vec![],
        }
    }

    fn ingredient() -> RawIngredient {
        RawIngredient { name: "rolled oats".to_string(), qty_value: 80.0, qty_unit: "g".to_string(), state_hint: None, method_hint: None, cid: None }
    }

    #[tokio::test]
    async fn stub_collaborator_answers_registered_days_and_records_requests() {
        let stub = StubCollaborator::new().with_day(
            1,
            vec![RawMeal { meal_id: "m1".to_string(), meal_type: "B".to_string(), title: "Breakfast".to_string(), description: None, items: vec![ingredient()] }],
        );
        let sketch = stub.sketch_day(&profile(), 1).await.unwrap();
        assert_eq!(sketch.meals.len(), 1);
        assert_eq!(stub.requested_days(), vec![1]);
    }

    #[tokio::test]
    async fn stub_collaborator_fails_on_an_unregistered_day() {
        let stub = StubCollaborator::new();
        assert!(stub.sketch_day(&profile(), 2).await.is_err());
    }
}
