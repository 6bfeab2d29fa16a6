// ABOUTME: Full-pipeline integration test: sketch -> CID/grams -> market run -> nutrition resolve -> solve -> ledger
// ABOUTME: Drives Orchestrator::plan() against a canned collaborator and a pre-seeded price cache, no network I/O

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use mealplan_orchestrator::cache::InMemoryCache;
use mealplan_orchestrator::config::tunables::PipelineConfig;
use mealplan_orchestrator::external::usda_client::MockUsdaProvider;
use mealplan_orchestrator::llm::{RawIngredient, RawMeal};
use mealplan_orchestrator::market::price_client::PriceClient;
use mealplan_orchestrator::market::token_bucket::TokenBucket;
use mealplan_orchestrator::model::{ActivityLevel, EatingOccasions, Goal, PackSize, Profile, Sex, SizeUnit, SkuCandidate};
use mealplan_orchestrator::nutrition::resolver::NutritionResolver;
use mealplan_orchestrator::nutrition::store::CanonicalStore;
use mealplan_orchestrator::orchestrator::Orchestrator;
use mealplan_orchestrator::progress::ProgressSink;
use mealplan_orchestrator::test_utils::{seed_price_cache, StubCollaborator};
use std::sync::Arc;

fn profile() -> Profile {
    Profile {
        height_cm: 165.0,
        weight_kg: 65.0,
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

fn lunch_sketch() -> Vec<RawMeal> {
    vec![RawMeal {
        meal_id: "d1-lunch".to_string(),
        meal_type: "L".to_string(),
        title: "Chicken, rice and olive oil".to_string(),
        description: None,
        items: vec![
            RawIngredient {
                name: "Chicken Breast".to_string(),
                qty_value: 272.0,
                qty_unit: "g".to_string(),
                state_hint: None,
                method_hint: None,
                cid: Some("chicken_breast".to_string()),
            },
            RawIngredient {
                name: "White Rice".to_string(),
                qty_value: 730.0,
                qty_unit: "g".to_string(),
                state_hint: None,
                method_hint: None,
                cid: Some("white_rice".to_string()),
            },
            RawIngredient {
                name: "Olive Oil".to_string(),
                qty_value: 58.0,
                qty_unit: "g".to_string(),
                state_hint: None,
                method_hint: None,
                cid: Some("olive_oil".to_string()),
            },
        ],
    }]
}

fn chicken_sku() -> SkuCandidate {
    SkuCandidate::new(
        "Boneless Chicken Breast 900g".to_string(),
        None,
        Some("fresh_meat".to_string()),
        8.0,
        PackSize { value: 900.0, unit: SizeUnit::G },
        "https://shop.example.test/chicken-breast-900g".to_string(),
        None,
    )
}

fn rice_sku() -> SkuCandidate {
    SkuCandidate::new(
        "Long Grain White Rice 2kg".to_string(),
        None,
        Some("grains".to_string()),
        3.5,
        PackSize { value: 2000.0, unit: SizeUnit::G },
        "https://shop.example.test/white-rice-2kg".to_string(),
        None,
    )
}

fn olive_oil_sku() -> SkuCandidate {
    SkuCandidate::new(
        "Extra Virgin Olive Oil 750ml".to_string(),
        None,
        Some("oil".to_string()),
        6.0,
        PackSize { value: 750.0, unit: SizeUnit::G },
        "https://shop.example.test/olive-oil-750ml".to_string(),
        None,
    )
}

/// Build an orchestrator wired to an in-memory cache and a `PriceClient` whose
/// base URL is deliberately empty: every ladder query this test exercises is
/// pre-seeded as a fresh cache hit, so the empty URL is never dereferenced.
async fn build_orchestrator() -> Orchestrator<InMemoryCache> {
    let config = PipelineConfig::default();
    let cache = Arc::new(InMemoryCache::new());

    seed_price_cache(cache.as_ref(), "S1", "S1 chicken breast boneless", 1, &[chicken_sku()]).await;
    seed_price_cache(cache.as_ref(), "S1", "S1 white rice long_grain", 1, &[rice_sku()]).await;
    seed_price_cache(cache.as_ref(), "S1", "S1 olive oil extra_virgin", 1, &[olive_oil_sku()]).await;

    let bucket = Arc::new(TokenBucket::new(config.rate_limit.bucket_capacity, config.rate_limit.refill_per_sec));
    let price_client = Arc::new(PriceClient::new(String::new(), bucket, Arc::clone(&cache), config.rate_limit));

    let store = CanonicalStore::ingest(vec![], &config.nutrition);
    let provider = Arc::new(MockUsdaProvider::default());
    let resolver = Arc::new(NutritionResolver::new(store, provider, cache, config.nutrition, config.rate_limit));

    let collaborator = Arc::new(StubCollaborator::new().with_day(1, lunch_sketch()));
    Orchestrator::new(config, collaborator, price_client, resolver)
}

#[tokio::test]
async fn full_pipeline_satisfies_the_contract_with_a_pre_seeded_market() {
    let orchestrator = build_orchestrator().await;
    let progress = ProgressSink::collecting();

    let response = orchestrator
        .plan(&profile(), &progress)
        .await
        .unwrap_or_else(|failure| panic!("expected a successful plan, got a failure: {failure:?}"));

    assert!(response.contract_satisfied.ok);
    assert_eq!(response.meal_plan.len(), 1);
    assert_eq!(response.meal_plan[0].meals.len(), 1);

    let lunch = &response.meal_plan[0].meals[0];
    assert_eq!(lunch.items.len(), 3);
    assert!(lunch.items.iter().all(|item| item.grams > 0.0));

    let cids: std::collections::BTreeSet<&str> = response.unique_ingredients.iter().map(|u| u.cid.as_str()).collect();
    assert_eq!(cids, std::collections::BTreeSet::from(["chicken_breast", "olive_oil", "white_rice"]));
    assert!(response.unique_ingredients.iter().all(|u| u.chosen_sku.is_some()));

    assert!(response.results.contains_key("chicken_breast"));
    assert!(response.results.contains_key("white_rice"));
    assert!(response.results.contains_key("olive_oil"));

    let tol = &response.contract.tolerances;
    let relative_gap = |actual: f64, target: f64| (actual - target).abs() / target;
    assert!(relative_gap(response.ledger.kcal, response.contract.kcal) <= tol.kcal_pct);
    assert!(relative_gap(response.ledger.protein_g, response.contract.protein_g) <= tol.protein_pct);
    assert!(relative_gap(response.ledger.fat_g, response.contract.fat_g) <= tol.fat_pct);
    assert!(relative_gap(response.ledger.carb_g, response.contract.carb_g) <= tol.carb_pct);
}

#[tokio::test]
async fn an_unregistered_day_never_panics_and_fails_cleanly() {
    let config = PipelineConfig::default();
    let cache = Arc::new(InMemoryCache::new());
    let bucket = Arc::new(TokenBucket::new(config.rate_limit.bucket_capacity, config.rate_limit.refill_per_sec));
    let price_client = Arc::new(PriceClient::new(String::new(), bucket, Arc::clone(&cache), config.rate_limit));
    let store = CanonicalStore::ingest(vec![], &config.nutrition);
    let provider = Arc::new(MockUsdaProvider::default());
    let resolver = Arc::new(NutritionResolver::new(store, provider, cache, config.nutrition, config.rate_limit));

    // The stub has no sketch registered for day 1 at all.
    let collaborator = Arc::new(StubCollaborator::new());
    let orchestrator = Orchestrator::new(config, collaborator, price_client, resolver);
    let progress = ProgressSink::collecting();

    let failure = orchestrator.plan(&profile(), &progress).await.unwrap_err();
    assert!(!failure.logs.is_empty());
}
