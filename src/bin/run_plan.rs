// ABOUTME: Demo CLI binary: reads a Profile as JSON and prints the orchestrator's PlanResponse or PlanFailure
// ABOUTME: Wires the real USDA nutrition provider but a canned meal-sketch collaborator, since the LLM transport is out of scope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![forbid(unsafe_code)]

//! # Meal-Plan Orchestrator CLI
//!
//! Drives one [`mealplan_orchestrator::orchestrator::Orchestrator::plan`] call
//! from the command line, printing the resulting JSON to stdout. Intended as a
//! smoke-test harness, not a production entry point: the meal-sketch
//! collaborator is a canned [`mealplan_orchestrator::test_utils::StubCollaborator`]
//! since wiring a real model transport is explicitly out of scope here (see
//! the crate root docs).

use anyhow::{Context, Result};
use clap::Parser;
use mealplan_orchestrator::cache::InMemoryCache;
use mealplan_orchestrator::config::environment::LoggingConfig;
use mealplan_orchestrator::config::tunables::PipelineConfig;
use mealplan_orchestrator::external::usda_client::{UsdaClientConfig, UsdaProvider};
use mealplan_orchestrator::market::price_client::PriceClient;
use mealplan_orchestrator::market::token_bucket::TokenBucket;
use mealplan_orchestrator::model::Profile;
use mealplan_orchestrator::nutrition::resolver::NutritionResolver;
use mealplan_orchestrator::nutrition::store::CanonicalStore;
use mealplan_orchestrator::orchestrator::{MealSketchCollaborator, Orchestrator};
use mealplan_orchestrator::progress::ProgressSink;
use mealplan_orchestrator::test_utils::StubCollaborator;
use std::fs;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "run-plan")]
#[command(about = "Run the meal-plan orchestrator against a profile JSON file")]
struct Args {
    /// Path to a JSON-encoded Profile. Reads from stdin if omitted.
    #[arg(short, long)]
    profile: Option<String>,

    /// USDA `FoodData` Central API key; falls back to the `DEMO_KEY` rate-limited tier.
    #[arg(long, env = "USDA_API_KEY")]
    usda_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    LoggingConfig::from_env().init_tracing();

    let profile = load_profile(&args)?;
    let config = PipelineConfig::from_env();

    let collaborator = demo_collaborator(&profile);
    let orchestrator = build_orchestrator(&config, args.usda_api_key, collaborator);

    let progress = ProgressSink::collecting();
    info!(days = profile.days, store = %profile.store, "starting plan request");

    match orchestrator.plan(&profile, &progress).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response).context("serializing plan response")?);
            Ok(())
        }
        Err(failure) => {
            eprintln!("{}", serde_json::to_string_pretty(&failure).context("serializing plan failure")?);
            std::process::exit(1);
        }
    }
}

fn load_profile(args: &Args) -> Result<Profile> {
    let raw = match &args.profile {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading profile file {path}"))?,
        None => std::io::read_to_string(std::io::stdin()).context("reading profile from stdin")?,
    };
    serde_json::from_str(&raw).context("parsing profile JSON")
}

/// One fixed breakfast sketch per requested day, since the LLM transport is
/// out of scope here; a real deployment wires a [`MealSketchCollaborator`]
/// that calls an actual model instead.
fn demo_collaborator(profile: &Profile) -> Arc<dyn MealSketchCollaborator> {
    use mealplan_orchestrator::llm::{RawIngredient, RawMeal};

    let mut stub = StubCollaborator::new();
    for day in 1..=profile.days {
        stub = stub.with_day(
            day,
            vec![RawMeal {
                meal_id: format!("d{day}-breakfast"),
                meal_type: "B".to_string(),
                title: "Oats and eggs".to_string(),
                description: None,
                items: vec![
                    RawIngredient {
                        name: "rolled oats".to_string(),
                        qty_value: 80.0,
                        qty_unit: "g".to_string(),
                        state_hint: None,
                        method_hint: None,
                        cid: None,
                    },
                    RawIngredient {
                        name: "egg".to_string(),
                        qty_value: 2.0,
                        qty_unit: "egg".to_string(),
                        state_hint: None,
                        method_hint: None,
                        cid: None,
                    },
                ],
            }],
        );
    }
    Arc::new(stub)
}

fn build_orchestrator(
    config: &PipelineConfig,
    usda_api_key: Option<String>,
    collaborator: Arc<dyn MealSketchCollaborator>,
) -> Orchestrator<InMemoryCache> {
    let cache = Arc::new(InMemoryCache::new());
    let bucket = Arc::new(TokenBucket::new(config.rate_limit.bucket_capacity, config.rate_limit.refill_per_sec));
    let price_client = Arc::new(PriceClient::new("https://market.example.invalid", bucket, Arc::clone(&cache), config.rate_limit));

    // No canonical-store snapshot is bundled with this binary; every lookup
    // falls through to the USDA external tier.
    let store = CanonicalStore::ingest(vec![], &config.nutrition);
    let usda_config = UsdaClientConfig { api_key: usda_api_key.unwrap_or_else(|| "DEMO_KEY".to_string()), ..UsdaClientConfig::default() };
    let provider = Arc::new(UsdaProvider::new(usda_config, config.rate_limit.http_timeout));
    let resolver = Arc::new(NutritionResolver::new(store, provider, cache, config.nutrition, config.rate_limit));

    Orchestrator::new(*config, collaborator, price_client, resolver)
}
