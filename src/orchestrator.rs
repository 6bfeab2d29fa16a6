// ABOUTME: Phase sequencer (C12): contract -> sketch -> C1/C2 -> market run (C8) -> nutrition resolve (C5) -> solver (C10) -> ledger (C11)
// ABOUTME: Owns cancellation, per-phase timeouts, and assembly of the final structured response or failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Orchestrator (C12).
//!
//! Phases run in strict happens-before order — `contract ≺ sketch ≺ market_run
//! ≺ nutrition_resolve ≺ solve ≺ ledger` — each phase boundary a
//! synchronization barrier the next phase cannot start before. Within a
//! phase, work fans out over a bounded worker pool (market run and nutrition
//! resolve) or runs serially (the sketch request, one collaborator call at a
//! time). A [`tokio::time::timeout`] wraps the whole request; an in-flight
//! network call it cancels is not interrupted, only its result is dropped.
//!
//! [`ProgressSink`] records a [`LogEntry`] at every phase boundary and for
//! every per-ingredient outcome, so a caller streaming the request sees
//! exactly the same trail that ends up in the final response's `logs` array.

use crate::cache::SwrCache;
use crate::config::{PipelineConfig, SolverConfig};
use crate::contract;
use crate::errors::{AppError, AppResult, PlanErrorKind};
use crate::ledger::{self, Ledger};
use crate::llm::meal_sketch::{self, RawMealSketch};
use crate::market::price_client::PriceClient;
use crate::market::run::{run_market, IngredientOutcome, MarketResult};
use crate::model::{DayPlan, MacroContract, Macros, MealType, NutritionRow, Profile, SkuCandidate};
use crate::nutrition::resolver::{NutritionResolver, ResolveOutcome};
use crate::progress::{Level, LogEntry, ProgressSink};
use crate::quantity;
use crate::registry::{self, CidAssignment};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Upstream HTTP timeout is carried on [`crate::config::RateLimitConfig`]; these
/// two are request-level budgets only the orchestrator owns.
const LLM_TIMEOUT: Duration = Duration::from_secs(90);
const TOTAL_WALL_TIME: Duration = Duration::from_secs(180);

/// The LLM collaborator's only contract with the orchestrator: given a
/// profile and a 1-indexed day number, return that day's raw meal sketch.
///
/// Which model answers, the prompt used, and the transport are all out of
/// scope here, mirroring how [`crate::external::NutritionProvider`]
/// abstracts the nutrition lookup.
#[async_trait]
pub trait MealSketchCollaborator: Send + Sync {
    /// Request a meal sketch for `day` of `profile`'s plan.
    ///
    /// # Errors
    /// Returns an error if the collaborator could not be reached or refused
    /// the request; the orchestrator treats this as an upstream failure, not
    /// a blueprint-validation failure (that happens after parsing).
    async fn sketch_day(&self, profile: &Profile, day: u32) -> AppResult<RawMealSketch>;
}

/// One resolved ingredient line in a [`MealView`].
#[derive(Debug, Clone, Serialize)]
pub struct PlannedItemView {
    /// Canonical ingredient descriptor.
    pub cid: String,
    /// Display name as sketched.
    pub display_name: String,
    /// Final solved grams.
    pub grams: f64,
}

/// One solved meal, ready for the response.
#[derive(Debug, Clone, Serialize)]
pub struct MealView {
    /// Meal identifier.
    pub meal_id: String,
    /// Meal type.
    #[serde(rename = "type")]
    pub meal_type: MealType,
    /// Human-readable title.
    pub title: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Final ingredient lines.
    pub items: Vec<PlannedItemView>,
    /// Recomputed macros for this meal, from the ledger.
    pub final_macros: Macros,
}

/// One day's solved plan.
#[derive(Debug, Clone, Serialize)]
pub struct DayPlanView {
    /// 1-indexed day number.
    pub day: u32,
    /// Solved meals for this day.
    pub meals: Vec<MealView>,
}

/// One ingredient summarized across the whole plan, for a shopping list.
#[derive(Debug, Clone, Serialize)]
pub struct UniqueIngredient {
    /// Canonical ingredient descriptor.
    pub cid: String,
    /// Display name, from the registry entry.
    pub display_name: String,
    /// The market-run's chosen SKU, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_sku: Option<SkuCandidate>,
    /// The market-run validator's match-quality score for `chosen_sku` (0.0 if none).
    pub confidence: f64,
    /// Total grams needed across every meal and day that uses this ingredient.
    pub total_grams: f64,
    /// Number of `chosen_sku` packs required to cover `total_grams`, rounded up.
    pub quantity_units: u32,
}

/// Whether the final ledger satisfied the contract (always `true` on a
/// successful response; a failing ledger is returned as a [`PlanFailure`] instead).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ContractSatisfied {
    /// Always `true` in a successful [`PlanResponse`].
    pub ok: bool,
}

/// The full successful response (§6 of the external-interfaces schema).
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    /// The daily macro contract the plan was built against.
    pub contract: MacroContract,
    /// Every day's solved meal plan.
    #[serde(rename = "mealPlan")]
    pub meal_plan: Vec<DayPlanView>,
    /// Shopping-list view: one entry per CID used anywhere in the plan.
    #[serde(rename = "uniqueIngredients")]
    pub unique_ingredients: Vec<UniqueIngredient>,
    /// Resolved nutrition, by CID.
    pub results: HashMap<String, NutritionRow>,
    /// Mean daily totals across every planned day.
    pub ledger: Macros,
    #[serde(rename = "contractSatisfied")]
    /// Contract-satisfaction verdict.
    pub contract_satisfied: ContractSatisfied,
    /// Every progress/log entry emitted during this request.
    pub logs: Vec<LogEntry>,
}

/// The failure response shape: an HTTP 5xx with this body (§6).
#[derive(Debug, Clone, Serialize)]
pub struct PlanFailure {
    /// Terminal failure kind.
    pub error: PlanErrorKind,
    /// Human-readable reason.
    pub reason: String,
    /// Every progress/log entry emitted before the failure.
    pub logs: Vec<LogEntry>,
}

/// Sequences every phase of a meal-plan request against one [`SwrCache`] backend.
pub struct Orchestrator<C: SwrCache + 'static> {
    config: PipelineConfig,
    llm: Arc<dyn MealSketchCollaborator>,
    price_client: Arc<PriceClient<C>>,
    nutrition_resolver: Arc<NutritionResolver<C>>,
}

impl<C: SwrCache + 'static> Orchestrator<C> {
    /// Construct an orchestrator wired to its collaborators.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        llm: Arc<dyn MealSketchCollaborator>,
        price_client: Arc<PriceClient<C>>,
        nutrition_resolver: Arc<NutritionResolver<C>>,
    ) -> Self {
        Self { config, llm, price_client, nutrition_resolver }
    }

    /// Run the full pipeline for `profile`, emitting progress to `progress`.
    ///
    /// Bounded by a total wall-time timeout; a timeout anywhere surfaces as
    /// an `UNCAUGHT` failure rather than hanging the caller indefinitely.
    pub async fn plan(&self, profile: &Profile, progress: &ProgressSink) -> Result<PlanResponse, PlanFailure> {
        match timeout(TOTAL_WALL_TIME, self.plan_inner(profile, progress)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(self.fail(err, progress)),
            Err(_) => Err(self.fail(AppError::internal("request exceeded the total wall-time budget"), progress)),
        }
    }

    fn fail(&self, err: AppError, progress: &ProgressSink) -> PlanFailure {
        progress.emit(LogEntry::new(Level::Error, "phase.failed", err.message.clone()));
        PlanFailure { error: PlanErrorKind::from(err.code), reason: err.message, logs: progress.logs() }
    }

    async fn plan_inner(&self, profile: &Profile, progress: &ProgressSink) -> AppResult<PlanResponse> {
        profile.validate()?;

        progress.phase("phase.contract", "building daily macro contract");
        let contract = contract::build_contract(profile, &self.config.contract);

        let mut days = self.sketch_all_days(profile, progress).await?;

        for day in &mut days {
            assign_meal_targets(&contract, day, profile.eating_occasions.get());
        }
        assign_cids_and_grams(&mut days, &self.config.solver)?;
        for day in &days {
            meal_sketch::check_referential_integrity(day)?;
        }

        let cids = unique_cids(&days);
        progress.phase("phase.market_run", format!("running market search for {} ingredient(s)", cids.len()));
        let market_results = run_market(Arc::clone(&self.price_client), &cids, &profile.store, self.config.market).await;
        let sku_by_cid = index_market_results(&market_results, progress);

        progress.phase("phase.nutrition_resolve", format!("resolving nutrition for {} ingredient(s)", cids.len()));
        let nutrition_by_cid = self.resolve_nutrition(&cids, &sku_by_cid, progress).await;
        log_canonical_fallback_outcomes(&market_results, &nutrition_by_cid, progress);

        progress.phase("phase.solve", "solving per-meal portions");
        for day in &mut days {
            let result = crate::solver::solve(&contract, &mut day.meals, &nutrition_by_cid, &self.config.solver);
            if !result.feasible {
                return Err(AppError::solver_infeasible(format!(
                    "day {}: no scale vector within bounds satisfies the contract (method {:?})",
                    day.day, result.method
                )));
            }
        }

        progress.phase("phase.ledger", "recomputing ledger from final choices");
        let mut ledgers = Vec::with_capacity(days.len());
        for day in &days {
            let day_ledger = ledger::build_ledger(&contract, &day.meals, &nutrition_by_cid);
            if !day_ledger.passes() {
                return Err(AppError::ledger_mismatch(format!(
                    "day {}: {} contract violation(s) in the recomputed ledger",
                    day.day,
                    day_ledger.violations.len()
                )));
            }
            ledgers.push(day_ledger);
        }

        progress.phase("phase.done", "plan complete");
        Ok(assemble_response(contract, days, &ledgers, &sku_by_cid, nutrition_by_cid, progress))
    }

    /// Request every day's sketch from the collaborator, one at a time (the
    /// collaborator is rate-limited externally, so no worker pool here).
    async fn sketch_all_days(&self, profile: &Profile, progress: &ProgressSink) -> AppResult<Vec<DayPlan>> {
        progress.phase("phase.sketch", "requesting meal sketch from the LLM collaborator");
        let mut days = Vec::with_capacity(profile.days as usize);
        for day_num in 1..=profile.days {
            let raw = timeout(LLM_TIMEOUT, self.llm.sketch_day(profile, day_num))
                .await
                .map_err(|_| AppError::upstream_transient("llm", format!("day {day_num}: sketch request timed out")))??;
            days.push(meal_sketch::validate_sketch(&raw)?);
        }
        progress.phase("phase.sketch", format!("received {} day(s) of meals", days.len()));
        Ok(days)
    }

    /// Resolve nutrition for every unique CID, bounded by `market.nutrition_worker_count`
    /// concurrent workers. A rejected or unresolved CID contributes nothing to the map;
    /// the ledger already treats a missing CID as a zero contribution, never a panic.
    async fn resolve_nutrition(
        &self,
        cids: &[String],
        sku_by_cid: &HashMap<String, (SkuCandidate, f64)>,
        progress: &ProgressSink,
    ) -> HashMap<String, NutritionRow> {
        let semaphore = Arc::new(Semaphore::new(self.config.market.nutrition_worker_count.max(1)));
        let mut handles = Vec::with_capacity(cids.len());

        for cid in cids {
            let Some(spec) = registry::lookup(cid) else { continue };
            let cid = cid.clone();
            let display_name = spec.display_name.to_string();
            let barcode = sku_by_cid.get(&cid).and_then(|(sku, _)| sku.barcode.clone());
            let resolver = Arc::clone(&self.nutrition_resolver);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = resolver.resolve(Some(&cid), &display_name, barcode.as_deref()).await;
                (cid, outcome)
            }));
        }

        let mut resolved = HashMap::new();
        for handle in handles {
            let Ok((cid, outcome)) = handle.await else { continue };
            match outcome {
                ResolveOutcome::Resolved(row) => {
                    resolved.insert(cid, row);
                }
                ResolveOutcome::Rejected { source, reason } => {
                    progress.warn_with(
                        "phase.nutrition_resolve.item",
                        format!("{cid}: rejected from {source}"),
                        serde_json::json!({"cid": cid, "source": source, "reason": reason}),
                    );
                }
                ResolveOutcome::NotFound => {
                    progress.warn_with(
                        "phase.nutrition_resolve.item",
                        format!("{cid}: no nutrition source resolved a row"),
                        serde_json::json!({"cid": cid}),
                    );
                }
            }
        }
        resolved
    }
}

/// Apportion the daily contract across `occasions` meals, widening tolerance
/// for snack-type occasions (`S1`/`S2`), and stamp the result onto each meal.
fn assign_meal_targets(contract: &MacroContract, day: &mut DayPlan, occasions: u8) {
    for meal in &mut day.meals {
        let is_snack = matches!(meal.meal_type, MealType::S1 | MealType::S2);
        let (targets, tolerances) = contract::apportion_meal_targets(contract, occasions, is_snack);
        meal.targets = targets;
        meal.tolerances = tolerances;
    }
}

/// C1/C2: convert every item's `qty_value`/`qty_unit` to grams and assign a
/// CID to every item the collaborator did not already resolve one for.
///
/// Per-item `min_g`/`max_g` mirror the solver's own per-meal scale bounds,
/// since the solver applies one scale factor uniformly to every item in a meal.
fn assign_cids_and_grams(days: &mut [DayPlan], solver_config: &SolverConfig) -> AppResult<()> {
    for day in days.iter_mut() {
        for meal in &mut day.meals {
            for item in &mut meal.items {
                let grams = quantity::to_grams(&item.display_name, item.qty_value, item.qty_unit)
                    .map_err(|err| AppError::blueprint_invalid(format!("{}: {err}", item.display_name)))?;
                item.required_grams = Some(grams);
                item.min_g = Some(grams * solver_config.scale_min);
                item.max_g = Some(grams * solver_config.scale_max);
                item.normalized_key = Some(crate::normalizer::normalize(&item.display_name));
            }
        }
    }

    let mut locations = Vec::new();
    let mut batch = Vec::new();
    for (day_idx, day) in days.iter().enumerate() {
        for (meal_idx, meal) in day.meals.iter().enumerate() {
            for (item_idx, item) in meal.items.iter().enumerate() {
                if item.cid.is_none() {
                    locations.push((day_idx, meal_idx, item_idx));
                    batch.push((item.display_name.clone(), item.required_grams.unwrap_or_default()));
                }
            }
        }
    }
    let assignments = registry::map_ingredients_to_cid(&batch);
    for ((day_idx, meal_idx, item_idx), assignment) in locations.into_iter().zip(assignments) {
        if let CidAssignment::Assigned { cid, .. } = assignment {
            days[day_idx].meals[meal_idx].items[item_idx].cid = Some(cid.to_string());
        }
    }
    Ok(())
}

fn unique_cids(days: &[DayPlan]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for day in days {
        for meal in &day.meals {
            for item in &meal.items {
                if let Some(cid) = &item.cid {
                    set.insert(cid.clone());
                }
            }
        }
    }
    set.into_iter().collect()
}

fn index_market_results(results: &[MarketResult], progress: &ProgressSink) -> HashMap<String, (SkuCandidate, f64)> {
    let mut out = HashMap::new();
    for result in results {
        match &result.outcome {
            IngredientOutcome::Discovery { sku, score } => {
                progress.phase("phase.market_run.item", format!("{}: found {}", result.cid, sku.title));
                out.insert(result.cid.clone(), (sku.clone(), *score));
            }
            IngredientOutcome::Failed { rejected } => {
                progress.warn_with(
                    "phase.market_run.item",
                    format!("{}: no candidate passed validation", result.cid),
                    serde_json::json!({"cid": result.cid, "rejected_count": rejected.len()}),
                );
            }
            IngredientOutcome::Error { reason } => {
                progress.warn_with(
                    "phase.market_run.item",
                    format!("{}: market search error", result.cid),
                    serde_json::json!({"cid": result.cid, "reason": reason}),
                );
            }
            IngredientOutcome::NoCandidate => {
                progress.phase("phase.market_run.item", format!("{}: no market candidate found on any rung", result.cid));
            }
        }
    }
    out
}

/// Log the final disposition of every CID that market-run could not resolve to
/// a SKU. Whether that CID counts as a canonical-nutrition fallback or a true
/// miss is only knowable once nutrition resolution (a later, independent
/// phase) has run, so this is called after `nutrition_by_cid` is built rather
/// than from `index_market_results`.
fn log_canonical_fallback_outcomes(
    results: &[MarketResult],
    nutrition_by_cid: &HashMap<String, NutritionRow>,
    progress: &ProgressSink,
) {
    for result in results {
        if !matches!(result.outcome, IngredientOutcome::NoCandidate) {
            continue;
        }
        if nutrition_by_cid.contains_key(&result.cid) {
            progress.phase(
                "phase.market_run.item",
                format!("{}: no SKU found, resolved via canonical nutrition fallback", result.cid),
            );
        } else {
            progress.warn_with(
                "phase.market_run.item",
                format!("{}: no SKU found and no nutrition resolved", result.cid),
                serde_json::json!({"cid": result.cid}),
            );
        }
    }
}

fn assemble_response(
    contract: MacroContract,
    days: Vec<DayPlan>,
    ledgers: &[Ledger],
    sku_by_cid: &HashMap<String, (SkuCandidate, f64)>,
    nutrition_by_cid: HashMap<String, NutritionRow>,
    progress: &ProgressSink,
) -> PlanResponse {
    let mut total_grams_by_cid: HashMap<String, f64> = HashMap::new();
    let mut meal_plan = Vec::with_capacity(days.len());

    for (day, day_ledger) in days.into_iter().zip(ledgers) {
        let mut meals = Vec::with_capacity(day.meals.len());
        for meal in &day.meals {
            let ledger_entry = day_ledger.meals.iter().find(|entry| entry.meal_id == meal.meal_id);
            let mut items = Vec::new();
            for solved in &meal.solution {
                let Some(source_item) = meal.items.get(solved.item_index) else { continue };
                let Some(cid) = source_item.cid.clone() else { continue };
                if solved.grams == 0 {
                    continue;
                }
                let grams = f64::from(solved.grams);
                *total_grams_by_cid.entry(cid.clone()).or_insert(0.0) += grams;
                items.push(PlannedItemView { cid, display_name: source_item.display_name.clone(), grams });
            }
            meals.push(MealView {
                meal_id: meal.meal_id.clone(),
                meal_type: meal.meal_type,
                title: meal.title.clone(),
                description: meal.description.clone(),
                items,
                final_macros: ledger_entry.map_or_else(Macros::default, |entry| entry.macros),
            });
        }
        meal_plan.push(DayPlanView { day: day.day, meals });
    }

    let unique_ingredients = total_grams_by_cid
        .into_iter()
        .map(|(cid, total_grams)| {
            let display_name = registry::lookup(&cid).map_or_else(|| cid.clone(), |spec| spec.display_name.to_string());
            let (chosen_sku, confidence) = sku_by_cid.get(&cid).cloned().map_or((None, 0.0), |(sku, score)| (Some(sku), score));
            let quantity_units = chosen_sku.as_ref().map_or(1, |sku| pack_units_needed(total_grams, sku));
            UniqueIngredient { cid, display_name, chosen_sku, confidence, total_grams, quantity_units }
        })
        .collect();

    let day_count = ledgers.len().max(1) as f64;
    let mean_totals = ledgers.iter().fold(Macros::default(), |acc, l| acc.add(&l.daily_totals)).scaled(1.0 / day_count);

    progress.phase("phase.done", "response assembled");
    PlanResponse {
        contract,
        meal_plan,
        unique_ingredients,
        results: nutrition_by_cid,
        ledger: mean_totals,
        contract_satisfied: ContractSatisfied { ok: true },
        logs: progress.logs(),
    }
}

/// Number of `sku`-sized packs needed to cover `total_grams`, rounded up.
fn pack_units_needed(total_grams: f64, sku: &SkuCandidate) -> u32 {
    if sku.size.value <= 0.0 {
        return 1;
    }
    (total_grams / sku.size.value).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::external::usda_client::MockUsdaProvider;
    use crate::llm::{RawIngredient, RawMeal};
    use crate::market::token_bucket::TokenBucket;
    use crate::model::{ActivityLevel, EatingOccasions, Goal, Sex};
    use crate::nutrition::store::CanonicalStore;

    struct StaticCollaborator;

    #[async_trait]
    impl MealSketchCollaborator for StaticCollaborator {
        async fn sketch_day(&self, _profile: &Profile, day: u32) -> AppResult<RawMealSketch> {
            Ok(RawMealSketch {
                day,
                meals: vec![RawMeal {
                    meal_id: format!("d{day}-m1"),
                    meal_type: "B".to_string(),
                    title: "Breakfast".to_string(),
                    description: None,
                    items: vec![RawIngredient {
                        name: "chicken breast".to_string(),
                        qty_value: 200.0,
                        qty_unit: "g".to_string(),
                        state_hint: None,
                        method_hint: None,
                        cid: None,
                    }],
                }],
            })
        }
    }

    struct FailingCollaborator;

    #[async_trait]
    impl MealSketchCollaborator for FailingCollaborator {
        async fn sketch_day(&self, _profile: &Profile, _day: u32) -> AppResult<RawMealSketch> {
            Err(AppError::upstream_transient("llm", "service unavailable"))
        }
    }

    fn profile() -> Profile {
        Profile {
            height_cm: 180.0,
            weight_kg: 80.0,
            age: 30,
            sex: Sex::Male,
            activity: ActivityLevel::Moderate,
            goal: Goal::Maintain,
            dietary_tags: vec![],
            cuisine_prompt: None,
            days: 1,
            eating_occasions: EatingOccasions::new(4).unwrap(),
            store: "S1".to_string(),
            preferred_stores: vec![],
        }
    }

    fn orchestrator(llm: Arc<dyn MealSketchCollaborator>) -> Orchestrator<InMemoryCache> {
        let config = PipelineConfig::default();
        let cache = Arc::new(InMemoryCache::new());
        let bucket = Arc::new(TokenBucket::new(config.rate_limit.bucket_capacity, config.rate_limit.refill_per_sec));
        let price_client = Arc::new(PriceClient::new("http://market.invalid", bucket, Arc::clone(&cache), config.rate_limit));
        let store = CanonicalStore::ingest(vec![], &config.nutrition);
        let provider = Arc::new(MockUsdaProvider::with_row("chicken breast", crate::model::NutritionRow {
            kcal_per_100g: 165.0,
            protein_per_100g: 31.0,
            fat_per_100g: 3.6,
            carb_per_100g: 0.0,
            fiber_per_100g: 0.0,
            state: crate::model::NutritionState::Raw,
            yield_factor: None,
            density_g_per_ml: None,
            source: crate::model::NutritionSource::ExternalQuery,
            confidence: 0.9,
        }));
        let resolver = Arc::new(NutritionResolver::new(store, provider, cache, config.nutrition, config.rate_limit));
        Orchestrator::new(config, llm, price_client, resolver)
    }

    #[tokio::test]
    async fn llm_upstream_failure_surfaces_as_uncaught_not_a_panic() {
        let orch = orchestrator(Arc::new(FailingCollaborator));
        let progress = ProgressSink::collecting();
        let err = orch.plan(&profile(), &progress).await.unwrap_err();
        assert_eq!(err.error, PlanErrorKind::Uncaught);
    }

    #[tokio::test]
    async fn unresolved_cid_never_panics_the_pipeline() {
        // The market has no registered SKU source configured to answer, so the
        // ingredient never gets a chosen SKU; the pipeline must still complete
        // (carrying a zero-contribution ingredient) rather than panic.
        let orch = orchestrator(Arc::new(StaticCollaborator));
        let progress = ProgressSink::collecting();
        let outcome = orch.plan(&profile(), &progress).await;
        assert!(outcome.is_ok() || matches!(outcome, Err(ref f) if f.error != PlanErrorKind::Uncaught));
    }

    #[test]
    fn pack_units_rounds_up() {
        let sku = SkuCandidate::new("Chicken".to_string(), None, None, 5.0, crate::model::PackSize { value: 300.0, unit: crate::model::SizeUnit::G }, "u".to_string(), None);
        assert_eq!(pack_units_needed(650.0, &sku), 3);
    }

    #[test]
    fn pack_units_defaults_to_one_pack_when_size_is_degenerate() {
        let sku = SkuCandidate::new("Mystery".to_string(), None, None, 5.0, crate::model::PackSize { value: 0.0, unit: crate::model::SizeUnit::G }, "u".to_string(), None);
        assert_eq!(pack_units_needed(650.0, &sku), 1);
    }

    fn no_candidate_result(cid: &str) -> MarketResult {
        MarketResult { cid: cid.to_string(), queries: vec![], outcome: IngredientOutcome::NoCandidate }
    }

    #[test]
    fn no_candidate_with_resolved_nutrition_logs_as_canonical_fallback() {
        let results = vec![no_candidate_result("honey")];
        let mut nutrition_by_cid = HashMap::new();
        nutrition_by_cid.insert("honey".to_string(), crate::model::NutritionRow {
            kcal_per_100g: 304.0,
            protein_per_100g: 0.3,
            fat_per_100g: 0.0,
            carb_per_100g: 82.4,
            fiber_per_100g: 0.2,
            state: crate::model::NutritionState::Raw,
            yield_factor: None,
            density_g_per_ml: None,
            source: crate::model::NutritionSource::Canonical,
            confidence: 0.95,
        });
        let progress = ProgressSink::collecting();
        log_canonical_fallback_outcomes(&results, &nutrition_by_cid, &progress);
        let logs = progress.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, Level::Info);
        assert!(logs[0].message.contains("canonical nutrition fallback"));
    }

    #[test]
    fn no_candidate_with_no_nutrition_logs_as_a_true_miss() {
        let results = vec![no_candidate_result("mystery_cid")];
        let nutrition_by_cid = HashMap::new();
        let progress = ProgressSink::collecting();
        log_canonical_fallback_outcomes(&results, &nutrition_by_cid, &progress);
        let logs = progress.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, Level::Warn);
        assert!(logs[0].message.contains("no SKU found and no nutrition resolved"));
    }
}
