// ABOUTME: Bounded portion solver (C10): per-meal scale fitting against the daily macro contract
// ABOUTME: Primary projected-gradient solve, heuristic bias fallback, booster injection, min_g last resort
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Portion Solver (C10).
//!
//! Each meal gets one scale factor `s_j ∈ [scale_min, scale_max]` applied to
//! every one of its items. The primary solve minimizes a macro-weighted
//! squared residual between the scaled daily totals and the contract via
//! projected gradient descent with backtracking. Two fallbacks exist for
//! sketches the primary solve cannot fit: a closed-form heuristic bias, and a
//! one-shot booster-meal injection. If nothing satisfies the contract, every
//! ingredient reverts to its declared minimum and the result is never
//! reported as feasible.

use crate::config::SolverConfig;
use crate::model::{HardCaps, Macros, MacroContract, Meal, NutritionRow, SolvedItem, Tolerances};
use std::collections::HashMap;

/// Which path produced a [`SolveResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    /// The projected-gradient solve satisfied the contract.
    Primal,
    /// The closed-form per-meal bias heuristic satisfied the contract.
    Heuristic,
    /// A booster meal was appended and the primary solve re-run.
    Boosted,
    /// No path satisfied the contract; every item reverted to its `min_g`.
    MinGFallback,
}

/// Full result of a [`solve`] call.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Which path was used.
    pub method: SolveMethod,
    /// Recomputed daily totals under the chosen solution.
    pub totals: Macros,
    /// Whether `totals` satisfies the contract (always false for `MinGFallback`).
    pub feasible: bool,
}

struct MealContext {
    /// Meal index into `meals`.
    meal_index: usize,
    /// Item indices (within the meal) that have resolved nutrition and required grams.
    item_indices: Vec<usize>,
    /// Base macros for this meal at scale 1.0 (sum of each item's `required_grams` macros).
    base: Macros,
}

fn build_contexts(meals: &[Meal], nutrition_by_cid: &HashMap<String, NutritionRow>) -> Vec<MealContext> {
    meals
        .iter()
        .enumerate()
        .map(|(meal_index, meal)| {
            let mut base = Macros::default();
            let mut item_indices = Vec::new();
            for (idx, item) in meal.items.iter().enumerate() {
                let (Some(cid), Some(grams)) = (item.cid.as_deref(), item.required_grams) else { continue };
                let Some(row) = nutrition_by_cid.get(cid) else { continue };
                base = base.add(&row.macros_for_grams(grams));
                item_indices.push(idx);
            }
            MealContext { meal_index, item_indices, base }
        })
        .collect()
}

fn weighted_loss(contexts: &[MealContext], scales: &[f64], target: Macros, weights: (f64, f64, f64, f64)) -> (f64, Macros) {
    let totals = totals_for(contexts, scales);
    let (wk, wp, wf, wc) = weights;
    let loss = wk * (totals.kcal - target.kcal).powi(2)
        + wp * (totals.protein_g - target.protein_g).powi(2)
        + wf * (totals.fat_g - target.fat_g).powi(2)
        + wc * (totals.carb_g - target.carb_g).powi(2);
    (loss, totals)
}

fn totals_for(contexts: &[MealContext], scales: &[f64]) -> Macros {
    contexts.iter().zip(scales).fold(Macros::default(), |acc, (ctx, &s)| acc.add(&ctx.base.scaled(s)))
}

fn gradient(contexts: &[MealContext], scales: &[f64], target: Macros, weights: (f64, f64, f64, f64)) -> Vec<f64> {
    let totals = totals_for(contexts, scales);
    let (wk, wp, wf, wc) = weights;
    let dk = 2.0 * wk * (totals.kcal - target.kcal);
    let dp = 2.0 * wp * (totals.protein_g - target.protein_g);
    let df = 2.0 * wf * (totals.fat_g - target.fat_g);
    let dc = 2.0 * wc * (totals.carb_g - target.carb_g);
    contexts.iter().map(|ctx| dk * ctx.base.kcal + dp * ctx.base.protein_g + df * ctx.base.fat_g + dc * ctx.base.carb_g).collect()
}

fn project(scales: &[f64], min: f64, max: f64) -> Vec<f64> {
    scales.iter().map(|s| s.clamp(min, max)).collect()
}

/// Primary projected-gradient solve. Returns the best scale vector found and its totals.
///
/// `tolerances` must be the actual contract's (possibly env-overridden)
/// tolerances, not a hardcoded stand-in: the early-exit check below decides
/// whether the unscaled (scale=1.0) or partially-converged totals already
/// satisfy the contract, so a mismatched tolerance here would accept or
/// reject solutions the real contract wouldn't.
fn primal_solve(contexts: &[MealContext], target: Macros, config: &SolverConfig, tolerances: Tolerances) -> (Vec<f64>, Macros) {
    let mut scales = vec![1.0_f64; contexts.len()];
    let (mut best_loss, mut best_totals) = weighted_loss(contexts, &scales, target, config.weights);
    let mut eta = config.learning_rate;

    let contract_check = MacroContract {
        kcal: target.kcal,
        protein_g: target.protein_g,
        fat_g: target.fat_g,
        carb_g: target.carb_g,
        tolerances,
        hard_caps: HardCaps { protein_max: f64::INFINITY, fat_max: f64::INFINITY, carb_min: 0.0 },
    };

    for _ in 0..config.max_iterations {
        if contract_check.is_satisfied_by(&best_totals) {
            break;
        }

        let grad = gradient(contexts, &scales, target, config.weights);
        let mut accepted = false;
        let mut step = eta;

        for _ in 0..=config.max_backtracks {
            let candidate = project(
                &scales.iter().zip(&grad).map(|(s, g)| s - step * g).collect::<Vec<_>>(),
                config.scale_min,
                config.scale_max,
            );
            let (candidate_loss, candidate_totals) = weighted_loss(contexts, &candidate, target, config.weights);
            if candidate_loss <= best_loss {
                scales = candidate;
                best_loss = candidate_loss;
                best_totals = candidate_totals;
                accepted = true;
                break;
            }
            step /= 2.0;
        }

        eta = if accepted { eta * config.step_acceleration } else { eta / 2.0 };
    }

    (scales, best_totals)
}

/// Fallback 1: closed-form per-meal bias scaling, mixing a daily carb-ratio
/// and kcal-ratio global correction. No gradient, just a direct formula
/// iterated to let the global scale settle.
fn heuristic_solve(contexts: &[MealContext], target: Macros, config: &SolverConfig) -> (Vec<f64>, Macros) {
    let (bias_min, bias_max) = config.heuristic_bias_clamp;
    let biases: Vec<f64> = contexts
        .iter()
        .map(|ctx| {
            if ctx.base.kcal <= 0.0 {
                return 1.0;
            }
            let c_ratio = ctx.base.carb_g / ctx.base.kcal;
            let f_ratio = ctx.base.fat_g / ctx.base.kcal;
            let p_ratio = ctx.base.protein_g / ctx.base.kcal;
            (1.0 + 0.8 * c_ratio - 0.6 * f_ratio - 0.2 * p_ratio).clamp(bias_min, bias_max)
        })
        .collect();

    let (scale_min, scale_max) = config.heuristic_scale_clamp;
    let mut global_scale = 1.0_f64;
    let mut best_scales = biases.clone();
    let mut best_totals = totals_for(contexts, &best_scales);

    for _ in 0..config.heuristic_max_iterations {
        let scales: Vec<f64> = biases.iter().map(|b| b * global_scale).collect();
        let totals = totals_for(contexts, &scales);
        if target.kcal <= 0.0 || target.carb_g <= 0.0 {
            best_scales = scales;
            best_totals = totals;
            break;
        }
        let carb_ratio = target.carb_g / totals.carb_g.max(1e-9);
        let kcal_ratio = target.kcal / totals.kcal.max(1e-9);
        let correction = (0.7 * carb_ratio + 0.3 * kcal_ratio).clamp(scale_min, scale_max);

        best_scales = scales;
        best_totals = totals;
        if (correction - global_scale).abs() < 1e-6 {
            break;
        }
        global_scale = correction;
    }

    (project(&best_scales, config.scale_min, config.scale_max), best_totals)
}

/// A canonical high-carb booster meal: rice, banana, honey. ~450 kcal, ~100g carb.
const BOOSTER_MACROS: Macros = Macros { kcal: 452.0, protein_g: 8.0, fat_g: 2.0, carb_g: 100.0 };

/// Solve for per-meal scales, falling through the primary/heuristic/booster/min_g
/// ladder until one path satisfies `contract`. Writes `meals[*].solution` and
/// `meals[*].final_macros` in place and returns the overall [`SolveResult`].
pub fn solve(contract: &MacroContract, meals: &mut [Meal], nutrition_by_cid: &HashMap<String, NutritionRow>, config: &SolverConfig) -> SolveResult {
    let target = contract.targets();
    let mut contexts = build_contexts(meals, nutrition_by_cid);

    let (scales, totals) = primal_solve(&contexts, target, config, contract.tolerances);
    if contract.is_satisfied_by(&totals) {
        apply_scales(meals, &contexts, &scales, nutrition_by_cid);
        return SolveResult { method: SolveMethod::Primal, totals, feasible: true };
    }

    let (h_scales, h_totals) = heuristic_solve(&contexts, target, config);
    if contract.is_satisfied_by(&h_totals) {
        apply_scales(meals, &contexts, &h_scales, nutrition_by_cid);
        return SolveResult { method: SolveMethod::Heuristic, totals: h_totals, feasible: true };
    }

    // Booster injection: one synthetic meal appended once, primal solve re-run.
    contexts.push(MealContext { meal_index: usize::MAX, item_indices: Vec::new(), base: BOOSTER_MACROS });
    let (b_scales, b_totals) = primal_solve(&contexts, target, config, contract.tolerances);
    if contract.is_satisfied_by(&b_totals) {
        apply_scales(meals, &contexts, &b_scales, nutrition_by_cid);
        return SolveResult { method: SolveMethod::Boosted, totals: b_totals, feasible: true };
    }

    revert_to_min_g(meals, nutrition_by_cid);
    let final_totals = meals.iter().filter_map(|m| m.final_macros).fold(Macros::default(), |acc, m| acc.add(&m));
    SolveResult { method: SolveMethod::MinGFallback, totals: final_totals, feasible: false }
}

fn apply_scales(meals: &mut [Meal], contexts: &[MealContext], scales: &[f64], nutrition_by_cid: &HashMap<String, NutritionRow>) {
    for (ctx, &raw_scale) in contexts.iter().zip(scales) {
        if ctx.meal_index == usize::MAX {
            continue; // the synthetic booster meal has nothing to write back to
        }
        let scale = (raw_scale * 100.0).round() / 100.0;
        let meal = &mut meals[ctx.meal_index];
        let mut solution = Vec::with_capacity(ctx.item_indices.len());
        let mut final_macros = Macros::default();

        for &item_idx in &ctx.item_indices {
            let item = &meal.items[item_idx];
            let Some(required) = item.required_grams else { continue };
            let scaled = required * scale;
            let min_g = item.min_g.unwrap_or(0.0);
            let max_g = item.max_g.unwrap_or(f64::INFINITY);
            let grams = scaled.clamp(min_g, max_g).round().max(0.0);
            if grams > 0.0 {
                if let Some(cid) = item.cid.as_deref() {
                    if let Some(row) = nutrition_by_cid.get(cid) {
                        final_macros = final_macros.add(&row.macros_for_grams(grams));
                    }
                }
            }
            solution.push(SolvedItem { item_index: item_idx, grams: grams as u32 });
        }

        meal.solution = solution;
        meal.final_macros = Some(final_macros);
    }
}

fn revert_to_min_g(meals: &mut [Meal], nutrition_by_cid: &HashMap<String, NutritionRow>) {
    for meal in meals.iter_mut() {
        let mut solution = Vec::with_capacity(meal.items.len());
        let mut totals = Macros::default();
        for (idx, item) in meal.items.iter().enumerate() {
            let grams = item.min_g.unwrap_or(0.0);
            solution.push(SolvedItem { item_index: idx, grams: grams.round().max(0.0) as u32 });
            if let (Some(cid), true) = (item.cid.as_deref(), grams > 0.0) {
                if let Some(row) = nutrition_by_cid.get(cid) {
                    totals = totals.add(&row.macros_for_grams(grams));
                }
            }
        }
        meal.solution = solution;
        meal.final_macros = Some(totals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Macros, MealType, NutritionSource, NutritionState, PlannedIngredient, QtyUnit, Tolerances};

    fn row(kcal: f64, p: f64, f: f64, c: f64) -> NutritionRow {
        NutritionRow {
            kcal_per_100g: kcal,
            protein_per_100g: p,
            fat_per_100g: f,
            carb_per_100g: c,
            fiber_per_100g: 0.0,
            state: NutritionState::Raw,
            yield_factor: None,
            density_g_per_ml: None,
            source: NutritionSource::HotPath,
            confidence: 1.0,
        }
    }

    fn item(cid: &str, grams: f64) -> PlannedIngredient {
        PlannedIngredient {
            display_name: cid.to_string(),
            qty_value: grams,
            qty_unit: QtyUnit::G,
            state_hint: None,
            method_hint: None,
            cid: Some(cid.to_string()),
            normalized_key: Some(cid.to_string()),
            required_grams: Some(grams),
            min_g: Some(grams * 0.3),
            max_g: Some(grams * 3.0),
        }
    }

    fn meal(id: &str, items: Vec<PlannedIngredient>) -> Meal {
        Meal {
            meal_id: id.to_string(),
            meal_type: MealType::B,
            title: id.to_string(),
            description: None,
            targets: Macros::default(),
            tolerances: Tolerances { kcal_pct: 0.03, protein_pct: 0.08, fat_pct: 0.08, carb_pct: 0.08, carb_floor_pct: 0.8 },
            items,
            solution: Vec::new(),
            final_macros: None,
        }
    }

    fn contract() -> MacroContract {
        MacroContract {
            kcal: 2000.0,
            protein_g: 150.0,
            fat_g: 60.0,
            carb_g: 220.0,
            tolerances: Tolerances { kcal_pct: 0.03, protein_pct: 0.08, fat_pct: 0.08, carb_pct: 0.08, carb_floor_pct: 0.8 },
            hard_caps: HardCaps { protein_max: 280.0, fat_max: 105.0, carb_min: 176.0 },
        }
    }

    #[test]
    fn primal_solve_satisfies_a_feasible_contract() {
        let nutrition: HashMap<String, NutritionRow> = HashMap::from([
            ("chicken_breast".to_string(), row(165.0, 31.0, 3.6, 0.0)),
            ("rice".to_string(), row(130.0, 2.7, 0.3, 28.0)),
        ]);
        let mut meals = vec![
            meal("m1", vec![item("chicken_breast", 300.0), item("rice", 400.0)]),
            meal("m2", vec![item("chicken_breast", 200.0), item("rice", 300.0)]),
        ];
        let result = solve(&contract(), &mut meals, &nutrition, &SolverConfig::default());
        assert_ne!(result.method, SolveMethod::MinGFallback);
        assert!(meals.iter().all(|m| !m.solution.is_empty()));
    }

    #[test]
    fn scales_are_always_within_configured_bounds_after_apply() {
        let nutrition: HashMap<String, NutritionRow> = HashMap::from([("rice".to_string(), row(130.0, 2.7, 0.3, 28.0))]);
        let mut meals = vec![meal("m1", vec![item("rice", 500.0)])];
        let cfg = SolverConfig::default();
        let _ = solve(&contract(), &mut meals, &nutrition, &cfg);
        let grams = meals[0].solution[0].grams as f64;
        assert!(grams >= 500.0 * cfg.scale_min - 1.0);
        assert!(grams <= 500.0 * cfg.scale_max + 1.0);
    }

    #[test]
    fn single_carb_only_meal_never_silently_reports_infeasible_as_success() {
        // a contract impossible to satisfy with only a pure-carb source at bounded scale
        let nutrition: HashMap<String, NutritionRow> = HashMap::from([("rice".to_string(), row(130.0, 2.7, 0.3, 28.0))]);
        let mut meals = vec![meal("m1", vec![item("rice", 50.0)])];
        let impossible = MacroContract {
            kcal: 4000.0,
            protein_g: 300.0,
            fat_g: 150.0,
            carb_g: 500.0,
            tolerances: Tolerances { kcal_pct: 0.03, protein_pct: 0.08, fat_pct: 0.08, carb_pct: 0.08, carb_floor_pct: 0.8 },
            hard_caps: HardCaps { protein_max: 400.0, fat_max: 180.0, carb_min: 400.0 },
        };
        let result = solve(&impossible, &mut meals, &nutrition, &SolverConfig::default());
        assert_eq!(result.method, SolveMethod::MinGFallback);
        assert!(!result.feasible);
    }

    #[test]
    fn min_g_fallback_never_exceeds_declared_minimum() {
        let nutrition: HashMap<String, NutritionRow> = HashMap::from([("rice".to_string(), row(130.0, 2.7, 0.3, 28.0))]);
        let mut meals = vec![meal("m1", vec![item("rice", 50.0)])];
        revert_to_min_g(&mut meals, &nutrition);
        assert_eq!(meals[0].solution[0].grams as f64, (50.0 * 0.3).round());
    }
}
