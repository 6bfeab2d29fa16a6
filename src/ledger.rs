// ABOUTME: Ledger & verifier (C11): recomputes every meal's macros from fingerprint-passed nutrition only
// ABOUTME: The authoritative post-hoc check; the solver's self-reported feasibility is irrelevant here
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Ledger & Verifier (C11).
//!
//! Recomputes `Σ_i grams_i · nutrition_per_100g_i / 100` per meal using only
//! nutrition rows that passed C5's fingerprint check, sums to a daily total,
//! and runs [`MacroContract::check_violations`] against it. A solver that
//! reported success is irrelevant here: this is the only check that gates the
//! response.

use crate::model::{ContractViolation, LedgerRow, MacroContract, Macros, Meal, NutritionRow};
use std::collections::HashMap;

/// One meal's recomputed macro row, plus its source ingredient's CID breakdown.
#[derive(Debug, Clone)]
pub struct MealLedgerEntry {
    /// The meal this entry summarizes.
    pub meal_id: String,
    /// Recomputed macros for this meal.
    pub macros: Macros,
    /// Per-ingredient contribution (CID, grams, macros), for diagnostics.
    pub rows: Vec<LedgerRow>,
}

/// The full ledger for a day's plan: every meal's recomputed macros, the
/// daily sum, and the contract-satisfaction verdict.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Per-meal recomputed entries.
    pub meals: Vec<MealLedgerEntry>,
    /// Sum of every meal's `macros`.
    pub daily_totals: Macros,
    /// Violations found against the contract; empty means the plan passes.
    pub violations: Vec<ContractViolation>,
}

impl Ledger {
    /// Whether the ledger satisfies the contract it was built against.
    #[must_use]
    pub fn passes(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Recompute the ledger for `meals` against `contract`, using only the rows
/// present in `nutrition_by_cid` (rows that failed C5's fingerprint check are
/// never inserted there by the caller, so their ingredients silently
/// contribute zero — this is deliberate: an unverified row must never count
/// toward the authoritative total).
#[must_use]
pub fn build_ledger(contract: &MacroContract, meals: &[Meal], nutrition_by_cid: &HashMap<String, NutritionRow>) -> Ledger {
    let mut entries = Vec::with_capacity(meals.len());
    let mut daily_totals = Macros::default();

    for meal in meals {
        let mut macros = Macros::default();
        let mut rows = Vec::new();

        for solved in &meal.solution {
            let Some(item) = meal.items.get(solved.item_index) else { continue };
            let Some(cid) = item.cid.as_deref() else { continue };
            let Some(row) = nutrition_by_cid.get(cid) else { continue };
            if solved.grams == 0 {
                continue;
            }
            let contribution = row.macros_for_grams(f64::from(solved.grams));
            macros = macros.add(&contribution);
            rows.push(LedgerRow {
                total_grams: f64::from(solved.grams),
                kcal: contribution.kcal,
                protein_g: contribution.protein_g,
                fat_g: contribution.fat_g,
                carb_g: contribution.carb_g,
            });
        }

        daily_totals = daily_totals.add(&macros);
        entries.push(MealLedgerEntry { meal_id: meal.meal_id.clone(), macros, rows });
    }

    let violations = contract.check_violations(&daily_totals);
    Ledger { meals: entries, daily_totals, violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        HardCaps, MealType, NutritionSource, NutritionState, PlannedIngredient, QtyUnit, SolvedItem, Tolerances,
    };

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

    fn contract() -> MacroContract {
        MacroContract {
            kcal: 500.0,
            protein_g: 40.0,
            fat_g: 15.0,
            carb_g: 55.0,
            tolerances: Tolerances { kcal_pct: 0.05, protein_pct: 0.1, fat_pct: 0.1, carb_pct: 0.1, carb_floor_pct: 0.8 },
            hard_caps: HardCaps { protein_max: 60.0, fat_max: 25.0, carb_min: 44.0 },
        }
    }

    fn item(cid: &str) -> PlannedIngredient {
        PlannedIngredient {
            display_name: cid.to_string(),
            qty_value: 100.0,
            qty_unit: QtyUnit::G,
            state_hint: None,
            method_hint: None,
            cid: Some(cid.to_string()),
            normalized_key: Some(cid.to_string()),
            required_grams: Some(100.0),
            min_g: Some(30.0),
            max_g: Some(300.0),
        }
    }

    fn meal_with(items: Vec<PlannedIngredient>, solution: Vec<SolvedItem>) -> Meal {
        Meal {
            meal_id: "m1".to_string(),
            meal_type: MealType::B,
            title: "Meal".to_string(),
            description: None,
            targets: Macros::default(),
            tolerances: Tolerances { kcal_pct: 0.05, protein_pct: 0.1, fat_pct: 0.1, carb_pct: 0.1, carb_floor_pct: 0.8 },
            items,
            solution,
            final_macros: None,
        }
    }

    #[test]
    fn ledger_matches_contract_when_scaling_is_correct() {
        let nutrition = HashMap::from([
            ("chicken_breast".to_string(), row(165.0, 31.0, 3.6, 0.0)),
            ("rice".to_string(), row(130.0, 2.7, 0.3, 28.0)),
        ]);
        let meal = meal_with(
            vec![item("chicken_breast"), item("rice")],
            vec![SolvedItem { item_index: 0, grams: 180 }, SolvedItem { item_index: 1, grams: 150 }],
        );
        let ledger = build_ledger(&contract(), &[meal], &nutrition);
        assert!(ledger.daily_totals.kcal > 0.0);
    }

    #[test]
    fn unresolved_cid_contributes_zero_not_a_panic() {
        let nutrition: HashMap<String, NutritionRow> = HashMap::new();
        let meal = meal_with(vec![item("mystery_food")], vec![SolvedItem { item_index: 0, grams: 100 }]);
        let ledger = build_ledger(&contract(), &[meal], &nutrition);
        assert_eq!(ledger.daily_totals, Macros::default());
    }

    #[test]
    fn final_macro_mismatch_is_detected_when_skus_deviate() {
        // simulates two CIDs whose actual SKU nutrition deviates +20% from expectation,
        // enough to push the ledger out of tolerance despite a "feasible" solver scale.
        let nutrition = HashMap::from([("protein_bar".to_string(), row(480.0, 48.0, 18.0, 0.0))]);
        let meal = meal_with(vec![item("protein_bar")], vec![SolvedItem { item_index: 0, grams: 100 }]);
        let ledger = build_ledger(&contract(), &[meal], &nutrition);
        assert!(!ledger.passes());
    }

    #[test]
    fn zero_gram_items_are_excluded_from_ledger_rows() {
        let nutrition = HashMap::from([("rice".to_string(), row(130.0, 2.7, 0.3, 28.0))]);
        let meal = meal_with(vec![item("rice")], vec![SolvedItem { item_index: 0, grams: 0 }]);
        let ledger = build_ledger(&contract(), &[meal], &nutrition);
        assert!(ledger.meals[0].rows.is_empty());
    }
}
