// ABOUTME: Macro-contract builder (C9): profile -> BMR -> TDEE -> goal-adjusted kcal -> macro split
// ABOUTME: Produces the MacroContract every downstream phase (solver, ledger) treats as the source of truth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Macro-Contract Builder (C9).
//!
//! Mifflin-St Jeor BMR, activity-scaled TDEE, goal-adjusted kcal, then a
//! protein/fat/carb split with hard caps and a kcal floor. The split order is
//! fixed: protein first (by body weight), fat second (by body weight, capped
//! as a fraction of kcal), carb last (the residual).

use crate::config::ContractConfig;
use crate::model::{Goal, HardCaps, MacroContract, Macros, Profile, Sex, Tolerances};

const PROTEIN_KCAL_PER_G: f64 = 4.0;
const FAT_KCAL_PER_G: f64 = 9.0;
const CARB_KCAL_PER_G: f64 = 4.0;

fn mifflin_st_jeor(profile: &Profile) -> f64 {
    let base = 10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * f64::from(profile.age);
    match profile.sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    }
}

fn goal_adjustment(goal: Goal, config: &ContractConfig) -> f64 {
    let magnitude = if goal.is_aggressive() { config.aggressive_goal_adjustment } else { config.moderate_goal_adjustment };
    1.0 + goal.direction() * magnitude
}

/// Build the daily [`MacroContract`] for `profile`.
#[must_use]
pub fn build_contract(profile: &Profile, config: &ContractConfig) -> MacroContract {
    let bmr = mifflin_st_jeor(profile);
    let tdee = bmr * profile.activity.factor();
    let adjusted_kcal = (tdee * goal_adjustment(profile.goal, config)).max(config.kcal_floor);

    let protein_g = (profile.weight_kg * config.protein_construction_cap_g_per_kg).min(protein_target(profile, config));
    let protein_kcal = protein_g * PROTEIN_KCAL_PER_G;

    let fat_cap_kcal = adjusted_kcal * config.fat_cap_kcal_pct;
    let fat_g = (fat_cap_kcal / FAT_KCAL_PER_G).min(fat_target(profile, config, adjusted_kcal));
    let fat_kcal = fat_g * FAT_KCAL_PER_G;

    let carb_kcal = (adjusted_kcal - protein_kcal - fat_kcal).max(0.0);
    let carb_g = carb_kcal / CARB_KCAL_PER_G;

    let hard_caps = HardCaps {
        protein_max: profile.weight_kg * config.protein_cap_g_per_kg,
        fat_max: 1.5 * fat_g,
        carb_min: carb_g * config.carb_floor_pct,
    };

    let tolerances = Tolerances {
        kcal_pct: config.kcal_tolerance_pct,
        protein_pct: config.macro_tolerance_pct,
        fat_pct: config.macro_tolerance_pct,
        carb_pct: config.macro_tolerance_pct,
        carb_floor_pct: config.carb_floor_pct,
    };

    MacroContract { kcal: adjusted_kcal, protein_g, fat_g, carb_g, tolerances, hard_caps }
}

/// Soft protein target before the hard cap is applied: the floor, scaled up
/// moderately for cuts (muscle preservation) and bulks (synthesis support).
fn protein_target(profile: &Profile, config: &ContractConfig) -> f64 {
    let per_kg = match profile.goal {
        Goal::CutAggressive | Goal::CutModerate => config.protein_construction_cap_g_per_kg,
        Goal::Maintain => config.protein_floor_g_per_kg,
        Goal::BulkLean | Goal::BulkAggressive => {
            (config.protein_floor_g_per_kg + config.protein_construction_cap_g_per_kg) / 2.0
        }
    };
    profile.weight_kg * per_kg
}

/// Soft fat target before the kcal-percentage cap is applied.
fn fat_target(profile: &Profile, config: &ContractConfig, adjusted_kcal: f64) -> f64 {
    let floor_g = profile.weight_kg * config.fat_floor_g_per_kg;
    let floor_kcal_share = floor_g * FAT_KCAL_PER_G / adjusted_kcal;
    if floor_kcal_share >= config.fat_cap_kcal_pct { floor_g } else { (adjusted_kcal * config.fat_cap_kcal_pct) / FAT_KCAL_PER_G }
}

/// Per-meal targets and tolerances, apportioned evenly across `n` occasions,
/// with a widened tolerance for snack-type occasions per the orchestrator's
/// meal-assembly step (kept here since it's pure contract math, not a C10 concern).
#[must_use]
pub fn apportion_meal_targets(contract: &MacroContract, occasions: u8, is_snack: bool) -> (Macros, Tolerances) {
    let factor = 1.0 / f64::from(occasions.max(1));
    let targets = contract.targets().scaled(factor);
    let widen = if is_snack { 1.5 } else { 1.0 };
    let tolerances = Tolerances {
        kcal_pct: contract.tolerances.kcal_pct * widen,
        protein_pct: contract.tolerances.protein_pct * widen,
        fat_pct: contract.tolerances.fat_pct * widen,
        carb_pct: contract.tolerances.carb_pct * widen,
        carb_floor_pct: contract.tolerances.carb_floor_pct,
    };
    (targets, tolerances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityLevel, EatingOccasions};

    fn profile(goal: Goal) -> Profile {
        Profile {
            height_cm: 180.0,
            weight_kg: 80.0,
            age: 30,
            sex: Sex::Male,
            activity: ActivityLevel::Moderate,
            goal,
            dietary_tags: vec![],
            cuisine_prompt: None,
            days: 1,
            eating_occasions: EatingOccasions::new(4).unwrap(),
            store: "S1".to_string(),
            preferred_stores: vec![],
        }
    }

    #[test]
    fn moderate_cut_reduces_kcal_below_maintenance() {
        let config = ContractConfig::default();
        let maintain = build_contract(&profile(Goal::Maintain), &config);
        let cut = build_contract(&profile(Goal::CutModerate), &config);
        assert!(cut.kcal < maintain.kcal);
        assert!((maintain.kcal - cut.kcal) / maintain.kcal > 0.10);
    }

    #[test]
    fn protein_never_exceeds_hard_cap() {
        let config = ContractConfig::default();
        let contract = build_contract(&profile(Goal::BulkAggressive), &config);
        assert!(contract.protein_g <= contract.hard_caps.protein_max + 1e-9);
    }

    #[test]
    fn aggressive_cut_still_clamps_to_kcal_floor() {
        let mut config = ContractConfig::default();
        config.kcal_floor = 5000.0; // force the floor to bind regardless of TDEE
        let contract = build_contract(&profile(Goal::CutAggressive), &config);
        assert!((contract.kcal - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn meal_apportionment_sums_back_to_daily_targets() {
        let config = ContractConfig::default();
        let contract = build_contract(&profile(Goal::Maintain), &config);
        let (per_meal, _) = apportion_meal_targets(&contract, 4, false);
        let total = per_meal.scaled(4.0);
        assert!((total.kcal - contract.kcal).abs() < 1e-6);
    }

    #[test]
    fn snack_tolerance_is_widened() {
        let config = ContractConfig::default();
        let contract = build_contract(&profile(Goal::Maintain), &config);
        let (_, main_tol) = apportion_meal_targets(&contract, 4, false);
        let (_, snack_tol) = apportion_meal_targets(&contract, 4, true);
        assert!(snack_tol.protein_pct > main_tol.protein_pct);
    }
}
