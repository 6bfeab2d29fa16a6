// ABOUTME: Typed contract for the model-supplied meal sketch (C12 step 2) and its referential-integrity validation
// ABOUTME: The orchestrator's only contract with the LLM collaborator is this parsed, validated schema
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Meal Sketch Contract.
//!
//! The raw JSON a model collaborator returns is parsed into [`RawMealSketch`]
//! then validated into [`DayPlan`]s via [`validate_sketch`]. Every
//! optional/nullable chain is modeled as explicit stepwise extraction: a
//! missing field at any level yields [`AppError::blueprint_invalid`] with a
//! precise dotted path, never a panic or a silently substituted default.

use crate::errors::{AppError, AppResult};
use crate::model::{DayPlan, Macros, Meal, MealType, MethodHint, PlannedIngredient, QtyUnit, StateHint, Tolerances};
use serde::Deserialize;

/// Raw wire shape of one sketched ingredient, as returned by the model collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIngredient {
    /// Free-form display name.
    pub name: String,
    /// Quantity value.
    pub qty_value: f64,
    /// Quantity unit, as a loose string (validated against [`QtyUnit`] below).
    pub qty_unit: String,
    /// Preparation state hint, if the model supplied one.
    #[serde(default)]
    pub state_hint: Option<String>,
    /// Cooking method hint, if the model supplied one.
    #[serde(default)]
    pub method_hint: Option<String>,
    /// Canonical ingredient descriptor, if the model already resolved one
    /// (still re-validated for referential integrity downstream).
    #[serde(default)]
    pub cid: Option<String>,
}

/// Raw wire shape of one sketched meal.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeal {
    /// Meal identifier, as supplied by the model.
    pub meal_id: String,
    /// Meal type, as a loose string.
    #[serde(rename = "type")]
    pub meal_type: String,
    /// Human-readable title.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ingredients for this meal.
    pub items: Vec<RawIngredient>,
}

/// Raw wire shape of the full model-supplied meal sketch for one day.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMealSketch {
    /// Day number, 1-indexed.
    pub day: u32,
    /// Every meal sketched for this day.
    pub meals: Vec<RawMeal>,
}

fn parse_qty_unit(raw: &str, path: &str) -> AppResult<QtyUnit> {
    match raw {
        "g" | "grams" => Ok(QtyUnit::G),
        "ml" | "milliliters" => Ok(QtyUnit::Ml),
        "slice" => Ok(QtyUnit::Slice),
        "egg" => Ok(QtyUnit::Egg),
        "medium" => Ok(QtyUnit::Medium),
        "large" => Ok(QtyUnit::Large),
        other => Err(AppError::blueprint_invalid(format!("{path}: unrecognized qty_unit {other:?}"))),
    }
}

fn parse_state_hint(raw: &str, path: &str) -> AppResult<StateHint> {
    match raw {
        "dry" => Ok(StateHint::Dry),
        "raw" => Ok(StateHint::Raw),
        "cooked" => Ok(StateHint::Cooked),
        "as_pack" => Ok(StateHint::AsPack),
        other => Err(AppError::blueprint_invalid(format!("{path}: unrecognized state_hint {other:?}"))),
    }
}

fn parse_method_hint(raw: &str, path: &str) -> AppResult<MethodHint> {
    match raw {
        "boiled" => Ok(MethodHint::Boiled),
        "pan_fried" => Ok(MethodHint::PanFried),
        "grilled" => Ok(MethodHint::Grilled),
        "baked" => Ok(MethodHint::Baked),
        "steamed" => Ok(MethodHint::Steamed),
        other => Err(AppError::blueprint_invalid(format!("{path}: unrecognized method_hint {other:?}"))),
    }
}

fn parse_meal_type(raw: &str, path: &str) -> AppResult<MealType> {
    match raw.to_uppercase().as_str() {
        "B" => Ok(MealType::B),
        "L" => Ok(MealType::L),
        "D" => Ok(MealType::D),
        "S1" => Ok(MealType::S1),
        "S2" => Ok(MealType::S2),
        other => Err(AppError::blueprint_invalid(format!("{path}: unrecognized meal type {other:?}"))),
    }
}

fn validate_ingredient(raw: &RawIngredient, path: &str) -> AppResult<PlannedIngredient> {
    if raw.name.trim().is_empty() {
        return Err(AppError::blueprint_invalid(format!("{path}.name: empty")));
    }
    if raw.qty_value <= 0.0 {
        return Err(AppError::blueprint_invalid(format!("{path}.qty_value: must be positive, got {}", raw.qty_value)));
    }
    let qty_unit = parse_qty_unit(&raw.qty_unit, &format!("{path}.qty_unit"))?;
    let state_hint = raw.state_hint.as_deref().map(|s| parse_state_hint(s, &format!("{path}.state_hint"))).transpose()?;
    let method_hint = raw.method_hint.as_deref().map(|s| parse_method_hint(s, &format!("{path}.method_hint"))).transpose()?;

    Ok(PlannedIngredient {
        display_name: raw.name.clone(),
        qty_value: raw.qty_value,
        qty_unit,
        state_hint,
        method_hint,
        cid: raw.cid.clone(),
        normalized_key: None,
        required_grams: None,
        min_g: None,
        max_g: None,
    })
}

fn validate_meal(raw: &RawMeal, path: &str) -> AppResult<Meal> {
    if raw.meal_id.trim().is_empty() {
        return Err(AppError::blueprint_invalid(format!("{path}.meal_id: empty")));
    }
    let meal_type = parse_meal_type(&raw.meal_type, &format!("{path}.type"))?;
    if raw.items.is_empty() {
        return Err(AppError::blueprint_invalid(format!("{path}.items: empty")));
    }
    let items = raw
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| validate_ingredient(item, &format!("{path}.items[{idx}]")))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Meal {
        meal_id: raw.meal_id.clone(),
        meal_type,
        title: raw.title.clone(),
        description: raw.description.clone(),
        targets: Macros::default(),
        tolerances: Tolerances { kcal_pct: 0.0, protein_pct: 0.0, fat_pct: 0.0, carb_pct: 0.0, carb_floor_pct: 0.0 },
        items,
        solution: Vec::new(),
        final_macros: None,
    })
}

/// Validate a raw model-supplied sketch into a [`DayPlan`], checking every
/// optional chain explicitly and the empty-ingredient-list edge case.
///
/// Referential integrity against the canonical registry (every `cid` that is
/// already populated must exist) is the caller's responsibility once C1/C2
/// have assigned CIDs to every item — this step only validates the sketch's
/// own internal structure.
pub fn validate_sketch(raw: &RawMealSketch) -> AppResult<DayPlan> {
    if raw.meals.is_empty() {
        return Err(AppError::blueprint_invalid("day.meals: empty"));
    }
    let meals = raw
        .meals
        .iter()
        .enumerate()
        .map(|(idx, meal)| validate_meal(meal, &format!("day[{}].meals[{idx}]", raw.day)))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(DayPlan { day: raw.day, meals })
}

/// Check referential integrity: every [`PlannedIngredient::cid`] already
/// assigned (by C1/C2) must exist in the canonical registry.
///
/// # Errors
/// Returns `BLUEPRINT_INVALID` naming the first dangling CID found.
pub fn check_referential_integrity(day: &DayPlan) -> AppResult<()> {
    for meal in &day.meals {
        for item in &meal.items {
            if let Some(cid) = item.cid.as_deref() {
                if crate::registry::lookup(cid).is_none() {
                    return Err(AppError::blueprint_invalid(format!(
                        "meal {} references unknown cid {cid:?}",
                        meal.meal_id
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_ingredient() -> RawIngredient {
        RawIngredient { name: "Chicken Breast".to_string(), qty_value: 200.0, qty_unit: "g".to_string(), state_hint: None, method_hint: None, cid: None }
    }

    #[test]
    fn empty_meals_is_blueprint_invalid() {
        let sketch = RawMealSketch { day: 1, meals: vec![] };
        let err = validate_sketch(&sketch).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::BlueprintInvalid);
    }

    #[test]
    fn empty_items_is_blueprint_invalid() {
        let sketch = RawMealSketch {
            day: 1,
            meals: vec![RawMeal { meal_id: "m1".to_string(), meal_type: "B".to_string(), title: "Breakfast".to_string(), description: None, items: vec![] }],
        };
        let err = validate_sketch(&sketch).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::BlueprintInvalid);
    }

    #[test]
    fn unrecognized_qty_unit_names_its_path() {
        let mut item = raw_ingredient();
        item.qty_unit = "cups".to_string();
        let sketch = RawMealSketch {
            day: 1,
            meals: vec![RawMeal { meal_id: "m1".to_string(), meal_type: "B".to_string(), title: "Breakfast".to_string(), description: None, items: vec![item] }],
        };
        let err = validate_sketch(&sketch).unwrap_err();
        assert!(err.message.contains("qty_unit"));
    }

    #[test]
    fn valid_sketch_round_trips_into_a_day_plan() {
        let sketch = RawMealSketch {
            day: 2,
            meals: vec![RawMeal { meal_id: "m1".to_string(), meal_type: "l".to_string(), title: "Lunch".to_string(), description: None, items: vec![raw_ingredient()] }],
        };
        let day = validate_sketch(&sketch).unwrap();
        assert_eq!(day.day, 2);
        assert_eq!(day.meals[0].meal_type, MealType::L);
    }

    #[test]
    fn dangling_cid_fails_referential_integrity() {
        let mut item = raw_ingredient();
        item.cid = Some("not_a_real_cid".to_string());
        let sketch = RawMealSketch {
            day: 1,
            meals: vec![RawMeal { meal_id: "m1".to_string(), meal_type: "B".to_string(), title: "Breakfast".to_string(), description: None, items: vec![item] }],
        };
        let day = validate_sketch(&sketch).unwrap();
        assert!(check_referential_integrity(&day).is_err());
    }
}
