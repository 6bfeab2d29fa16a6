// ABOUTME: Shared strongly-typed data model for the orchestration pipeline
// ABOUTME: Profile, MacroContract, ingredient/meal/plan types, SKU and ledger rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Data model.
//!
//! Every "maybe the field exists, maybe it's a number, maybe a string" ladder
//! from an ad-hoc source representation is replaced here by explicit sum
//! variants at the parse boundary — see [`crate::llm::meal_sketch`] for where
//! the model-supplied sketch is validated into these types.

use serde::{Deserialize, Serialize};

/// Biological sex as used by the Mifflin-St Jeor BMR formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

/// Self-reported activity level, mapped to a TDEE multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    /// Little to no exercise.
    Sedentary,
    /// Light exercise 1-3 days/week.
    Light,
    /// Moderate exercise 3-5 days/week.
    Moderate,
    /// Hard exercise 6-7 days/week.
    Active,
    /// Very hard exercise, physical job, or training twice a day.
    VeryActive,
}

impl ActivityLevel {
    /// TDEE multiplier applied to BMR.
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

/// Dietary goal, mapped to a kcal and macro-split adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Aggressive deficit.
    CutAggressive,
    /// Moderate deficit.
    CutModerate,
    /// Maintenance.
    Maintain,
    /// Lean surplus.
    BulkLean,
    /// Aggressive surplus.
    BulkAggressive,
}

impl Goal {
    /// Whether this goal uses the aggressive (vs. moderate) adjustment magnitude.
    #[must_use]
    pub const fn is_aggressive(self) -> bool {
        matches!(self, Self::CutAggressive | Self::BulkAggressive)
    }

    /// Sign of the kcal adjustment: -1 for a cut, 0 for maintenance, +1 for a bulk.
    #[must_use]
    pub const fn direction(self) -> f64 {
        match self {
            Self::CutAggressive | Self::CutModerate => -1.0,
            Self::Maintain => 0.0,
            Self::BulkLean | Self::BulkAggressive => 1.0,
        }
    }
}

/// Number of eating occasions per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EatingOccasions(u8);

impl EatingOccasions {
    /// Construct, validating against the allowed set `{3,4,5}`.
    ///
    /// # Errors
    /// Returns an error if `n` is not one of 3, 4, or 5.
    pub fn new(n: u8) -> Result<Self, crate::errors::AppError> {
        if matches!(n, 3 | 4 | 5) {
            Ok(Self(n))
        } else {
            Err(crate::errors::AppError::invalid_input(format!(
                "eating_occasions must be 3, 4, or 5, got {n}"
            )))
        }
    }

    /// The raw occasion count.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for EatingOccasions {
    type Error = crate::errors::AppError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EatingOccasions> for u8 {
    fn from(value: EatingOccasions) -> Self {
        value.0
    }
}

/// A user profile; read-only for the duration of a single orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Height in centimeters.
    pub height_cm: f64,
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Age in years.
    pub age: u32,
    /// Biological sex.
    pub sex: Sex,
    /// Self-reported activity level.
    pub activity: ActivityLevel,
    /// Dietary goal.
    pub goal: Goal,
    /// Free-form dietary constraint tags (e.g. "vegetarian", "no_dairy").
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    /// Free-form cuisine prompt forwarded to the LLM collaborator.
    #[serde(default)]
    pub cuisine_prompt: Option<String>,
    /// Number of days to plan, 1..=7.
    pub days: u32,
    /// Number of eating occasions per day.
    pub eating_occasions: EatingOccasions,
    /// Target supermarket.
    pub store: String,
    /// Additional stores to consider if `store` yields too few candidates.
    #[serde(default)]
    pub preferred_stores: Vec<String>,
}

impl Profile {
    /// Validate the profile's structural invariants (day range).
    ///
    /// # Errors
    /// Returns an error if `days` is outside `1..=7` or `store` is empty.
    pub fn validate(&self) -> Result<(), crate::errors::AppError> {
        if !(1..=7).contains(&self.days) {
            return Err(crate::errors::AppError::invalid_input(format!(
                "days must be in 1..=7, got {}",
                self.days
            )));
        }
        if self.store.trim().is_empty() {
            return Err(crate::errors::AppError::invalid_input("store is required"));
        }
        Ok(())
    }
}

/// A macro quadruple: kcal, protein, fat, carb grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Macros {
    /// Kilocalories.
    pub kcal: f64,
    /// Protein, grams.
    pub protein_g: f64,
    /// Fat, grams.
    pub fat_g: f64,
    /// Carbohydrate, grams.
    pub carb_g: f64,
}

impl Macros {
    /// Scale every component by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            kcal: self.kcal * factor,
            protein_g: self.protein_g * factor,
            fat_g: self.fat_g * factor,
            carb_g: self.carb_g * factor,
        }
    }

    /// Component-wise sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            kcal: self.kcal + other.kcal,
            protein_g: self.protein_g + other.protein_g,
            fat_g: self.fat_g + other.fat_g,
            carb_g: self.carb_g + other.carb_g,
        }
    }

    /// The Atwater-rule kcal implied by this row's macros (4p + 4c + 9f).
    #[must_use]
    pub fn implied_kcal(&self) -> f64 {
        4.0 * self.protein_g + 4.0 * self.carb_g + 9.0 * self.fat_g
    }

    /// Relative deviation between `self.kcal` and the Atwater-implied kcal.
    #[must_use]
    pub fn kcal_balance_error(&self) -> f64 {
        if self.kcal <= 0.0 {
            return 0.0;
        }
        (self.kcal - self.implied_kcal()).abs() / self.kcal
    }
}

/// Per-macro percentage tolerances for contract satisfaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Kcal tolerance as a fraction.
    pub kcal_pct: f64,
    /// Protein tolerance as a fraction.
    pub protein_pct: f64,
    /// Fat tolerance as a fraction.
    pub fat_pct: f64,
    /// Carb tolerance as a fraction.
    pub carb_pct: f64,
    /// Carb hard-floor percentage of target (distinct from `carb_pct`).
    pub carb_floor_pct: f64,
}

/// Hard macro caps that may never be exceeded regardless of tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardCaps {
    /// Maximum protein grams.
    pub protein_max: f64,
    /// Maximum fat grams.
    pub fat_max: f64,
    /// Minimum carb grams.
    pub carb_min: f64,
}

/// The daily macro contract derived from a [`Profile`] by C9.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroContract {
    /// Target daily kcal.
    pub kcal: f64,
    /// Target daily protein grams.
    pub protein_g: f64,
    /// Target daily fat grams.
    pub fat_g: f64,
    /// Target daily carb grams.
    pub carb_g: f64,
    /// Tolerances applied at verification time.
    pub tolerances: Tolerances,
    /// Hard caps applied at verification time.
    pub hard_caps: HardCaps,
}

impl MacroContract {
    /// The contract's targets as a [`Macros`] quadruple.
    #[must_use]
    pub const fn targets(&self) -> Macros {
        Macros {
            kcal: self.kcal,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
            carb_g: self.carb_g,
        }
    }

    /// Check `totals` against this contract's hard caps and percentage tolerances.
    /// Returns every violation found; an empty vec means `totals` satisfies the contract.
    /// Shared by C10's early-termination check and C11's authoritative ledger check.
    #[must_use]
    pub fn check_violations(&self, totals: &Macros) -> Vec<ContractViolation> {
        let mut violations = Vec::new();

        if totals.carb_g < self.hard_caps.carb_min {
            violations.push(ContractViolation::CarbsTooLow);
        }
        if totals.protein_g > self.hard_caps.protein_max {
            violations.push(ContractViolation::ProteinTooHigh);
        }
        if totals.fat_g > self.hard_caps.fat_max {
            violations.push(ContractViolation::FatTooHigh);
        }

        let targets = self.targets();
        if relative_gap(totals.kcal, targets.kcal) > self.tolerances.kcal_pct {
            violations.push(ContractViolation::KcalOutOfTolerance);
        }
        if relative_gap(totals.protein_g, targets.protein_g) > self.tolerances.protein_pct {
            violations.push(ContractViolation::ProteinOutOfTolerance);
        }
        if relative_gap(totals.fat_g, targets.fat_g) > self.tolerances.fat_pct {
            violations.push(ContractViolation::FatOutOfTolerance);
        }
        if relative_gap(totals.carb_g, targets.carb_g) > self.tolerances.carb_pct {
            violations.push(ContractViolation::CarbOutOfTolerance);
        }

        violations
    }

    /// Whether `totals` satisfies every hard cap and tolerance in this contract.
    #[must_use]
    pub fn is_satisfied_by(&self, totals: &Macros) -> bool {
        self.check_violations(totals).is_empty()
    }
}

fn relative_gap(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (actual - target).abs() / target
}

/// A single way a computed macro total can violate a [`MacroContract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractViolation {
    /// Hard cap: total carbs fell below `hard_caps.carb_min`.
    CarbsTooLow,
    /// Hard cap: total protein exceeded `hard_caps.protein_max`.
    ProteinTooHigh,
    /// Hard cap: total fat exceeded `hard_caps.fat_max`.
    FatTooHigh,
    /// Kcal total outside `tolerances.kcal_pct` of target.
    KcalOutOfTolerance,
    /// Protein total outside `tolerances.protein_pct` of target.
    ProteinOutOfTolerance,
    /// Fat total outside `tolerances.fat_pct` of target.
    FatOutOfTolerance,
    /// Carb total outside `tolerances.carb_pct` of target.
    CarbOutOfTolerance,
}

/// Physical unit a planned ingredient's quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QtyUnit {
    /// Grams.
    G,
    /// Milliliters.
    Ml,
    /// Slice (bread, cheese).
    Slice,
    /// Whole egg.
    Egg,
    /// A "medium"-sized piece (e.g. medium banana).
    Medium,
    /// A "large"-sized piece.
    Large,
}

/// Preparation state hint for an ingredient as sketched by the LLM collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateHint {
    /// Dry/uncooked (rice, oats, pasta).
    Dry,
    /// Raw, uncooked protein or produce.
    Raw,
    /// Cooked.
    Cooked,
    /// Consumed as purchased (e.g. a protein bar).
    AsPack,
}

/// Cooking method hint, used to pick yield factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodHint {
    /// Boiled.
    Boiled,
    /// Pan-fried.
    PanFried,
    /// Grilled.
    Grilled,
    /// Baked.
    Baked,
    /// Steamed.
    Steamed,
}

/// A single ingredient as sketched by the LLM collaborator, before resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedIngredient {
    /// Free-form display name from the sketch.
    pub display_name: String,
    /// Quantity value in `qty_unit` units.
    pub qty_value: f64,
    /// Unit the quantity is expressed in.
    pub qty_unit: QtyUnit,
    /// Preparation state hint.
    #[serde(default)]
    pub state_hint: Option<StateHint>,
    /// Cooking method hint.
    #[serde(default)]
    pub method_hint: Option<MethodHint>,
    /// Canonical ingredient descriptor, filled in by C1/C2 resolution.
    #[serde(default)]
    pub cid: Option<String>,
    /// Normalized lookup key, filled in by C1.
    #[serde(default)]
    pub normalized_key: Option<String>,
    /// Grams required after unit/density/yield conversion, filled in by C1.
    #[serde(default)]
    pub required_grams: Option<f64>,
    /// Minimum grams this item may be scaled down to by the solver.
    #[serde(default)]
    pub min_g: Option<f64>,
    /// Maximum grams this item may be scaled up to by the solver.
    #[serde(default)]
    pub max_g: Option<f64>,
}

/// The kind of eating occasion a [`Meal`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MealType {
    /// Breakfast.
    B,
    /// Lunch.
    L,
    /// Dinner.
    D,
    /// First snack.
    S1,
    /// Second snack.
    S2,
}

impl MealType {
    /// Whether this meal type is a snack (wider tolerance floor per the spec).
    #[must_use]
    pub const fn is_snack(self) -> bool {
        matches!(self, Self::S1 | Self::S2)
    }
}

/// A per-ingredient chosen grams, as emitted by the portion solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolvedItem {
    /// Index into the meal's `items` this solution applies to.
    pub item_index: usize,
    /// Final grams, rounded to the nearest integer.
    pub grams: u32,
}

/// A single eating occasion within a [`DayPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    /// Unique identifier within the day.
    pub meal_id: String,
    /// Meal type.
    #[serde(rename = "type")]
    pub meal_type: MealType,
    /// Human-readable title.
    pub title: String,
    /// Optional free-form description (never required for contract satisfaction).
    #[serde(default)]
    pub description: Option<String>,
    /// Per-meal macro targets, apportioned from the daily contract.
    pub targets: Macros,
    /// Per-meal tolerances (mains tolerance, or the snack-widened variant).
    pub tolerances: Tolerances,
    /// Planned ingredients before/after resolution.
    pub items: Vec<PlannedIngredient>,
    /// Solver output: grams per item, empty until C10 runs.
    #[serde(default)]
    pub solution: Vec<SolvedItem>,
    /// Macros recomputed from the final solution, filled in by C11.
    #[serde(default)]
    pub final_macros: Option<Macros>,
}

/// An ordered sequence of meals for one day, plus aggregate macros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    /// 1-indexed day number.
    pub day: u32,
    /// Meals for this day.
    pub meals: Vec<Meal>,
}

impl DayPlan {
    /// Sum of every meal's `final_macros`, if all are present.
    #[must_use]
    pub fn aggregate_final_macros(&self) -> Option<Macros> {
        let mut total = Macros::default();
        for meal in &self.meals {
            total = total.add(meal.final_macros.as_ref()?);
        }
        Some(total)
    }
}

/// Food preparation state recorded on a [`NutritionRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutritionState {
    /// Raw/uncooked.
    Raw,
    /// Dry (pre-cook weight).
    Dry,
    /// Cooked.
    Cooked,
    /// As sold/packaged.
    AsSold,
    /// Liquid (measured by volume natively).
    Liquid,
    /// Powder (e.g. protein powder).
    Powder,
}

/// Per-100g nutrition facts plus provenance, the unit produced by C3/C4/C5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionRow {
    /// Kcal per 100g.
    pub kcal_per_100g: f64,
    /// Protein grams per 100g.
    pub protein_per_100g: f64,
    /// Fat grams per 100g.
    pub fat_per_100g: f64,
    /// Carb grams per 100g.
    pub carb_per_100g: f64,
    /// Fiber grams per 100g.
    pub fiber_per_100g: f64,
    /// Preparation state this row was measured in.
    pub state: NutritionState,
    /// Dry-to-cooked yield multiplier, if applicable.
    pub yield_factor: Option<f64>,
    /// Grams per milliliter, if this ingredient is commonly measured by volume.
    pub density_g_per_ml: Option<f64>,
    /// Where this row came from (`"hot_path"`, `"canonical_store"`, a provider name).
    pub source: NutritionSource,
    /// Resolver confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Which tier of the resolver produced a [`NutritionRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutritionSource {
    /// C3 hot-path table.
    HotPath,
    /// C4 canonical store.
    CanonicalStore,
    /// External provider, resolved by barcode.
    ExternalBarcode,
    /// External provider, resolved by free-text query.
    ExternalQuery,
}

impl NutritionRow {
    /// Macro quadruple implied by `grams` of this row.
    #[must_use]
    pub fn macros_for_grams(&self, grams: f64) -> Macros {
        let factor = grams / 100.0;
        Macros {
            kcal: self.kcal_per_100g * factor,
            protein_g: self.protein_per_100g * factor,
            fat_g: self.fat_per_100g * factor,
            carb_g: self.carb_per_100g * factor,
        }
    }
}

/// A unit of pack size (grams or milliliters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackSize {
    /// Numeric size value.
    pub value: f64,
    /// Unit the value is expressed in.
    pub unit: SizeUnit,
}

/// Size unit for pack sizes and SKU candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Grams.
    G,
    /// Milliliters.
    Ml,
}

/// A concrete supermarket product candidate returned by the price client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuCandidate {
    /// Product title as listed.
    pub title: String,
    /// Brand, if known.
    #[serde(default)]
    pub brand: Option<String>,
    /// Store category/aisle label.
    #[serde(default)]
    pub category: Option<String>,
    /// Price in the store's currency.
    pub price: f64,
    /// Pack size.
    pub size: PackSize,
    /// Product URL, used as the dedup key across query-ladder rungs.
    pub url: String,
    /// Barcode/GTIN, if known.
    #[serde(default)]
    pub barcode: Option<String>,
    /// Price per 100g/100ml, derived at construction.
    pub unit_price_per_100: f64,
}

impl SkuCandidate {
    /// Build a candidate, deriving `unit_price_per_100` from `price` and `size`.
    #[must_use]
    pub fn new(
        title: String,
        brand: Option<String>,
        category: Option<String>,
        price: f64,
        size: PackSize,
        url: String,
        barcode: Option<String>,
    ) -> Self {
        let unit_price_per_100 = if size.value > 0.0 {
            price / size.value * 100.0
        } else {
            f64::INFINITY
        };
        Self {
            title,
            brand,
            category,
            price,
            size,
            url,
            barcode,
            unit_price_per_100,
        }
    }
}

/// The outcome of resolving one ingredient end-to-end (market run + nutrition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIngredient {
    /// Canonical ingredient descriptor.
    pub cid: String,
    /// Chosen SKU, if the market run succeeded.
    #[serde(default)]
    pub chosen_sku: Option<SkuCandidate>,
    /// Resolver confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Per-100g nutrition for the chosen SKU (or canonical fallback).
    #[serde(default)]
    pub nutrition_per_100g: Option<NutritionRow>,
    /// Debug bundle: every query tried, every attempt, every rejection reason.
    pub debug: ResolutionDebug,
}

/// Diagnostic detail retained for one ingredient's resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionDebug {
    /// Every query string issued across the ladder.
    pub queries: Vec<String>,
    /// Every rung attempted, with its outcome.
    pub attempts: Vec<String>,
    /// Rejected candidates and why.
    pub rejected: Vec<RejectedCandidate>,
}

/// A candidate that failed validation, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedCandidate {
    /// The candidate's title, for diagnostics.
    pub title: String,
    /// Why it was rejected.
    pub reason: String,
}

/// A single row of the authoritative post-hoc ledger (C11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Canonical ingredient descriptor (by name since CID is a `String` elsewhere,
    /// kept here as an index for additivity checks).
    pub total_grams: f64,
    /// Kcal contributed by this ingredient across the whole plan.
    pub kcal: f64,
    /// Protein grams contributed.
    pub protein_g: f64,
    /// Fat grams contributed.
    pub fat_g: f64,
    /// Carb grams contributed.
    pub carb_g: f64,
}

impl LedgerRow {
    /// Ledger rows are additive in grams: scaling grams by `alpha` scales every
    /// macro component by `alpha` too (P3, ledger linearity).
    #[must_use]
    pub fn scaled(&self, alpha: f64) -> Self {
        Self {
            total_grams: self.total_grams * alpha,
            kcal: self.kcal * alpha,
            protein_g: self.protein_g * alpha,
            fat_g: self.fat_g * alpha,
            carb_g: self.carb_g * alpha,
        }
    }

    /// This row's macros as a [`Macros`] quadruple.
    #[must_use]
    pub const fn as_macros(&self) -> Macros {
        Macros {
            kcal: self.kcal,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
            carb_g: self.carb_g,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eating_occasions_rejects_out_of_range() {
        assert!(EatingOccasions::new(3).is_ok());
        assert!(EatingOccasions::new(4).is_ok());
        assert!(EatingOccasions::new(5).is_ok());
        assert!(EatingOccasions::new(2).is_err());
        assert!(EatingOccasions::new(6).is_err());
    }

    #[test]
    fn macros_kcal_balance_error_zero_kcal_does_not_divide_by_zero() {
        let m = Macros { kcal: 0.0, protein_g: 0.0, fat_g: 0.0, carb_g: 0.0 };
        assert_eq!(m.kcal_balance_error(), 0.0);
    }

    #[test]
    fn macros_scaled_is_linear() {
        let m = Macros { kcal: 100.0, protein_g: 10.0, fat_g: 5.0, carb_g: 15.0 };
        let scaled = m.scaled(2.0);
        assert!((scaled.kcal - 200.0).abs() < f64::EPSILON);
        assert!((scaled.protein_g - 20.0).abs() < f64::EPSILON);
    }

    fn sample_contract() -> MacroContract {
        MacroContract {
            kcal: 3000.0,
            protein_g: 200.0,
            fat_g: 90.0,
            carb_g: 350.0,
            tolerances: Tolerances { kcal_pct: 0.03, protein_pct: 0.08, fat_pct: 0.08, carb_pct: 0.08, carb_floor_pct: 0.8 },
            hard_caps: HardCaps { protein_max: 224.0, fat_max: 135.0, carb_min: 280.0 },
        }
    }

    #[test]
    fn check_violations_empty_when_totals_match_targets() {
        let contract = sample_contract();
        assert!(contract.is_satisfied_by(&contract.targets()));
    }

    #[test]
    fn check_violations_flags_carb_hard_cap_before_tolerance() {
        let contract = sample_contract();
        let totals = Macros { kcal: 3000.0, protein_g: 200.0, fat_g: 90.0, carb_g: 200.0 };
        let violations = contract.check_violations(&totals);
        assert!(violations.contains(&ContractViolation::CarbsTooLow));
    }

    #[test]
    fn ledger_row_linearity() {
        let row = LedgerRow { total_grams: 100.0, kcal: 200.0, protein_g: 20.0, fat_g: 5.0, carb_g: 15.0 };
        let scaled = row.scaled(2.0);
        assert!((scaled.kcal - 400.0).abs() < 1e-9);
        assert!((scaled.total_grams - 200.0).abs() < 1e-9);
    }
}
