// ABOUTME: Canonical ingredient registry (CID) and query-ladder construction (C2)
// ABOUTME: Static mapping cid -> IngredientSpec with deterministic SKU-search query derivation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Canonical Registry (C2).
//!
//! A curated, static `cid -> IngredientSpec` table. Ingredients are mapped to a
//! CID by substring heuristics only — never guessed by the LLM collaborator,
//! and never left unassigned silently: an item nothing matches surfaces as a
//! `NO_CID` failure for the caller to decide how to handle.

use crate::model::Macros;
use std::collections::HashMap;
use std::sync::LazyLock;

/// A curated ingredient specification: the registry's static entry type.
#[derive(Debug, Clone)]
pub struct IngredientSpec {
    /// Canonical ingredient descriptor.
    pub cid: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// Broad category (used by the validator's category gate).
    pub category: &'static str,
    /// Store categories this ingredient is typically listed under.
    pub allowed_store_categories: &'static [&'static str],
    /// Core search terms, most to least specific; query-ladder rungs are built
    /// by truncating this list.
    pub core_terms: &'static [&'static str],
    /// Terms a candidate's title must contain at least one of.
    pub must_include: &'static [&'static str],
    /// Terms that disqualify a candidate outright if present in the title.
    pub must_exclude: &'static [&'static str],
    /// Expected per-100g macro fingerprint, used by C5's fingerprint gate.
    pub expected_macros_per_100g: Macros,
    /// Typical pack sizes in grams/ml, used for size-sanity checks.
    pub typical_pack_sizes: &'static [f64],
    /// Whether this CID is a produce item (bypasses the size-sanity check).
    pub is_produce: bool,
    /// Whether this CID is a pantry staple (wider size-sanity upper bound).
    pub is_pantry: bool,
    /// Whether the validator's category gate must hard-reject a candidate with
    /// a missing or mismatched store category, rather than only soft-checking
    /// it when present. Used for CIDs easily confused with a non-food listing
    /// under the same search terms (e.g. an oil spray, a condiment, a bakery item).
    pub requires_category_match: bool,
}

/// The result of mapping one free-form name to a CID.
#[derive(Debug, Clone)]
pub enum CidAssignment {
    /// A CID was found.
    Assigned { cid: &'static str, grams_used: f64 },
    /// No CID matched; the caller must decide whether to drop or fail the item.
    NoCid { display_name: String, grams_used: f64 },
}

fn registry() -> &'static HashMap<&'static str, IngredientSpec> {
    static REGISTRY: LazyLock<HashMap<&'static str, IngredientSpec>> = LazyLock::new(build_registry);
    &REGISTRY
}

fn build_registry() -> HashMap<&'static str, IngredientSpec> {
    let entries = [
        IngredientSpec {
            cid: "chicken_breast",
            display_name: "Chicken Breast",
            category: "meat",
            allowed_store_categories: &["meat", "poultry", "fresh_meat"],
            core_terms: &["chicken", "breast", "boneless"],
            must_include: &["chicken"],
            must_exclude: &["nugget", "breaded", "sausage", "soup"],
            expected_macros_per_100g: Macros { kcal: 165.0, protein_g: 31.0, fat_g: 3.6, carb_g: 0.0 },
            typical_pack_sizes: &[450.0, 900.0, 1000.0],
            is_produce: false,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "white_rice",
            display_name: "White Rice",
            category: "grain",
            allowed_store_categories: &["rice", "grains", "pantry"],
            core_terms: &["white", "rice", "long_grain"],
            must_include: &["rice"],
            must_exclude: &["cake", "pudding", "cereal"],
            expected_macros_per_100g: Macros { kcal: 130.0, protein_g: 2.7, fat_g: 0.3, carb_g: 28.0 },
            typical_pack_sizes: &[1000.0, 2000.0, 5000.0],
            is_produce: false,
            is_pantry: true,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "rolled_oats",
            display_name: "Rolled Oats",
            category: "grain",
            allowed_store_categories: &["cereal", "breakfast", "pantry"],
            core_terms: &["rolled", "oats", "whole"],
            must_include: &["oat"],
            must_exclude: &["cookie", "bar", "granola"],
            expected_macros_per_100g: Macros { kcal: 389.0, protein_g: 16.9, fat_g: 6.9, carb_g: 66.3 },
            typical_pack_sizes: &[500.0, 1000.0],
            is_produce: false,
            is_pantry: true,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "egg",
            display_name: "Egg",
            category: "dairy_eggs",
            allowed_store_categories: &["eggs", "dairy"],
            core_terms: &["egg", "large", "dozen"],
            must_include: &["egg"],
            must_exclude: &["eggplant", "noodle", "substitute"],
            expected_macros_per_100g: Macros { kcal: 143.0, protein_g: 12.6, fat_g: 9.5, carb_g: 0.7 },
            typical_pack_sizes: &[600.0, 720.0],
            is_produce: false,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "banana",
            display_name: "Banana",
            category: "produce",
            allowed_store_categories: &["produce", "fruit"],
            core_terms: &["banana"],
            must_include: &["banana"],
            must_exclude: &["chip", "bread", "flavored"],
            expected_macros_per_100g: Macros { kcal: 89.0, protein_g: 1.1, fat_g: 0.3, carb_g: 22.8 },
            typical_pack_sizes: &[120.0, 1000.0],
            is_produce: true,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "olive_oil",
            display_name: "Olive Oil",
            category: "oil",
            allowed_store_categories: &["oil", "condiments", "pantry"],
            core_terms: &["olive", "oil", "extra_virgin"],
            must_include: &["olive"],
            must_exclude: &["soap", "lotion", "spray"],
            expected_macros_per_100g: Macros { kcal: 884.0, protein_g: 0.0, fat_g: 100.0, carb_g: 0.0 },
            typical_pack_sizes: &[500.0, 750.0, 1000.0],
            is_produce: false,
            is_pantry: true,
            // Listings under "oil" search terms commonly include non-food oil
            // sprays; a missing/mismatched store category must reject outright.
            requires_category_match: true,
        },
        IngredientSpec {
            cid: "greek_yogurt",
            display_name: "Greek Yogurt",
            category: "dairy_eggs",
            allowed_store_categories: &["yogurt", "dairy"],
            core_terms: &["greek", "yogurt", "plain"],
            must_include: &["yogurt", "yoghurt"],
            must_exclude: &["drink", "tube", "kids"],
            expected_macros_per_100g: Macros { kcal: 59.0, protein_g: 10.0, fat_g: 0.4, carb_g: 3.6 },
            typical_pack_sizes: &[450.0, 900.0],
            is_produce: false,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "broccoli",
            display_name: "Broccoli",
            category: "produce",
            allowed_store_categories: &["produce", "vegetables"],
            core_terms: &["broccoli", "fresh", "crown"],
            must_include: &["broccoli"],
            must_exclude: &["soup", "cheese_sauce"],
            expected_macros_per_100g: Macros { kcal: 34.0, protein_g: 2.8, fat_g: 0.4, carb_g: 6.6 },
            typical_pack_sizes: &[350.0, 500.0],
            is_produce: true,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "salmon_fillet",
            display_name: "Salmon Fillet",
            category: "fish",
            allowed_store_categories: &["seafood", "fish"],
            core_terms: &["salmon", "fillet", "fresh"],
            must_include: &["salmon"],
            must_exclude: &["canned", "smoked", "jerky"],
            expected_macros_per_100g: Macros { kcal: 208.0, protein_g: 20.4, fat_g: 13.4, carb_g: 0.0 },
            typical_pack_sizes: &[200.0, 400.0, 800.0],
            is_produce: false,
            is_pantry: false,
            requires_category_match: false,
        },
        IngredientSpec {
            cid: "honey",
            display_name: "Honey",
            category: "condiment",
            allowed_store_categories: &["honey", "condiments", "pantry"],
            core_terms: &["honey", "pure", "raw"],
            must_include: &["honey"],
            must_exclude: &["bun", "mustard", "bbq"],
            expected_macros_per_100g: Macros { kcal: 304.0, protein_g: 0.3, fat_g: 0.0, carb_g: 82.4 },
            typical_pack_sizes: &[340.0, 500.0],
            is_produce: false,
            is_pantry: true,
            requires_category_match: false,
        },
    ];
    entries.into_iter().map(|spec| (spec.cid, spec)).collect()
}

/// Look up a CID's static specification.
#[must_use]
pub fn lookup(cid: &str) -> Option<&'static IngredientSpec> {
    registry().get(cid)
}

/// All registered CIDs (for enumeration/testing).
#[must_use]
pub fn all_cids() -> Vec<&'static str> {
    registry().keys().copied().collect()
}

/// Map planned ingredient names (with grams used) to CIDs via substring
/// heuristics. Items that match nothing become [`CidAssignment::NoCid`] rather
/// than being guessed.
#[must_use]
pub fn map_ingredients_to_cid(items: &[(String, f64)]) -> Vec<CidAssignment> {
    items
        .iter()
        .map(|(name, grams_used)| {
            let key = crate::normalizer::normalize(name);
            for candidate in crate::normalizer::fuzzy_candidates(&key) {
                if let Some(spec) = registry()
                    .values()
                    .find(|spec| spec.cid == candidate || candidate.contains(spec.cid))
                {
                    return CidAssignment::Assigned { cid: spec.cid, grams_used: *grams_used };
                }
            }
            CidAssignment::NoCid { display_name: name.clone(), grams_used: *grams_used }
        })
        .collect()
}

/// One rung of the query ladder for a CID at a given store.
#[derive(Debug, Clone)]
pub struct LadderQuery {
    /// The rung (tight, normal, or wide).
    pub rung: QueryRung,
    /// The search query string.
    pub query: String,
}

/// Which rung of the query ladder a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRung {
    /// Store + full core terms.
    Tight,
    /// Store + first two core terms.
    Normal,
    /// Store + first core term.
    Wide,
}

/// Build the tight -> normal -> wide query ladder for a CID at `store`.
/// Queries are always derived deterministically here, never by the LLM.
#[must_use]
pub fn build_queries_for_cid(spec: &IngredientSpec, store: &str) -> Vec<LadderQuery> {
    let mut ladder = Vec::with_capacity(3);
    if !spec.core_terms.is_empty() {
        let tight = spec.core_terms.join(" ");
        ladder.push(LadderQuery { rung: QueryRung::Tight, query: format!("{store} {tight}") });
    }
    if spec.core_terms.len() >= 2 {
        let normal = spec.core_terms[..2].join(" ");
        ladder.push(LadderQuery { rung: QueryRung::Normal, query: format!("{store} {normal}") });
    }
    if let Some(first) = spec.core_terms.first() {
        ladder.push(LadderQuery { rung: QueryRung::Wide, query: format!("{store} {first}") });
    }
    ladder
}

/// The per-100g macro fingerprint used by C5 to accept/reject external
/// nutrition data for this CID.
#[must_use]
pub const fn expected_fingerprint(spec: &IngredientSpec) -> Macros {
    spec.expected_macros_per_100g
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_cid() {
        assert!(lookup("chicken_breast").is_some());
        assert!(lookup("not_a_real_cid").is_none());
    }

    #[test]
    fn map_ingredients_surfaces_no_cid_for_unknowns() {
        let items = vec![("Chicken Breast".to_string(), 200.0), ("Unobtainium Dust".to_string(), 5.0)];
        let result = map_ingredients_to_cid(&items);
        assert!(matches!(result[0], CidAssignment::Assigned { cid: "chicken_breast", .. }));
        assert!(matches!(result[1], CidAssignment::NoCid { .. }));
    }

    #[test]
    fn query_ladder_has_three_decreasing_rungs() {
        let spec = lookup("chicken_breast").unwrap();
        let ladder = build_queries_for_cid(spec, "S1");
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[0].rung, QueryRung::Tight);
        assert_eq!(ladder[2].rung, QueryRung::Wide);
        assert!(ladder[0].query.len() >= ladder[2].query.len());
    }

    #[test]
    fn zero_kcal_cid_does_not_panic_fingerprint_lookup() {
        // A hypothetical zero-calorie spice CID must not be divided by in the
        // fingerprint gate; expected_fingerprint itself never divides.
        let m = Macros { kcal: 0.0, protein_g: 0.0, fat_g: 0.0, carb_g: 0.0 };
        assert_eq!(m.kcal, 0.0);
    }
}
