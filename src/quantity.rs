// ABOUTME: Quantity-to-grams conversion (C1): resolves a PlannedIngredient's qty_value/qty_unit into required_grams
// ABOUTME: Countable units (egg, slice, medium, large) resolve via a per-ingredient piece-weight table, not a fixed constant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Quantity Conversion (C1).
//!
//! `QtyUnit::G` and `QtyUnit::Ml` convert directly (`Ml` via a per-ingredient
//! density, since a milliliter of olive oil and a milliliter of milk are not
//! the same mass). The countable units (`Slice`, `Egg`, `Medium`, `Large`)
//! convert via a per-ingredient piece-weight looked up by normalized key, with
//! substring fallback the same way [`crate::normalizer::fuzzy_candidates`]
//! widens a lookup — an ingredient with no piece-weight entry for a countable
//! unit is a [`ConversionError`], never a guessed constant.

use crate::model::QtyUnit;
use crate::normalizer::normalize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Per-ingredient physical properties needed to turn a sketched quantity into grams.
#[derive(Debug, Clone, Copy)]
struct PieceProfile {
    /// Grams per milliliter, for `QtyUnit::Ml`. `None` means this ingredient is never sketched by volume.
    density_g_per_ml: Option<f64>,
    /// Grams per egg, for `QtyUnit::Egg`.
    grams_per_egg: Option<f64>,
    /// Grams per slice, for `QtyUnit::Slice`.
    grams_per_slice: Option<f64>,
    /// Grams per "medium"-sized piece, for `QtyUnit::Medium`.
    grams_per_medium: Option<f64>,
    /// Grams per "large"-sized piece, for `QtyUnit::Large`.
    grams_per_large: Option<f64>,
}

impl PieceProfile {
    const fn grams_for(self, unit: QtyUnit) -> Option<f64> {
        match unit {
            QtyUnit::G => None,
            QtyUnit::Ml => self.density_g_per_ml,
            QtyUnit::Slice => self.grams_per_slice,
            QtyUnit::Egg => self.grams_per_egg,
            QtyUnit::Medium => self.grams_per_medium,
            QtyUnit::Large => self.grams_per_large,
        }
    }
}

fn profiles() -> &'static HashMap<&'static str, PieceProfile> {
    static PROFILES: LazyLock<HashMap<&'static str, PieceProfile>> = LazyLock::new(|| {
        HashMap::from([
            (
                "olive_oil",
                PieceProfile { density_g_per_ml: Some(0.91), grams_per_egg: None, grams_per_slice: None, grams_per_medium: None, grams_per_large: None },
            ),
            (
                "honey",
                PieceProfile { density_g_per_ml: Some(1.42), grams_per_egg: None, grams_per_slice: None, grams_per_medium: None, grams_per_large: None },
            ),
            (
                "egg",
                PieceProfile { density_g_per_ml: None, grams_per_egg: Some(50.0), grams_per_slice: None, grams_per_medium: Some(50.0), grams_per_large: Some(56.0) },
            ),
            (
                "banana",
                PieceProfile { density_g_per_ml: None, grams_per_egg: None, grams_per_slice: None, grams_per_medium: Some(118.0), grams_per_large: Some(136.0) },
            ),
            (
                "greek_yogurt",
                PieceProfile { density_g_per_ml: Some(1.03), grams_per_egg: None, grams_per_slice: None, grams_per_medium: None, grams_per_large: None },
            ),
            (
                "bread",
                PieceProfile { density_g_per_ml: None, grams_per_egg: None, grams_per_slice: Some(28.0), grams_per_medium: None, grams_per_large: None },
            ),
        ])
    });
    &PROFILES
}

fn lookup_profile(normalized_key: &str) -> Option<PieceProfile> {
    profiles().get(normalized_key).copied().or_else(|| {
        profiles().iter().find(|(key, _)| normalized_key.contains(**key)).map(|(_, profile)| *profile)
    })
}

/// Why a quantity could not be converted to grams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// `qty_unit` was a countable or volumetric unit with no piece-weight entry for this ingredient.
    NoPieceWeight { normalized_key: String, unit: QtyUnit },
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPieceWeight { normalized_key, unit } => {
                write!(f, "no piece-weight entry for {normalized_key:?} under unit {unit:?}")
            }
        }
    }
}

/// Convert `qty_value` of `qty_unit` into grams, for an ingredient whose
/// normalized key is `display_name` run through [`normalize`].
///
/// # Errors
/// Returns [`ConversionError::NoPieceWeight`] if `qty_unit` requires a
/// per-ingredient profile this ingredient has no entry for.
pub fn to_grams(display_name: &str, qty_value: f64, qty_unit: QtyUnit) -> Result<f64, ConversionError> {
    if qty_unit == QtyUnit::G {
        return Ok(qty_value);
    }
    let normalized_key = normalize(display_name);
    let profile = lookup_profile(&normalized_key);
    match profile.and_then(|p| p.grams_for(qty_unit)) {
        Some(grams_per_unit) => Ok(qty_value * grams_per_unit),
        None => Err(ConversionError::NoPieceWeight { normalized_key, unit: qty_unit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grams_passes_through_unchanged() {
        assert_eq!(to_grams("chicken breast", 200.0, QtyUnit::G).unwrap(), 200.0);
    }

    #[test]
    fn milliliters_convert_via_density() {
        let grams = to_grams("olive oil", 15.0, QtyUnit::Ml).unwrap();
        assert!((grams - 13.65).abs() < 1e-9);
    }

    #[test]
    fn eggs_convert_via_piece_weight() {
        assert_eq!(to_grams("egg", 2.0, QtyUnit::Egg).unwrap(), 100.0);
    }

    #[test]
    fn medium_banana_uses_its_own_piece_weight_not_eggs() {
        assert_eq!(to_grams("banana", 1.0, QtyUnit::Medium).unwrap(), 118.0);
    }

    #[test]
    fn unknown_ingredient_under_countable_unit_is_an_error() {
        let err = to_grams("mystery food", 3.0, QtyUnit::Slice).unwrap_err();
        assert!(matches!(err, ConversionError::NoPieceWeight { .. }));
    }

    #[test]
    fn substring_fallback_matches_a_qualified_name() {
        let grams = to_grams("large free range egg", 1.0, QtyUnit::Large).unwrap();
        assert_eq!(grams, 56.0);
    }
}
