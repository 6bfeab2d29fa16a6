// ABOUTME: Canonical nutrition store (C4): the in-scope consumer of an out-of-scope build-time ETL
// ABOUTME: Honors the ETL's ingestion gate (kcal-balance + mass-balance) even though it doesn't run the ETL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Canonical Nutrition Store (C4).
//!
//! The build-time ETL that parses raw nutrition data files into this store is
//! out of scope; this module is in-scope to *honor its output contract*: an
//! immutable `normalized_key -> NutritionRow` mapping, ingested subject to a
//! gate that rejects any row violating the kcal-balance rule or whose
//! `p + f + c > 105 g/100g` (P2). Duplicate keys are resolved first-writer-wins,
//! with the losing rows reported as a collision list.

use crate::config::NutritionConfig;
use crate::model::NutritionRow;
use std::collections::HashMap;

/// A candidate row as it would arrive from the build-time ETL, before the
/// ingestion gate runs.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    /// Normalized lookup key.
    pub key: String,
    /// The row itself.
    pub row: NutritionRow,
}

/// A rejected duplicate, retained for diagnostics.
#[derive(Debug, Clone)]
pub struct Collision {
    /// The key that collided.
    pub key: String,
    /// Why the later writer lost (always "duplicate key, first-writer-wins"
    /// unless the later row also failed the ingestion gate).
    pub reason: String,
}

/// The canonical nutrition store: immutable after construction.
#[derive(Debug, Clone)]
pub struct CanonicalStore {
    rows: HashMap<String, NutritionRow>,
    /// Rows rejected by the ingestion gate (kcal/mass balance failures).
    pub rejected: Vec<(String, String)>,
    /// Duplicate-key collisions, first-writer-wins.
    pub collisions: Vec<Collision>,
}

impl CanonicalStore {
    /// Ingest a batch of candidate rows, applying the ingestion gate and
    /// first-writer-wins duplicate resolution.
    #[must_use]
    pub fn ingest(candidates: Vec<CandidateRow>, config: &NutritionConfig) -> Self {
        let mut rows = HashMap::new();
        let mut rejected = Vec::new();
        let mut collisions = Vec::new();

        for candidate in candidates {
            let macro_mass =
                candidate.row.protein_per_100g + candidate.row.fat_per_100g + candidate.row.carb_per_100g;
            if macro_mass > config.max_macro_mass_per_100g {
                rejected.push((
                    candidate.key,
                    format!("p+f+c = {macro_mass:.1} exceeds {} g/100g", config.max_macro_mass_per_100g),
                ));
                continue;
            }
            let balance_error = crate::model::Macros {
                kcal: candidate.row.kcal_per_100g,
                protein_g: candidate.row.protein_per_100g,
                fat_g: candidate.row.fat_per_100g,
                carb_g: candidate.row.carb_per_100g,
            }
            .kcal_balance_error();
            if balance_error > config.kcal_balance_tolerance_pct {
                rejected.push((candidate.key, format!("kcal balance error {balance_error:.3} exceeds tolerance")));
                continue;
            }

            if rows.contains_key(&candidate.key) {
                collisions.push(Collision {
                    key: candidate.key,
                    reason: "duplicate key, first-writer-wins".to_string(),
                });
                continue;
            }
            rows.insert(candidate.key, candidate.row);
        }

        Self { rows, rejected, collisions }
    }

    /// Build an empty store (used when no ETL output is available, e.g. tests).
    #[must_use]
    pub fn empty() -> Self {
        Self { rows: HashMap::new(), rejected: Vec::new(), collisions: Vec::new() }
    }

    /// Look up a normalized key.
    #[must_use]
    pub fn lookup(&self, normalized_key: &str) -> Option<NutritionRow> {
        self.rows.get(normalized_key).copied()
    }

    /// Number of rows that survived ingestion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NutritionSource, NutritionState};

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
            source: NutritionSource::CanonicalStore,
            confidence: 0.8,
        }
    }

    #[test]
    fn rejects_mass_balance_violation() {
        // P2: p + f + c <= 105 g / 100 g
        let config = NutritionConfig::default();
        let candidates = vec![CandidateRow { key: "weird".into(), row: row(100.0, 50.0, 50.0, 50.0) }];
        let store = CanonicalStore::ingest(candidates, &config);
        assert!(store.is_empty());
        assert_eq!(store.rejected.len(), 1);
    }

    #[test]
    fn first_writer_wins_on_duplicate_keys() {
        let config = NutritionConfig::default();
        let candidates = vec![
            CandidateRow { key: "chicken".into(), row: row(165.0, 31.0, 3.6, 0.0) },
            CandidateRow { key: "chicken".into(), row: row(200.0, 40.0, 5.0, 0.0) },
        ];
        let store = CanonicalStore::ingest(candidates, &config);
        assert_eq!(store.len(), 1);
        assert_eq!(store.collisions.len(), 1);
        assert!((store.lookup("chicken").unwrap().kcal_per_100g - 165.0).abs() < f64::EPSILON);
    }
}
