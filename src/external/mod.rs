// ABOUTME: External nutrition-provider trait and concrete USDA FoodData Central implementation
// ABOUTME: The pluggable "tier 3/4" collaborator consulted by the nutrition resolver (C5)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! External nutrition providers.
//!
//! An external provider is an unreliable collaborator: it may be slow, rate
//! limited, or simply wrong. The resolver (C5) treats every call through this
//! trait as cacheable and fingerprint-checked, never as ground truth on its own.

/// USDA `FoodData` Central API client, the shipped [`NutritionProvider`] impl.
pub mod usda_client;

pub use usda_client::{UsdaClientConfig, UsdaProvider};

use crate::errors::AppResult;
use crate::model::NutritionRow;
use async_trait::async_trait;

/// A source of per-100g nutrition data external to the hot-path table and
/// canonical store. Barcode lookups are exact; query lookups are best-effort
/// free-text search and return the first plausible match, if any.
#[async_trait]
pub trait NutritionProvider: Send + Sync {
    /// Resolve by an exact barcode/GTIN. `Ok(None)` means "not found", not an error.
    async fn by_barcode(&self, barcode: &str) -> AppResult<Option<NutritionRow>>;

    /// Resolve by free-text query, returning the most relevant match if any.
    async fn by_query(&self, query: &str) -> AppResult<Option<NutritionRow>>;
}
