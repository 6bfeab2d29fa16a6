// ABOUTME: USDA FoodData Central API client adapted as a NutritionProvider implementation
// ABOUTME: Search-then-detail two-step lookup; food_nutrients mapped to a per-100g NutritionRow

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! USDA `FoodData` Central API client.
//!
//! The free, keyless-optional USDA API offers per-100g nutrient amounts for
//! "Foundation" and "SR Legacy" data types directly, which is exactly the unit
//! [`NutritionRow`] needs; branded-food amounts are also reported per 100g by
//! the same endpoint, so no serving-size conversion is required here.
//!
//! # API Reference
//! USDA `FoodData` Central API: <https://fdc.nal.usda.gov/api-guide.html>

use super::NutritionProvider;
use crate::errors::{AppError, AppResult};
use crate::model::{NutritionRow, NutritionSource, NutritionState};
use async_trait::async_trait;
use serde::Deserialize;

/// USDA API client configuration.
#[derive(Debug, Clone)]
pub struct UsdaClientConfig {
    /// USDA API key (free from <https://fdc.nal.usda.gov/api-key-signup.html>).
    pub api_key: String,
    /// Base URL for the USDA API.
    pub base_url: String,
    /// Search page size (results per query).
    pub page_size: u32,
}

impl Default for UsdaClientConfig {
    fn default() -> Self {
        Self {
            api_key: "DEMO_KEY".to_string(),
            base_url: "https://api.nal.usda.gov/fdc/v1".to_string(),
            page_size: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
struct SearchFood {
    #[serde(rename = "fdcId")]
    fdc_id: u64,
    #[serde(rename = "foodNutrients", default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
struct SearchNutrient {
    #[serde(rename = "nutrientId")]
    nutrient_id: u32,
    value: Option<f64>,
}

const NUTRIENT_ID_ENERGY_KCAL: u32 = 1008;
const NUTRIENT_ID_PROTEIN: u32 = 1003;
const NUTRIENT_ID_FAT: u32 = 1004;
const NUTRIENT_ID_CARB: u32 = 1005;
const NUTRIENT_ID_FIBER: u32 = 1079;

fn row_from_nutrients(nutrients: &[SearchNutrient]) -> Option<NutritionRow> {
    let find = |id: u32| nutrients.iter().find(|n| n.nutrient_id == id).and_then(|n| n.value);
    let kcal_per_100g = find(NUTRIENT_ID_ENERGY_KCAL)?;
    let protein_per_100g = find(NUTRIENT_ID_PROTEIN).unwrap_or(0.0);
    let fat_per_100g = find(NUTRIENT_ID_FAT).unwrap_or(0.0);
    let carb_per_100g = find(NUTRIENT_ID_CARB).unwrap_or(0.0);
    let fiber_per_100g = find(NUTRIENT_ID_FIBER).unwrap_or(0.0);
    Some(NutritionRow {
        kcal_per_100g,
        protein_per_100g,
        fat_per_100g,
        carb_per_100g,
        fiber_per_100g,
        state: NutritionState::AsSold,
        yield_factor: None,
        density_g_per_ml: None,
        source: NutritionSource::ExternalQuery,
        confidence: 0.6,
    })
}

/// USDA `FoodData` Central client, the default external [`NutritionProvider`].
pub struct UsdaProvider {
    config: UsdaClientConfig,
    http: reqwest::Client,
}

impl UsdaProvider {
    /// Build a provider from `config`, using a client with the configured HTTP timeout.
    #[must_use]
    pub fn new(config: UsdaClientConfig, http_timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchFood>> {
        if query.trim().is_empty() {
            return Err(AppError::invalid_input("search query cannot be empty"));
        }
        let url = format!("{}/foods/search", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("pageSize", &self.config.page_size.to_string()),
                ("api_key", &self.config.api_key),
            ])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::upstream_transient("usda", "rate limited (429)"));
        }
        if !response.status().is_success() {
            return Err(AppError::upstream_permanent("usda", format!("HTTP {}", response.status())));
        }
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.foods)
    }
}

#[async_trait]
impl NutritionProvider for UsdaProvider {
    async fn by_barcode(&self, barcode: &str) -> AppResult<Option<NutritionRow>> {
        // USDA FDC has no public barcode endpoint; branded foods are searched
        // by GTIN/UPC as free text, which the search endpoint supports directly.
        self.by_query(barcode).await
    }

    async fn by_query(&self, query: &str) -> AppResult<Option<NutritionRow>> {
        let foods = self.search(query).await?;
        Ok(foods.iter().find_map(|food| row_from_nutrients(&food.food_nutrients)).map(|mut row| {
            row.source = NutritionSource::ExternalQuery;
            row
        }))
    }
}

/// A mock provider for tests: resolves a fixed set of queries without any I/O.
#[derive(Default)]
pub struct MockUsdaProvider {
    rows: std::collections::HashMap<String, NutritionRow>,
}

impl MockUsdaProvider {
    /// Construct a mock with a single canned `(query, row)` mapping.
    #[must_use]
    pub fn with_row(query: impl Into<String>, row: NutritionRow) -> Self {
        let mut rows = std::collections::HashMap::new();
        rows.insert(query.into(), row);
        Self { rows }
    }
}

#[async_trait]
impl NutritionProvider for MockUsdaProvider {
    async fn by_barcode(&self, barcode: &str) -> AppResult<Option<NutritionRow>> {
        Ok(self.rows.get(barcode).copied())
    }

    async fn by_query(&self, query: &str) -> AppResult<Option<NutritionRow>> {
        Ok(self.rows.get(query).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_from_nutrients_requires_energy() {
        let nutrients = vec![SearchNutrient { nutrient_id: NUTRIENT_ID_PROTEIN, value: Some(10.0) }];
        assert!(row_from_nutrients(&nutrients).is_none());
    }

    #[test]
    fn row_from_nutrients_defaults_missing_macros_to_zero() {
        let nutrients = vec![SearchNutrient { nutrient_id: NUTRIENT_ID_ENERGY_KCAL, value: Some(52.0) }];
        let row = row_from_nutrients(&nutrients).unwrap();
        assert!((row.kcal_per_100g - 52.0).abs() < f64::EPSILON);
        assert_eq!(row.protein_per_100g, 0.0);
    }

    #[tokio::test]
    async fn mock_provider_resolves_known_query_only() {
        let row = NutritionRow {
            kcal_per_100g: 165.0,
            protein_per_100g: 31.0,
            fat_per_100g: 3.6,
            carb_per_100g: 0.0,
            fiber_per_100g: 0.0,
            state: NutritionState::Cooked,
            yield_factor: None,
            density_g_per_ml: None,
            source: NutritionSource::ExternalQuery,
            confidence: 0.6,
        };
        let provider = MockUsdaProvider::with_row("chicken breast", row);
        assert!(provider.by_query("chicken breast").await.unwrap().is_some());
        assert!(provider.by_query("nothing").await.unwrap().is_none());
    }
}
