// ABOUTME: Environment-overridable tunables for every phase of the orchestration pipeline
// ABOUTME: Externalizes the tolerance/weight constants the specification calls out as configuration, not baked-in
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::time::Duration;

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Tunables for the macro-contract builder (C9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractConfig {
    /// Daily kcal tolerance as a fraction (default 0.03 = ±3%).
    pub kcal_tolerance_pct: f64,
    /// Per-macro (protein/fat/carb) tolerance as a fraction (default 0.08 = ±8%).
    pub macro_tolerance_pct: f64,
    /// Hard protein ceiling in g/kg body weight, enforced on the verifier's `hard_caps.protein_max`.
    pub protein_cap_g_per_kg: f64,
    /// Protein ceiling in g/kg body weight used when constructing the soft target itself, distinct
    /// from and looser than `protein_cap_g_per_kg`.
    pub protein_construction_cap_g_per_kg: f64,
    /// Soft protein floor in g/kg body weight (logged, not enforced).
    pub protein_floor_g_per_kg: f64,
    /// Fat hard cap as a fraction of daily kcal.
    pub fat_cap_kcal_pct: f64,
    /// Soft fat floor in g/kg body weight (logged, not enforced).
    pub fat_floor_g_per_kg: f64,
    /// Carb hard floor as a fraction of the computed (residual) carb target.
    pub carb_floor_pct: f64,
    /// Minimum daily kcal, clamped regardless of TDEE/goal math.
    pub kcal_floor: f64,
    /// Aggressive goal adjustment magnitude (e.g. 0.25 for ±25%).
    pub aggressive_goal_adjustment: f64,
    /// Moderate goal adjustment magnitude (e.g. 0.15 for ±15%).
    pub moderate_goal_adjustment: f64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            kcal_tolerance_pct: 0.03,
            macro_tolerance_pct: 0.08,
            protein_cap_g_per_kg: 2.8,
            protein_construction_cap_g_per_kg: 3.0,
            protein_floor_g_per_kg: 1.6,
            fat_cap_kcal_pct: 0.35,
            fat_floor_g_per_kg: 0.8,
            carb_floor_pct: 0.8,
            kcal_floor: 1200.0,
            aggressive_goal_adjustment: 0.25,
            moderate_goal_adjustment: 0.15,
        }
    }
}

impl ContractConfig {
    /// Build from the process environment, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            kcal_tolerance_pct: env_f64("CONTRACT_KCAL_TOLERANCE_PCT", d.kcal_tolerance_pct),
            macro_tolerance_pct: env_f64("CONTRACT_MACRO_TOLERANCE_PCT", d.macro_tolerance_pct),
            protein_cap_g_per_kg: env_f64("CONTRACT_PROTEIN_CAP_G_PER_KG", d.protein_cap_g_per_kg),
            protein_construction_cap_g_per_kg: env_f64(
                "CONTRACT_PROTEIN_CONSTRUCTION_CAP_G_PER_KG",
                d.protein_construction_cap_g_per_kg,
            ),
            protein_floor_g_per_kg: env_f64(
                "CONTRACT_PROTEIN_FLOOR_G_PER_KG",
                d.protein_floor_g_per_kg,
            ),
            fat_cap_kcal_pct: env_f64("CONTRACT_FAT_CAP_KCAL_PCT", d.fat_cap_kcal_pct),
            fat_floor_g_per_kg: env_f64("CONTRACT_FAT_FLOOR_G_PER_KG", d.fat_floor_g_per_kg),
            carb_floor_pct: env_f64("CONTRACT_CARB_FLOOR_PCT", d.carb_floor_pct),
            kcal_floor: env_f64("CONTRACT_KCAL_FLOOR", d.kcal_floor),
            aggressive_goal_adjustment: env_f64(
                "CONTRACT_AGGRESSIVE_GOAL_ADJUSTMENT",
                d.aggressive_goal_adjustment,
            ),
            moderate_goal_adjustment: env_f64(
                "CONTRACT_MODERATE_GOAL_ADJUSTMENT",
                d.moderate_goal_adjustment,
            ),
        }
    }
}

/// Tunables for the portion solver (C10).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Per-macro loss weights, order (kcal, protein, fat, carb).
    pub weights: (f64, f64, f64, f64),
    /// Minimum per-meal scale.
    pub scale_min: f64,
    /// Maximum per-meal scale.
    pub scale_max: f64,
    /// Initial gradient-descent learning rate.
    pub learning_rate: f64,
    /// Maximum backtracking halvings per iteration.
    pub max_backtracks: u32,
    /// Step-size growth factor applied after an improving step.
    pub step_acceleration: f64,
    /// Iteration bound for the primary solver.
    pub max_iterations: u32,
    /// Iteration bound for the heuristic fallback.
    pub heuristic_max_iterations: u32,
    /// Heuristic per-meal bias clamp.
    pub heuristic_bias_clamp: (f64, f64),
    /// Heuristic global-scale clamp.
    pub heuristic_scale_clamp: (f64, f64),
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            weights: (1.0, 1.2, 1.2, 1.6),
            scale_min: 0.3,
            scale_max: 3.0,
            learning_rate: 0.02,
            max_backtracks: 6,
            step_acceleration: 1.1,
            max_iterations: 800,
            heuristic_max_iterations: 400,
            heuristic_bias_clamp: (0.6, 1.4),
            heuristic_scale_clamp: (0.7, 1.4),
        }
    }
}

impl SolverConfig {
    /// Build from the process environment, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            weights: (
                env_f64("SOLVER_WEIGHT_KCAL", d.weights.0),
                env_f64("SOLVER_WEIGHT_PROTEIN", d.weights.1),
                env_f64("SOLVER_WEIGHT_FAT", d.weights.2),
                env_f64("SOLVER_WEIGHT_CARB", d.weights.3),
            ),
            scale_min: env_f64("SOLVER_SCALE_MIN", d.scale_min),
            scale_max: env_f64("SOLVER_SCALE_MAX", d.scale_max),
            learning_rate: env_f64("SOLVER_LEARNING_RATE", d.learning_rate),
            max_backtracks: env_u32("SOLVER_MAX_BACKTRACKS", d.max_backtracks),
            step_acceleration: env_f64("SOLVER_STEP_ACCELERATION", d.step_acceleration),
            max_iterations: env_u32("SOLVER_MAX_ITERATIONS", d.max_iterations),
            heuristic_max_iterations: env_u32(
                "SOLVER_HEURISTIC_MAX_ITERATIONS",
                d.heuristic_max_iterations,
            ),
            heuristic_bias_clamp: d.heuristic_bias_clamp,
            heuristic_scale_clamp: d.heuristic_scale_clamp,
        }
    }
}

/// Tunables for the market-run subsystem (C8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketConfig {
    /// Concurrent market-run worker count.
    pub worker_count: usize,
    /// Concurrent nutrition-resolver worker count.
    pub nutrition_worker_count: usize,
    /// Price-outlier z-score threshold above which a candidate is dropped.
    pub outlier_z_threshold: f64,
    /// Lower size-sanity multiplier applied to a CID's typical pack target.
    pub size_sanity_lower: f64,
    /// Upper size-sanity multiplier for non-pantry CIDs.
    pub size_sanity_upper: f64,
    /// Upper size-sanity multiplier for pantry CIDs (wider, since pack sizes vary more).
    pub size_sanity_upper_pantry: f64,
    /// Score at/above which the tight rung's best candidate short-circuits the ladder.
    pub skip_heuristic_score: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            nutrition_worker_count: 5,
            outlier_z_threshold: 2.0,
            size_sanity_lower: 0.5,
            size_sanity_upper: 2.0,
            size_sanity_upper_pantry: 3.0,
            skip_heuristic_score: 1.0,
        }
    }
}

impl MarketConfig {
    /// Build from the process environment, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            worker_count: env_usize("MARKET_WORKER_COUNT", d.worker_count),
            nutrition_worker_count: env_usize(
                "NUTRITION_WORKER_COUNT",
                d.nutrition_worker_count,
            ),
            outlier_z_threshold: env_f64("MARKET_OUTLIER_Z_THRESHOLD", d.outlier_z_threshold),
            size_sanity_lower: env_f64("MARKET_SIZE_SANITY_LOWER", d.size_sanity_lower),
            size_sanity_upper: env_f64("MARKET_SIZE_SANITY_UPPER", d.size_sanity_upper),
            size_sanity_upper_pantry: env_f64(
                "MARKET_SIZE_SANITY_UPPER_PANTRY",
                d.size_sanity_upper_pantry,
            ),
            skip_heuristic_score: env_f64("MARKET_SKIP_HEURISTIC_SCORE", d.skip_heuristic_score),
        }
    }
}

/// Tunables for the token bucket and SWR caches (C6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Token-bucket capacity per store.
    pub bucket_capacity: f64,
    /// Refill rate, tokens per second.
    pub refill_per_sec: f64,
    /// Maximum time a caller will wait for a token before surfacing `rate_limited`.
    pub max_wait: Duration,
    /// Upstream HTTP timeout.
    pub http_timeout: Duration,
    /// Max retry attempts on transient upstream errors.
    pub max_retries: u32,
    /// Fixed delay before the single extra retry on a 429.
    pub retry_429_delay: Duration,
    /// Price-cache fresh window.
    pub price_fresh_ttl: Duration,
    /// Price-cache hard TTL (beyond this, a miss).
    pub price_hard_ttl: Duration,
    /// Nutrition-cache fresh window.
    pub nutrition_fresh_ttl: Duration,
    /// Nutrition-cache hard TTL.
    pub nutrition_hard_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: 10.0,
            refill_per_sec: 10.0,
            max_wait: Duration::from_millis(250),
            http_timeout: Duration::from_secs(8),
            max_retries: 3,
            retry_429_delay: Duration::from_millis(700),
            price_fresh_ttl: Duration::from_secs(3600),
            price_hard_ttl: Duration::from_secs(3 * 3600),
            nutrition_fresh_ttl: Duration::from_secs(24 * 3600),
            nutrition_hard_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl RateLimitConfig {
    /// Build from the process environment, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bucket_capacity: env_f64("RATE_LIMIT_BUCKET_CAPACITY", d.bucket_capacity),
            refill_per_sec: env_f64("RATE_LIMIT_REFILL_PER_SEC", d.refill_per_sec),
            max_wait: Duration::from_millis(env_u64(
                "RATE_LIMIT_MAX_WAIT_MS",
                d.max_wait.as_millis() as u64,
            )),
            http_timeout: Duration::from_secs(env_u64(
                "RATE_LIMIT_HTTP_TIMEOUT_SECS",
                d.http_timeout.as_secs(),
            )),
            max_retries: env_u32("RATE_LIMIT_MAX_RETRIES", d.max_retries),
            retry_429_delay: Duration::from_millis(env_u64(
                "RATE_LIMIT_RETRY_429_DELAY_MS",
                d.retry_429_delay.as_millis() as u64,
            )),
            price_fresh_ttl: Duration::from_secs(env_u64(
                "PRICE_CACHE_FRESH_TTL_SECS",
                d.price_fresh_ttl.as_secs(),
            )),
            price_hard_ttl: Duration::from_secs(env_u64(
                "PRICE_CACHE_HARD_TTL_SECS",
                d.price_hard_ttl.as_secs(),
            )),
            nutrition_fresh_ttl: Duration::from_secs(env_u64(
                "NUTRITION_CACHE_FRESH_TTL_SECS",
                d.nutrition_fresh_ttl.as_secs(),
            )),
            nutrition_hard_ttl: Duration::from_secs(env_u64(
                "NUTRITION_CACHE_HARD_TTL_SECS",
                d.nutrition_hard_ttl.as_secs(),
            )),
        }
    }
}

/// Tunables for nutrition validation (C3/C5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NutritionConfig {
    /// Per-macro (p/f/c) fingerprint tolerance as a fraction (default 0.25 = ±25%).
    pub fingerprint_macro_tolerance_pct: f64,
    /// Kcal fingerprint tolerance as a fraction (default 0.20 = ±20%).
    pub fingerprint_kcal_tolerance_pct: f64,
    /// Hot-path/canonical-store kcal-balance self-audit tolerance (default 0.05 = ±5%).
    pub kcal_balance_tolerance_pct: f64,
    /// Maximum `p+f+c` per 100g accepted into the canonical store (mass-balance gate).
    pub max_macro_mass_per_100g: f64,
}

impl Default for NutritionConfig {
    fn default() -> Self {
        Self {
            fingerprint_macro_tolerance_pct: 0.25,
            fingerprint_kcal_tolerance_pct: 0.20,
            kcal_balance_tolerance_pct: 0.05,
            max_macro_mass_per_100g: 105.0,
        }
    }
}

impl NutritionConfig {
    /// Build from the process environment, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            fingerprint_macro_tolerance_pct: env_f64(
                "NUTRITION_FINGERPRINT_MACRO_TOLERANCE_PCT",
                d.fingerprint_macro_tolerance_pct,
            ),
            fingerprint_kcal_tolerance_pct: env_f64(
                "NUTRITION_FINGERPRINT_KCAL_TOLERANCE_PCT",
                d.fingerprint_kcal_tolerance_pct,
            ),
            kcal_balance_tolerance_pct: env_f64(
                "NUTRITION_KCAL_BALANCE_TOLERANCE_PCT",
                d.kcal_balance_tolerance_pct,
            ),
            max_macro_mass_per_100g: env_f64(
                "NUTRITION_MAX_MACRO_MASS_PER_100G",
                d.max_macro_mass_per_100g,
            ),
        }
    }
}

/// Aggregate of every phase's tunables, built once at orchestrator construction.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// C9 tunables.
    pub contract: ContractConfig,
    /// C10 tunables.
    pub solver: SolverConfig,
    /// C8 tunables.
    pub market: MarketConfig,
    /// C6 tunables.
    pub rate_limit: RateLimitConfig,
    /// C3/C5 tunables.
    pub nutrition: NutritionConfig,
}

impl PipelineConfig {
    /// Build every sub-config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            contract: ContractConfig::from_env(),
            solver: SolverConfig::from_env(),
            market: MarketConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            nutrition: NutritionConfig::from_env(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contract: ContractConfig::default(),
            solver: SolverConfig::default(),
            market: MarketConfig::default(),
            rate_limit: RateLimitConfig::default(),
            nutrition: NutritionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification() {
        let c = ContractConfig::default();
        assert!((c.kcal_tolerance_pct - 0.03).abs() < f64::EPSILON);
        assert!((c.macro_tolerance_pct - 0.08).abs() < f64::EPSILON);
        let n = NutritionConfig::default();
        assert!((n.fingerprint_macro_tolerance_pct - 0.25).abs() < f64::EPSILON);
        assert!((n.fingerprint_kcal_tolerance_pct - 0.20).abs() < f64::EPSILON);
    }

    #[test]
    fn solver_weights_bias_carbs_highest() {
        let s = SolverConfig::default();
        let (kcal, p, f, c) = s.weights;
        assert!(c > p);
        assert!(c > f);
        assert!(c > kcal);
    }
}
