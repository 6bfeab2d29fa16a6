// ABOUTME: Configuration module for centralized pipeline settings and parameters
// ABOUTME: Handles environment/logging configuration and per-phase tunables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//! Configuration module.
//!
//! Two concerns live here, mirroring the ambient-stack/tunables split: process
//! environment and logging setup ([`environment`]), and the per-phase tunables
//! the specification calls out as configuration rather than baked-in constants
//! ([`tunables`]).

/// Deployment environment and logging configuration.
pub mod environment;
/// Per-phase tunables (tolerances, weights, worker counts, TTLs).
pub mod tunables;

pub use environment::{Environment, LogFormat, LogLevel, LoggingConfig};
pub use tunables::{
    ContractConfig, MarketConfig, NutritionConfig, PipelineConfig, RateLimitConfig, SolverConfig,
};
