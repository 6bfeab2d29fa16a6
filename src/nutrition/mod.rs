// ABOUTME: Tiered nutrition lookup module grouping C3 (hot-path), C4 (canonical store), C5 (resolver)
// ABOUTME: Re-exports the public resolve() entry point used by the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Nutrition resolution pipeline.
//!
//! [`hot_path`] is a compile-time-checked, self-auditing in-memory table for
//! the ~150 most common ingredients (C3). [`store`] models the output of an
//! out-of-scope build-time ETL: an immutable `normalized_key -> NutritionRow`
//! mapping with its own ingestion gate honored here (C4). [`resolver`] is the
//! public tiered lookup that walks hot-path -> canonical store -> external
//! providers, wrapping each external call in a stale-while-revalidate cache and
//! a fingerprint validation gate (C5).

/// C3: hot-path in-memory nutrition table.
pub mod hot_path;
/// C4: canonical, build-time-validated nutrition store.
pub mod store;
/// C5: tiered resolver with SWR caching and fingerprint validation.
pub mod resolver;

pub use resolver::{NutritionResolver, ResolveOutcome};
