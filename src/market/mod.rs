// ABOUTME: Market-run subsystem grouping C6 (price client), C7 (validator), C8 (fan-out run)
// ABOUTME: Re-exports the public run() entry point consumed by the orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Market-run subsystem (C6/C7/C8).
//!
//! [`token_bucket`] and [`price_client`] implement the rate-limited, cached
//! supermarket search (C6). [`validator`] is the deterministic allow/deny
//! pipeline over one candidate (C7). [`run`] fans out the tight/normal/wide
//! query ladder across ingredients with a bounded worker pool (C8).

/// C6: shared token-bucket rate limiter.
pub mod token_bucket;
/// C6: price search client with SWR caching and retry.
pub mod price_client;
/// C7: deterministic SKU candidate validator.
pub mod validator;
/// C8: per-ingredient query-ladder fan-out.
pub mod run;

pub use price_client::PriceClient;
pub use run::{run_market, IngredientOutcome, MarketResult};
pub use token_bucket::TokenBucket;
