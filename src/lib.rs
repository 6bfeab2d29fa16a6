// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Meal-Plan Orchestration Engine
//!
//! The server-side core of a grocery-aware diet planner. Given a user
//! [`model::Profile`], it builds a daily macro contract, resolves a model-supplied
//! meal sketch's free-form ingredients against a curated registry, fans out a
//! rate-limited supermarket search for concrete SKUs, resolves per-100g nutrition
//! for every chosen SKU through a tiered lookup, solves per-meal portion scales
//! against the contract, and recomputes an authoritative ledger from the final
//! choices.
//!
//! ## Pipeline
//!
//! ```text
//! Profile -> contract (C9) -> LLM sketch -> normalizer/registry (C1/C2)
//!         -> market run (C8, using price client C6 + validator C7)
//!         -> nutrition resolver (C5, using hot-path C3 + canonical store C4)
//!         -> portion solver (C10) -> ledger & verifier (C11)
//! ```
//!
//! [`orchestrator::Orchestrator`] sequences the phases above; see its module docs
//! for the concurrency and cancellation model.
//!
//! HTTP transport, authentication, billing, and the LLM prompt that produces the
//! meal sketch are explicitly out of scope here — the orchestrator consumes the
//! sketch as a typed, schema-validated structure via [`llm::meal_sketch`].

/// Supermarket search, price client, product validation, and nutrition provider
/// collaborators (out-of-scope upstreams, specified at their contract boundary).
pub mod external;

/// Cache abstraction (stale-while-revalidate) shared by the price client and
/// the nutrition resolver's external tier.
pub mod cache;

/// Environment- and config-driven tunables, plus logging/error ambient stack.
pub mod config;

/// Crate-wide error type and result alias.
pub mod errors;

/// LLM collaborator abstraction: provider selection and the meal-sketch contract.
pub mod llm;

/// Shared, strongly typed data model (Profile, MacroContract, Meal, DayPlan, ...).
pub mod model;

/// C1: string normalization and fuzzy-candidate generation.
pub mod normalizer;

/// C2: canonical ingredient registry (CID) and query-ladder construction.
pub mod registry;

/// C1: quantity/unit-to-grams conversion for sketched ingredients.
pub mod quantity;

/// C3/C4/C5: tiered nutrition lookup (hot-path table, canonical store, resolver).
pub mod nutrition;

/// C6/C7/C8: token-bucket-limited price client, product validator, and market run.
pub mod market;

/// C9: macro-contract construction from a profile.
pub mod contract;

/// C10: bounded portion solver.
pub mod solver;

/// C11: ledger reconciliation and contract verification.
pub mod ledger;

/// Progress event schema shared by the orchestrator and any streaming caller.
pub mod progress;

/// C12: phase sequencing and top-level request handling.
pub mod orchestrator;

/// Shared test fixtures and mock collaborators, available to integration tests.
pub mod test_utils;
