// ABOUTME: Centralized error handling and error types for the orchestration engine
// ABOUTME: Defines the error-kind taxonomy shared by every phase of the pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Unified error handling.
//!
//! Mirrors the error-kind table: `Configuration`, `Input`, `UpstreamTransient`,
//! `UpstreamPermanent`, `Fingerprint`, `SolverInfeasible`, `LedgerMismatch`, plus
//! the orchestrator-level terminal codes (`BlueprintInvalid`, `MacroInfeasible`,
//! `FinalMacroMismatch`). Per-ingredient failures are carried as data (see
//! `market::IngredientOutcome` / `nutrition::ResolveOutcome`), not as this error
//! type — `AppError` is reserved for failures that abort a phase or the request.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or invalid configuration (API key, tunable out of range).
    Configuration,
    /// Caller-supplied input failed validation.
    Input,
    /// Upstream returned a transient failure (5xx, timeout, 429) after retries.
    UpstreamTransient,
    /// Upstream returned a permanent failure (4xx other than 429).
    UpstreamPermanent,
    /// Nutrition data deviated from a CID's expected fingerprint beyond tolerance.
    Fingerprint,
    /// No scale vector within bounds satisfies the macro contract.
    SolverInfeasible,
    /// The recomputed ledger violates the contract despite a feasible solve.
    LedgerMismatch,
    /// The model-sketch blueprint failed referential-integrity validation.
    BlueprintInvalid,
    /// An unexpected internal failure.
    Internal,
}

impl ErrorCode {
    /// A human description suitable for logs (not sanitized for clients).
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Configuration => "invalid or missing configuration",
            Self::Input => "invalid input",
            Self::UpstreamTransient => "upstream service temporarily unavailable",
            Self::UpstreamPermanent => "upstream service rejected the request",
            Self::Fingerprint => "nutrition data failed fingerprint validation",
            Self::SolverInfeasible => "no portion scaling satisfies the macro contract",
            Self::LedgerMismatch => "final ledger violates the macro contract",
            Self::BlueprintInvalid => "meal sketch failed referential integrity validation",
            Self::Internal => "internal error",
        }
    }
}

/// The crate-wide error type.
#[derive(Debug, Clone, Error)]
pub struct AppError {
    /// Error kind.
    pub code: ErrorCode,
    /// Human-readable message, safe to log; may contain the offending value.
    pub message: String,
    /// CID this error pertains to, if any (threaded through for diagnostics).
    pub cid: Option<String>,
}

impl AppError {
    /// Build a new error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cid: None,
        }
    }

    /// Attach a CID to the error for diagnostics.
    #[must_use]
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Input validation failure.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Input, message)
    }

    /// Configuration failure.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Transient upstream failure (after retries exhausted).
    #[must_use]
    pub fn upstream_transient(source: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTransient, format!("{source}: {}", message.into()))
    }

    /// Permanent upstream failure.
    #[must_use]
    pub fn upstream_permanent(source: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamPermanent, format!("{source}: {}", message.into()))
    }

    /// Fingerprint mismatch for a CID's chosen SKU.
    #[must_use]
    pub fn fingerprint(cid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Fingerprint, message).with_cid(cid)
    }

    /// Solver could not find a feasible scale vector.
    #[must_use]
    pub fn solver_infeasible(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SolverInfeasible, message)
    }

    /// Ledger verification failed the contract predicate.
    #[must_use]
    pub fn ledger_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LedgerMismatch, message)
    }

    /// Meal-sketch blueprint failed referential integrity.
    #[must_use]
    pub fn blueprint_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BlueprintInvalid, message)
    }

    /// Internal/unexpected failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cid {
            Some(cid) => write!(f, "[{cid}] {}: {}", self.code.description(), self.message),
            None => write!(f, "{}: {}", self.code.description(), self.message),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::upstream_transient("http", err.to_string())
        } else {
            Self::upstream_permanent("http", err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::blueprint_invalid(format!("JSON parse error: {err}"))
    }
}

/// Result alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;

/// Terminal, plan-level failure codes returned in the external response (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanErrorKind {
    /// The meal-sketch blueprint was structurally invalid.
    BlueprintInvalid,
    /// The solver, booster retry, and min_g fallback all failed the contract.
    MacroInfeasible,
    /// The ledger computed from final SKU choices violates the contract.
    FinalMacroMismatch,
    /// An uncaught internal failure aborted the request.
    Uncaught,
}

impl From<ErrorCode> for PlanErrorKind {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::BlueprintInvalid => Self::BlueprintInvalid,
            ErrorCode::SolverInfeasible => Self::MacroInfeasible,
            ErrorCode::LedgerMismatch => Self::FinalMacroMismatch,
            _ => Self::Uncaught,
        }
    }
}
