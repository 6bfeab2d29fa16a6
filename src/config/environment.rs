// ABOUTME: Process environment and logging configuration
// ABOUTME: Mirrors the deployment-environment / log-level conventions of the wider platform
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::fmt;

/// Deployment environment, selected via `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development; verbose logging, no retry backoff jitter.
    #[default]
    Development,
    /// Production deployment.
    Production,
    /// Running under the test harness.
    Testing,
}

impl Environment {
    /// Parse from a string, falling back to [`Environment::Development`].
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Read `APP_ENV` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        env::var("APP_ENV").map_or_else(|_| Self::default(), |v| Self::from_str_or_default(&v))
    }

    /// Whether this is the production environment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

/// Minimum log level to emit, selected via `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Normal operational logging.
    #[default]
    Info,
    /// Verbose, per-ingredient/per-phase tracing.
    Debug,
    /// Everything, including cache hit/miss and token-bucket internals.
    Trace,
}

impl LogLevel {
    /// Parse from a string, falling back to [`LogLevel::Info`].
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }

    /// Convert to the equivalent `tracing` level filter string.
    #[must_use]
    pub const fn to_tracing_level(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tracing_level())
    }
}

/// Output format for structured logs, selected via `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for local development.
    #[default]
    Pretty,
    /// Newline-delimited JSON, for production log aggregation.
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Top-level logging configuration, built once at process start.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Minimum level to emit.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Build from the process environment (`APP_ENV`, `LOG_LEVEL`, `LOG_FORMAT`),
    /// falling back to development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        let level = env::var("LOG_LEVEL").map_or_else(
            |_| {
                if environment.is_production() {
                    LogLevel::Info
                } else {
                    LogLevel::Debug
                }
            },
            |v| LogLevel::from_str_or_default(&v),
        );
        Self {
            environment,
            level,
            format: LogFormat::from_env(),
        }
    }

    /// Initialize the global `tracing` subscriber from this configuration.
    ///
    /// Idempotent-ish: a second call is a no-op (the underlying subscriber can
    /// only be installed once per process), the error from a duplicate install
    /// is swallowed since it only happens in test harnesses that call this
    /// more than once.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(self.level.to_tracing_level()));

        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        let result = if matches!(self.format, LogFormat::Json) {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        };
        if let Err(e) = result {
            tracing::debug!("tracing subscriber already initialized: {e}");
        }
    }
}
