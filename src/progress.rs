// ABOUTME: Structured progress/log event schema emitted at phase boundaries and per-ingredient completion
// ABOUTME: Fans out over an mpsc channel for optional newline-delimited-JSON streaming and into tracing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Progress Events.
//!
//! One entry schema (`{ts, level, tag, message, data?}`) serves both the
//! request's `logs` array and, when a caller asked for it, an
//! optional newline-delimited-JSON progress stream terminated by a
//! `finalData` event carrying the success payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Severity of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Routine phase-boundary or per-item progress.
    Info,
    /// A recoverable anomaly (fallback taken, rung widened).
    Warn,
    /// A terminal failure already reflected in the response's `error` field.
    Error,
}

/// One structured log/progress entry, matching the wire schema from the
/// external-interfaces section: `{ts, level, tag, message, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emission timestamp.
    pub ts: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Short machine-stable tag identifying the phase/event (e.g. `"phase.market_run"`).
    pub tag: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload (ingredient CID, violation list, timing, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LogEntry {
    /// Build a new entry, stamping `ts` at call time.
    #[must_use]
    pub fn new(level: Level, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self { ts: Utc::now(), level, tag: tag.into(), message: message.into(), data: None }
    }

    /// Attach a structured data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A terminal event carrying the full success payload, framed alongside
/// [`LogEntry`] records on the same newline-delimited-JSON stream.
#[derive(Debug, Clone, Serialize)]
pub struct FinalData<T> {
    /// Always `"finalData"`; present so a consumer demuxing the NDJSON
    /// stream by a `kind` discriminant can tell this apart from a [`LogEntry`].
    pub kind: &'static str,
    /// The response payload.
    pub data: T,
}

impl<T> FinalData<T> {
    /// Wrap `data` as a terminal stream event.
    pub const fn new(data: T) -> Self {
        Self { kind: "finalData", data }
    }
}

/// Sink for progress events: mirrors every entry into `tracing` and, if a
/// streaming consumer is attached, forwards it over an unbounded channel.
///
/// Cloning is cheap (an `Option<Sender>` clone); every phase of the
/// orchestrator holds its own clone.
#[derive(Clone, Default)]
pub struct ProgressSink {
    stream: Option<mpsc::UnboundedSender<LogEntry>>,
    log: std::sync::Arc<std::sync::Mutex<Vec<LogEntry>>>,
}

impl ProgressSink {
    /// A sink that only accumulates `logs()`, with no streaming consumer.
    #[must_use]
    pub fn collecting() -> Self {
        Self::default()
    }

    /// A sink that also streams every entry to `sender`, e.g. an HTTP
    /// chunked-response writer.
    #[must_use]
    pub fn streaming(sender: mpsc::UnboundedSender<LogEntry>) -> Self {
        Self { stream: Some(sender), log: std::sync::Arc::default() }
    }

    /// Record `entry`: mirror to `tracing`, append to the retained log, and
    /// forward to the streaming consumer if attached.
    pub fn emit(&self, entry: LogEntry) {
        match entry.level {
            Level::Info => tracing::info!(tag = %entry.tag, data = ?entry.data, "{}", entry.message),
            Level::Warn => tracing::warn!(tag = %entry.tag, data = ?entry.data, "{}", entry.message),
            Level::Error => tracing::error!(tag = %entry.tag, data = ?entry.data, "{}", entry.message),
        }
        if let Some(sender) = &self.stream {
            let _ = sender.send(entry.clone());
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }

    /// Convenience: emit an [`Level::Info`] phase-boundary entry.
    pub fn phase(&self, tag: &str, message: impl Into<String>) {
        self.emit(LogEntry::new(Level::Info, tag, message));
    }

    /// Convenience: emit a [`Level::Warn`] entry with a structured payload.
    pub fn warn_with(&self, tag: &str, message: impl Into<String>, data: Value) {
        self.emit(LogEntry::new(Level::Warn, tag, message).with_data(data));
    }

    /// Snapshot of every entry recorded so far, for the response's `logs` array.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.log.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_retains_every_entry() {
        let sink = ProgressSink::collecting();
        sink.phase("phase.contract", "built contract");
        sink.phase("phase.market_run", "market run complete");
        assert_eq!(sink.logs().len(), 2);
    }

    #[test]
    fn streaming_sink_forwards_entries() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ProgressSink::streaming(tx);
        sink.phase("phase.ledger", "ledger built");
        let forwarded = rx.try_recv().expect("entry forwarded");
        assert_eq!(forwarded.tag, "phase.ledger");
    }

    #[test]
    fn log_entry_serializes_without_data_when_absent() {
        let entry = LogEntry::new(Level::Info, "phase.contract", "ok");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("data").is_none());
    }
}
