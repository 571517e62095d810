//! Entry enrichment
//!
//! Turns a raw entry into its shippable form: session GUID and version are
//! attached if missing, and entries severe enough to warrant debugging
//! context carry a snapshot of the recent log history.

use std::sync::Arc;

use super::config::TelemetryConfig;
use super::entry::{FieldValue, TelemetryEntry};
use super::history::LogHistoryBuffer;
use super::level::Level;

/// Message prefix used for stack-trace passthrough events. Such entries are
/// forwarded untouched; the stack dump is already captured in the history.
pub const STACK_MESSAGE_PREFIX: &str = "[Stack]";

const LOG_FIELD: &str = "log";
const SESSION_FIELD: &str = "session";
const VERSION_FIELD: &str = "v";

/// Pure transformation from a raw entry to a shippable entry
///
/// The only side effect is trimming the shared history buffer once its
/// contents have been attached to an event.
pub struct Enricher {
    session_guid: String,
    version: String,
    report_history_level: Level,
    history: Arc<LogHistoryBuffer>,
}

impl Enricher {
    pub fn new(
        session_guid: impl Into<String>,
        version: impl Into<String>,
        report_history_level: Level,
        history: Arc<LogHistoryBuffer>,
    ) -> Self {
        Self {
            session_guid: session_guid.into(),
            version: version.into(),
            report_history_level,
            history,
        }
    }

    pub fn from_config(cfg: &TelemetryConfig, history: Arc<LogHistoryBuffer>) -> Self {
        Self::new(
            cfg.session_guid.clone(),
            cfg.version.clone(),
            cfg.report_history_level,
            history,
        )
    }

    /// Produce the enriched copy of `entry`; the original is never mutated.
    pub fn enrich(&self, entry: &TelemetryEntry) -> TelemetryEntry {
        // Stack dumps pass through untouched, or the history field would
        // duplicate the trace already rolling through the buffer.
        if entry.level == Level::Error && entry.message.starts_with(STACK_MESSAGE_PREFIX) {
            return entry.clone();
        }

        let mut enriched = entry.clone();

        if entry.level >= self.report_history_level {
            enriched.fields.insert(
                LOG_FIELD.to_string(),
                FieldValue::String(self.history.snapshot()),
            );
            // Trim so the next qualifying event doesn't resend the same lines.
            self.history.trim();
        }

        enriched
            .fields
            .entry(SESSION_FIELD.to_string())
            .or_insert_with(|| FieldValue::String(self.session_guid.clone()));
        enriched
            .fields
            .entry(VERSION_FIELD.to_string())
            .or_insert_with(|| FieldValue::String(self.version.clone()));

        enriched
    }
}
