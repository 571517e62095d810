//! Telemetry entry structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::level::Level;

/// Value type for telemetry entry fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl FieldValue {
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

/// One observation to ship: a copy of a log event, enriched and published
/// independently of the original call site.
///
/// Owned exclusively by the publisher from enqueue until delivery or drop.
/// Enrichment clones rather than mutating in place, so the original logger
/// call never races with the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, FieldValue>,
    /// Opaque payload of the original log event, for passthrough cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<serde_json::Value>,
}

impl TelemetryEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: HashMap::new(),
            raw_event: None,
        }
    }

    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_raw_event(mut self, raw: serde_json::Value) -> Self {
        self.raw_event = Some(raw);
        self
    }

    /// Serialize to the collector wire format: a flat JSON object with
    /// `time`, `level` and `message`, plus all fields merged in.
    pub fn to_wire(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "time".to_string(),
            serde_json::Value::String(self.timestamp.to_rfc3339()),
        );
        obj.insert(
            "level".to_string(),
            serde_json::Value::String(self.level.to_str().to_string()),
        );
        obj.insert(
            "message".to_string(),
            serde_json::Value::String(self.message.clone()),
        );
        for (key, value) in &self.fields {
            obj.insert(key.clone(), value.to_json_value());
        }
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = TelemetryEntry::new(Level::Info, "/Network/ConnectPeer");
        assert_eq!(entry.level, Level::Info);
        assert_eq!(entry.message, "/Network/ConnectPeer");
        assert!(entry.fields.is_empty());
        assert!(entry.raw_event.is_none());
    }

    #[test]
    fn test_with_field() {
        let entry = TelemetryEntry::new(Level::Warn, "test")
            .with_field("session", "abc-123")
            .with_field("count", 7i64);

        assert_eq!(entry.fields.len(), 2);
        assert_eq!(
            entry.fields.get("session"),
            Some(&FieldValue::String("abc-123".to_string()))
        );
    }

    #[test]
    fn test_to_wire() {
        let entry = TelemetryEntry::new(Level::Error, "boom").with_field("session", "s-1");
        let wire = entry.to_wire();

        assert_eq!(wire["level"], "ERROR");
        assert_eq!(wire["message"], "boom");
        assert_eq!(wire["session"], "s-1");
        assert!(wire["time"].is_string());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = TelemetryEntry::new(Level::Info, "original");
        let mut copy = original.clone();
        copy.fields.insert("k".to_string(), FieldValue::Int(1));

        assert!(original.fields.is_empty());
        assert_eq!(copy.fields.len(), 1);
    }
}
