//! Result records produced by scorers and the matrix engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::case::EvalCase;

/// Open map of metric or metadata name to value.
pub type DataMap = serde_json::Map<String, Value>;

/// What a scorer returns for one (actual, expected) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialResult {
    /// Explicit result name; the matrix derives one when absent.
    pub name: Option<String>,
    pub metadata: DataMap,
    pub data: DataMap,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Keys of [`ResultMetadata`] that are fields rather than `extra` entries.
pub const RESERVED_METADATA_KEYS: [&str; 6] = [
    "runner",
    "evaluator",
    "testCase",
    "actual_response",
    "duration",
    "run_count",
];

/// Metadata of a scored result: the fields set by the matrix engine plus
/// whatever the scorer attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    #[serde(rename = "testCase", default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<EvalCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_response: Option<String>,
    /// Seconds spent in the scorer call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// 1-based repetition index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_count: Option<u32>,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl ResultMetadata {
    /// Metadata holding only scorer-provided entries. Reserved keys are
    /// dropped so the engine's fields cannot be shadowed.
    pub fn from_extra(mut extra: DataMap) -> Self {
        for key in RESERVED_METADATA_KEYS {
            extra.remove(key);
        }
        Self {
            extra,
            ..Default::default()
        }
    }
}

/// One scored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorResult {
    pub name: String,
    #[serde(default)]
    pub metadata: ResultMetadata,
    #[serde(default)]
    pub data: DataMap,
}

impl EvaluatorResult {
    pub fn new(name: impl Into<String>, data: DataMap) -> Self {
        Self {
            name: name.into(),
            metadata: ResultMetadata::default(),
            data,
        }
    }

    /// Numeric value of a data field.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(as_number)
    }
}

/// The value as a float, when it is a JSON number.
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// JSON number for `x`; non-finite values become `null`.
pub fn number_value(x: f64) -> Value {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
