//! Fragment document formats.

use serde_json::Value;
use std::path::Path;

/// Supported fragment encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    Json,
    Toml,
}

impl FragmentFormat {
    /// Extensions tried, in order, when a location names no file directly.
    pub const PROBE_ORDER: &'static [FragmentFormat] = &[FragmentFormat::Json, FragmentFormat::Toml];

    pub fn extension(&self) -> &'static str {
        match self {
            FragmentFormat::Json => "json",
            FragmentFormat::Toml => "toml",
        }
    }

    /// Format by file extension; anything unrecognized is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FragmentFormat::Toml,
            _ => FragmentFormat::Json,
        }
    }

    /// Parse document text into a JSON value.
    pub fn parse(&self, contents: &str) -> Result<Value, String> {
        match self {
            FragmentFormat::Json => {
                serde_json::from_str(contents).map_err(|e| format!("JSON parse error: {}", e))
            }
            FragmentFormat::Toml => toml::from_str::<toml::Value>(contents)
                .map(toml_to_json)
                .map_err(|e| format!("TOML parse error: {}", e)),
        }
    }
}

/// Convert TOML Value to JSON Value
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
