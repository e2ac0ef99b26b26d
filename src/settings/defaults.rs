//! Built-in settings (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default settings values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Resolve `!expression` markers after merging (default: true)
    pub resolve_deferred: bool,

    /// Pretty-print JSON output (default: true)
    pub pretty: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            resolve_deferred: true,
            pretty: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "fragments": [],
            "layers": [],
            "resolve_deferred": self.resolve_deferred,
            "pretty": self.pretty
        })
    }
}
