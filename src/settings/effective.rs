//! Effective settings with provenance
//!
//! Settings are merged from built-in defaults, an optional TOML settings
//! file, and command-line overrides, using the same merge rules as fragments
//! (so fragment lists from the file and the command line concatenate).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use crate::error::ConsolidateError;
use crate::fragment::toml_to_json;
use crate::merge::merge_configs;
use crate::value::ConfigValue;

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "consolidate.toml";

/// Origin of a settings source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing settings source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    /// Origin of this source
    pub origin: SettingsOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Consolidation run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Fragment locations in precedence order
    #[serde(default)]
    pub fragments: Vec<String>,

    /// Directory fragment locations are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Resolve deferred markers after merging
    #[serde(default = "default_true")]
    pub resolve_deferred: bool,

    /// Layers to emit; empty means all
    #[serde(default)]
    pub layers: Vec<String>,

    /// Pretty-print JSON output
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_true() -> bool {
    true
}

/// Effective settings with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub settings: Settings,

    /// Contributing sources in precedence order
    pub sources: Vec<SettingsSource>,
}

impl EffectiveSettings {
    /// Build effective settings from layers
    pub fn build(
        settings_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConsolidateError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: Settings file
        if let Some(path) = settings_path {
            if !path.is_file() {
                return Err(ConsolidateError::Settings(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            let (value, digest) = Self::load_toml_file(path)?;
            tracing::debug!(path = %path.display(), "loaded settings file");
            layers.push(value);
            sources.push(SettingsSource {
                origin: SettingsOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        // Layer 3: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        // Merge all layers
        let merged = merge_configs(layers.into_iter().map(ConfigValue::from)).to_json();
        let settings: Settings = serde_json::from_value(merged)
            .map_err(|e| ConsolidateError::Settings(format!("invalid settings: {}", e)))?;

        Ok(Self { settings, sources })
    }

    /// Settings file to use: the explicit one, else [`DEFAULT_SETTINGS_FILE`]
    /// in `dir` when it exists.
    pub fn discover(explicit: Option<PathBuf>, dir: &Path) -> Option<PathBuf> {
        explicit.or_else(|| {
            let candidate = dir.join(DEFAULT_SETTINGS_FILE);
            candidate.is_file().then_some(candidate)
        })
    }

    /// Load and parse a TOML file, returning the value and digest.
    ///
    /// A relative `base_dir` is anchored at the file's directory.
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConsolidateError> {
        let bytes = fs::read(path).map_err(|e| ConsolidateError::Settings(e.to_string()))?;

        // Compute digest
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConsolidateError::Settings(format!("Invalid UTF-8: {}", e)))?;
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConsolidateError::Settings(format!("TOML parse error: {}", e)))?;

        let mut json_value = toml_to_json(toml_value);
        if let Some(Value::String(base_dir)) = json_value.get_mut("base_dir") {
            let relative = Path::new(base_dir.as_str());
            if relative.is_relative() {
                if let Some(parent) = path.parent() {
                    *base_dir = parent.join(relative).to_string_lossy().to_string();
                }
            }
        }

        Ok((json_value, digest))
    }
}

impl Settings {
    /// Validate settings for a run that needs fragments.
    pub fn require_fragments(&self) -> Result<(), ConsolidateError> {
        if self.fragments.is_empty() {
            return Err(ConsolidateError::Settings(
                "no fragments given (pass locations or set `fragments` in the settings file)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `layer` should be emitted.
    pub fn emits_layer(&self, layer: &str) -> bool {
        self.layers.is_empty() || self.layers.iter().any(|l| l == layer)
    }
}
