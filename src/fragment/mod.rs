//! Fragment loading
//!
//! Turns location strings into fragment values. A fragment document is either
//! the value itself, or an envelope that also declares layer allocations:
//!
//! ```json
//! { "data": { "grid": { "columns": 12 } }, "layers": { "sass": ["grid"] } }
//! ```

mod format;
mod resolve;

pub use format::{toml_to_json, FragmentFormat};
pub use resolve::{is_glob, resolve_location};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConsolidateError, FragmentError, LOAD_CONFIGS_ARGUMENT};
use crate::layers::LayerAllocationMap;
use crate::value::{ConfigValue, OpaqueRegistry};

const ENVELOPE_DATA: &str = "data";
const ENVELOPE_LAYERS: &str = "layers";

/// Where a fragment came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentSource {
    /// Location as supplied by the caller.
    pub location: String,

    /// Resolved file.
    pub path: PathBuf,

    /// SHA-256 digest of raw file bytes
    pub digest: String,
}

/// A loaded fragment and its layer declaration.
#[derive(Debug, Clone)]
pub struct LoadedFragment {
    pub source: FragmentSource,
    pub value: ConfigValue,
    pub layers: LayerAllocationMap,
}

/// Resolves and parses fragment documents.
#[derive(Debug, Clone, Default)]
pub struct FragmentLoader {
    registry: OpaqueRegistry,
}

impl FragmentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: OpaqueRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OpaqueRegistry {
        &self.registry
    }

    /// Load the fragment values at `locations`, anchored at `base_dir`.
    ///
    /// Stops at the first location that fails; nothing is returned for the
    /// batch in that case.
    pub fn load_configs<S: AsRef<str>>(
        &self,
        locations: &[S],
        base_dir: Option<&Path>,
    ) -> Result<Vec<ConfigValue>, ConsolidateError> {
        Ok(self
            .load_fragments(locations, base_dir)?
            .into_iter()
            .map(|f| f.value)
            .collect())
    }

    /// [`load_configs`](Self::load_configs) over a dynamically shaped
    /// argument that must be an array of location strings.
    pub fn load_configs_value(
        &self,
        locations: &Value,
        base_dir: Option<&Path>,
    ) -> Result<Vec<ConfigValue>, ConsolidateError> {
        let items = locations
            .as_array()
            .ok_or_else(|| ConsolidateError::argument(LOAD_CONFIGS_ARGUMENT))?;
        let locations = items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    ConsolidateError::argument(format!("fragment location must be a string, got {item}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.load_configs(&locations, base_dir)
    }

    /// Load fragments with their provenance and layer declarations.
    pub fn load_fragments<S: AsRef<str>>(
        &self,
        locations: &[S],
        base_dir: Option<&Path>,
    ) -> Result<Vec<LoadedFragment>, ConsolidateError> {
        let mut fragments = Vec::with_capacity(locations.len());
        for location in locations {
            let location = location.as_ref();
            let paths = resolve_location(location, base_dir)?;
            tracing::debug!(location, files = paths.len(), "resolved fragment location");
            for path in paths {
                fragments.push(self.load_file(location, &path)?);
            }
        }
        tracing::info!(count = fragments.len(), "loaded fragments");
        Ok(fragments)
    }

    /// Read and parse one fragment file.
    pub fn load_file(&self, location: &str, path: &Path) -> Result<LoadedFragment, FragmentError> {
        let bytes = fs::read(path).map_err(|e| FragmentError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let parse_error = |message: String| FragmentError::Parse {
            path: path.to_path_buf(),
            message,
        };

        // Compute digest
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents =
            String::from_utf8(bytes).map_err(|e| parse_error(format!("Invalid UTF-8: {}", e)))?;
        let document = FragmentFormat::from_path(path)
            .parse(&contents)
            .map_err(parse_error)?;

        let (data, layers) = split_envelope(document);
        let value = ConfigValue::from_json(data, &self.registry).map_err(|e| parse_error(e.to_string()))?;
        let layers = match layers {
            Some(declared) => {
                let declared = ConfigValue::from(declared);
                LayerAllocationMap::from_config_value(&declared).map_err(|e| parse_error(e.to_string()))?
            }
            None => LayerAllocationMap::new(),
        };

        Ok(LoadedFragment {
            source: FragmentSource {
                location: location.to_string(),
                path: path.to_path_buf(),
                digest,
            },
            value,
            layers,
        })
    }
}

/// Separate an envelope document into its data and layer declaration.
fn split_envelope(document: Value) -> (Value, Option<Value>) {
    match document {
        Value::Object(mut map)
            if map.contains_key(ENVELOPE_DATA)
                && map.keys().all(|k| k == ENVELOPE_DATA || k == ENVELOPE_LAYERS) =>
        {
            let layers = map.remove(ENVELOPE_LAYERS);
            let data = map.remove(ENVELOPE_DATA).unwrap_or(Value::Null);
            (data, layers)
        }
        other => (other, None),
    }
}
