//! Consolidation entry points.
//!
//! [`ConfigConsolidator`] exposes the four operations as one API. It holds
//! only loader settings; every call is independent of the ones before it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::deferred;
use crate::error::ConsolidateError;
use crate::fragment::{FragmentLoader, FragmentSource};
use crate::layers::{self, LayerAllocationMap};
use crate::merge;
use crate::value::{ConfigMap, ConfigValue, OpaqueRegistry};

/// Fragment loading, merging, deferred resolution and layer allocation.
#[derive(Debug, Clone, Default)]
pub struct ConfigConsolidator {
    loader: FragmentLoader,
}

/// Result of a full consolidation run.
#[derive(Debug, Clone, Serialize)]
pub struct Consolidation {
    /// When this consolidation was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: ConfigValue,

    /// Consolidated layer allocations of every fragment
    pub layers: LayerAllocationMap,

    /// Contributing fragments in precedence order
    pub sources: Vec<FragmentSource>,
}

impl ConfigConsolidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: OpaqueRegistry) -> Self {
        Self {
            loader: FragmentLoader::with_registry(registry),
        }
    }

    pub fn loader(&self) -> &FragmentLoader {
        &self.loader
    }

    /// See [`FragmentLoader::load_configs`].
    pub fn load_configs<S: AsRef<str>>(
        &self,
        locations: &[S],
        base_dir: Option<&Path>,
    ) -> Result<Vec<ConfigValue>, ConsolidateError> {
        self.loader.load_configs(locations, base_dir)
    }

    /// See [`merge::merge_configs`].
    pub fn merge_configs<I>(&self, fragments: I) -> ConfigValue
    where
        I: IntoIterator<Item = ConfigValue>,
    {
        merge::merge_configs(fragments)
    }

    /// See [`layers::allocate_to_layers`].
    pub fn allocate_to_layers<I>(&self, allocations: I) -> LayerAllocationMap
    where
        I: IntoIterator<Item = LayerAllocationMap>,
    {
        layers::allocate_to_layers(allocations)
    }

    /// See [`deferred::process_deferred_config`].
    pub async fn process_deferred_config(config: ConfigValue) -> Result<ConfigValue, ConsolidateError> {
        deferred::process_deferred_config(config).await
    }

    /// Load, merge and allocate in one pass, optionally resolving deferred
    /// markers in the merged result.
    pub async fn consolidate<S: AsRef<str>>(
        &self,
        locations: &[S],
        base_dir: Option<&Path>,
        resolve_deferred: bool,
    ) -> Result<Consolidation, ConsolidateError> {
        let fragments = self.loader.load_fragments(locations, base_dir)?;

        let mut values = Vec::with_capacity(fragments.len());
        let mut allocations = Vec::with_capacity(fragments.len());
        let mut sources = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            values.push(fragment.value);
            allocations.push(fragment.layers);
            sources.push(fragment.source);
        }

        let mut config = self.merge_configs(values);
        if resolve_deferred {
            config = Self::process_deferred_config(config).await?;
        }
        let layers = self.allocate_to_layers(allocations);

        tracing::info!(
            fragments = sources.len(),
            layers = layers.len(),
            "consolidated configuration"
        );

        Ok(Consolidation {
            created_at: Utc::now(),
            config,
            layers,
            sources,
        })
    }
}

impl Consolidation {
    /// Members of the merged configuration allocated to `layer`.
    pub fn layer(&self, layer: &str) -> ConfigMap {
        layers::select_layer(&self.config, &self.layers, layer)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn fixture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.json"),
            r##"{
                "data": {
                    "unit": 8,
                    "breakpoints": {"sm": 576},
                    "colors": {"primary": {"$color": "#ff0000"}},
                    "objects": [1, 2]
                },
                "layers": {"sass": ["breakpoints", "colors"], "js": ["breakpoints"]}
            }"##,
        )
        .unwrap();
        fs::write(
            dir.path().join("site.json"),
            r##"{
                "data": {
                    "grid": {"gutter": "!expression unit * 2"},
                    "colors": {"primary": {"$color": "#0000ff"}},
                    "objects": [3]
                },
                "layers": {"sass": ["colors", "grid"], "template": ["grid"]}
            }"##,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_consolidate_end_to_end() {
        let dir = fixture_dir();
        let consolidator = ConfigConsolidator::new();
        let result = consolidator
            .consolidate(&["base", "site"], Some(dir.path()), true)
            .await
            .unwrap();

        assert_eq!(result.config["grid"]["gutter"], ConfigValue::from(16));
        assert_eq!(result.config["objects"], ConfigValue::from(json!([1, 2, 3])));
        assert_eq!(
            result.config["colors"]["primary"].as_color().map(|c| c.to_hex()),
            Some("#0000ff".to_string())
        );
        assert_eq!(result.layers.get("sass").unwrap(), ["breakpoints", "colors", "grid"]);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[1].location, "site");
    }

    #[tokio::test]
    async fn test_consolidate_without_resolution_keeps_markers() {
        let dir = fixture_dir();
        let result = ConfigConsolidator::new()
            .consolidate(&["base", "site"], Some(dir.path()), false)
            .await
            .unwrap();
        assert_eq!(
            result.config["grid"]["gutter"],
            ConfigValue::from("!expression unit * 2")
        );
    }

    #[tokio::test]
    async fn test_layer_view_and_json() {
        let dir = fixture_dir();
        let result = ConfigConsolidator::new()
            .consolidate(&["base", "site"], Some(dir.path()), true)
            .await
            .unwrap();

        let template = result.layer("template");
        assert_eq!(template.len(), 1);
        assert_eq!(template["grid"]["gutter"], ConfigValue::from(16));

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["config"]["colors"]["primary"], "#0000ff");
        assert_eq!(json["layers"]["js"], json!(["breakpoints"]));
    }

    #[test]
    fn test_operations_are_independent() {
        let consolidator = ConfigConsolidator::new();
        let first = consolidator.merge_configs(vec![ConfigValue::from(json!({"a": 1}))]);
        let second = consolidator.merge_configs(vec![ConfigValue::from(json!({"b": 2}))]);
        assert_eq!(first, ConfigValue::from(json!({"a": 1})));
        assert_eq!(second, ConfigValue::from(json!({"b": 2})));
    }
}
