//! Layer allocation
//!
//! Each fragment may declare which of its top-level members belong in which
//! output layer (stylesheet variables, script constants, template data, ...).
//! The declarations of all fragments are folded into one map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConsolidateError;
use crate::value::{ConfigMap, ConfigValue};

/// Layer name to member names.
///
/// Members within a layer are unique and keep first-seen order. A member may
/// appear under several layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerAllocationMap(IndexMap<String, Vec<String>>);

impl LayerAllocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `member` to `layer`, creating the layer if needed. Returns `false`
    /// when the member was already present.
    pub fn insert(&mut self, layer: impl Into<String>, member: impl Into<String>) -> bool {
        let members = self.0.entry(layer.into()).or_default();
        let member = member.into();
        if members.contains(&member) {
            return false;
        }
        members.push(member);
        true
    }

    /// Fold another allocation into this one.
    pub fn absorb(&mut self, other: LayerAllocationMap) {
        for (layer, members) in other.0 {
            // a declared layer exists in the output even with no members
            self.0.entry(layer.clone()).or_default();
            for member in members {
                self.insert(layer.as_str(), member);
            }
        }
    }

    pub fn get(&self, layer: &str) -> Option<&[String]> {
        self.0.get(layer).map(Vec::as_slice)
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a declaration shaped as a mapping of layer name to an array of
    /// member names.
    pub fn from_config_value(value: &ConfigValue) -> Result<Self, ConsolidateError> {
        let map = value.as_object().ok_or_else(|| {
            ConsolidateError::argument(format!(
                "layer allocation must be an object, got {}",
                value.type_name()
            ))
        })?;

        let mut allocation = Self::new();
        for (layer, members) in map {
            let members = members.as_array().ok_or_else(|| {
                ConsolidateError::argument(format!(
                    "members of layer '{layer}' must be an array, got {}",
                    members.type_name()
                ))
            })?;
            allocation.0.entry(layer.clone()).or_default();
            for member in members {
                let name = member.as_str().ok_or_else(|| {
                    ConsolidateError::argument(format!(
                        "members of layer '{layer}' must be strings, got {}",
                        member.type_name()
                    ))
                })?;
                allocation.insert(layer.as_str(), name);
            }
        }
        Ok(allocation)
    }
}

impl<L, I, M> FromIterator<(L, I)> for LayerAllocationMap
where
    L: Into<String>,
    I: IntoIterator<Item = M>,
    M: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (L, I)>>(iter: T) -> Self {
        let mut allocation = Self::new();
        for (layer, members) in iter {
            let layer = layer.into();
            allocation.0.entry(layer.clone()).or_default();
            for member in members {
                allocation.insert(layer.as_str(), member);
            }
        }
        allocation
    }
}

/// Fold per-fragment allocations left to right into one map.
pub fn allocate_to_layers<I>(allocations: I) -> LayerAllocationMap
where
    I: IntoIterator<Item = LayerAllocationMap>,
{
    allocations
        .into_iter()
        .fold(LayerAllocationMap::new(), |mut acc, allocation| {
            acc.absorb(allocation);
            acc
        })
}

/// Members of `config` allocated to `layer`, in allocation order.
///
/// Allocated members missing from the configuration are skipped. An unknown
/// layer yields an empty map.
pub fn select_layer(config: &ConfigValue, allocations: &LayerAllocationMap, layer: &str) -> ConfigMap {
    let mut selected = ConfigMap::new();
    let Some(members) = allocations.get(layer) else {
        tracing::debug!(layer, "no members allocated to layer");
        return selected;
    };

    for member in members {
        match config.get(member) {
            Some(value) => {
                selected.insert(member.clone(), value.clone());
            }
            None => tracing::warn!(layer, member = member.as_str(), "allocated member missing from configuration"),
        }
    }
    selected
}
