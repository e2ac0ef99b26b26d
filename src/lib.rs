//! Config Consolidator - merge partial configuration fragments
//!
//! This crate combines independently authored configuration fragments into
//! one canonical configuration for build tooling, resolves deferred
//! `!expression` values against the merged result, and computes which
//! configuration members are emitted to which output layer.

pub mod consolidator;
pub mod deferred;
pub mod error;
pub mod fragment;
pub mod layers;
pub mod merge;
pub mod settings;
pub mod value;

pub use consolidator::{ConfigConsolidator, Consolidation};
pub use deferred::{process_deferred_config, EvaluationError, EXPRESSION_SENTINEL};
pub use error::{ConsolidateError, FragmentError};
pub use fragment::{FragmentLoader, FragmentSource, LoadedFragment};
pub use layers::{allocate_to_layers, select_layer, LayerAllocationMap};
pub use merge::{deep_merge, merge_configs};
pub use settings::{EffectiveSettings, Settings};
pub use value::{Color, ConfigMap, ConfigValue, OpaqueRegistry, OpaqueValue};
