//! Error taxonomy shared by the consolidation operations.

use std::path::PathBuf;

use crate::deferred::EvaluationError;

/// Stable message for a non-sequence `load_configs` argument.
pub const LOAD_CONFIGS_ARGUMENT: &str = "loadConfigs must he supplied with an array";

/// Stable message for a non-sequence `merge_configs` argument.
pub const MERGE_CONFIGS_ARGUMENT: &str = "mergeConfigs must he supplied with an array";

/// Top-level error for every consolidation operation.
#[derive(Debug, thiserror::Error)]
pub enum ConsolidateError {
    /// Caller supplied a value of the wrong shape. Displays the bare message.
    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Fragment loading errors.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    /// Location could not be resolved to a file.
    #[error("Cannot find module '{location}'")]
    NotFound {
        location: String,
        base_dir: Option<PathBuf>,
    },

    #[error("Invalid fragment pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("IO error reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

impl ConsolidateError {
    pub fn argument(message: impl Into<String>) -> Self {
        ConsolidateError::Argument(message.into())
    }
}
