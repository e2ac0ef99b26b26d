//! Run settings
//!
//! Implements the 3-layer settings merge:
//! 1. Built-in defaults
//! 2. Settings file (consolidate.toml)
//! 3. CLI flags

mod defaults;
mod effective;

pub use defaults::BuiltinDefaults;
pub use effective::{
    EffectiveSettings, Settings, SettingsOrigin, SettingsSource, DEFAULT_SETTINGS_FILE,
};
