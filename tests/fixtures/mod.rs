//! Test fixtures for fragment loading and consolidation.

use std::path::{Path, PathBuf};

/// Directory holding the fragment fixtures
pub fn fragments_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fragments")
}
