//! Location resolution.
//!
//! A location resolves, relative to the anchor directory, to:
//! 1. every file matching it, when it is a glob pattern
//! 2. the file it names
//! 3. the file it names plus a known extension (`.json`, then `.toml`)
//! 4. `index.json` / `index.toml` inside the directory it names

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use super::format::FragmentFormat;
use crate::error::FragmentError;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

pub fn is_glob(location: &str) -> bool {
    location.contains(GLOB_META)
}

/// Resolve `location` to one or more files.
pub fn resolve_location(location: &str, base_dir: Option<&Path>) -> Result<Vec<PathBuf>, FragmentError> {
    let anchor = base_dir.unwrap_or_else(|| Path::new("."));
    let not_found = || FragmentError::NotFound {
        location: location.to_string(),
        base_dir: base_dir.map(Path::to_path_buf),
    };

    if is_glob(location) {
        let matches = expand_glob(location, anchor)?;
        if matches.is_empty() {
            return Err(not_found());
        }
        return Ok(matches);
    }

    let candidate = anchor.join(location);
    if candidate.is_file() {
        return Ok(vec![candidate]);
    }

    for format in FragmentFormat::PROBE_ORDER {
        let mut with_ext = OsString::from(candidate.as_os_str());
        with_ext.push(".");
        with_ext.push(format.extension());
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Ok(vec![with_ext]);
        }
    }

    if candidate.is_dir() {
        for format in FragmentFormat::PROBE_ORDER {
            let index = candidate.join(format!("index.{}", format.extension()));
            if index.is_file() {
                return Ok(vec![index]);
            }
        }
    }

    Err(not_found())
}

/// Files under the pattern's literal prefix that match it, in path order.
fn expand_glob(pattern: &str, anchor: &Path) -> Result<Vec<PathBuf>, FragmentError> {
    let (root, relative) = split_glob(pattern, anchor);
    let invalid = |message: String| FragmentError::Pattern {
        pattern: pattern.to_string(),
        message,
    };

    let matcher = GlobBuilder::new(&relative)
        .literal_separator(true)
        .build()
        .map_err(|e| invalid(e.to_string()))?
        .compile_matcher();

    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry.map_err(|e| FragmentError::Io {
            path: root.clone(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        if matcher.is_match(rel) {
            matches.push(entry.path().to_path_buf());
        }
    }
    matches.sort();
    Ok(matches)
}

/// Split a pattern into the directory before its first glob component and
/// the remaining pattern, e.g. `tokens/*.json` -> (`<anchor>/tokens`, `*.json`).
fn split_glob(pattern: &str, anchor: &Path) -> (PathBuf, String) {
    let mut root = anchor.to_path_buf();
    let mut rest: Vec<String> = Vec::new();

    for component in Path::new(pattern).components() {
        if !rest.is_empty() {
            rest.push(component.as_os_str().to_string_lossy().into_owned());
            continue;
        }
        match component {
            Component::CurDir => {}
            Component::Normal(part) if !part.to_string_lossy().contains(GLOB_META) => {
                root.push(part);
            }
            Component::Normal(part) => rest.push(part.to_string_lossy().into_owned()),
            other => root.push(other.as_os_str()),
        }
    }

    (root, rest.join("/"))
}
