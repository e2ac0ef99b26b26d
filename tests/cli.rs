//! End-to-end tests for the `consolidate` binary.

mod fixtures;

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn consolidate(args: &[&str], cwd: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_consolidate"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("binary runs")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_merge_command() {
    let dir = fixtures::fragments_dir();
    let output = consolidate(&["merge", "first", "second", "grid", "--compact"], &dir);
    let json = stdout_json(&output);

    assert_eq!(json["clash"], "second");
    assert_eq!(json["objects"].as_array().unwrap().len(), 7);
    assert_eq!(json["color"], "#ff800080");
    assert_eq!(json["grid"]["container"], 960);
}

#[test]
fn test_merge_without_deferred_resolution() {
    let dir = fixtures::fragments_dir();
    let output = consolidate(&["merge", "deferred", "--no-deferred"], &dir);
    let json = stdout_json(&output);
    assert_eq!(json["derivedValue"], "!expression a + b");
}

#[test]
fn test_layers_command() {
    let dir = fixtures::fragments_dir();
    let output = consolidate(&["layers", "first", "second"], &dir);
    let json = stdout_json(&output);

    assert_eq!(json["sass"], serde_json::json!(["breakpoints", "colors", "grid"]));
    assert_eq!(json["template"], serde_json::json!(["grid"]));
}

#[test]
fn test_emit_command() {
    let dir = fixtures::fragments_dir();
    let output = consolidate(&["emit", "js", "first", "second"], &dir);
    let json = stdout_json(&output);

    assert_eq!(json, serde_json::json!({"breakpoints": {"sm": 576, "md": 768, "lg": 992}}));
}

#[test]
fn test_emit_unknown_layer_fails() {
    let dir = fixtures::fragments_dir();
    let output = consolidate(&["emit", "css", "first"], &dir);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown layer 'css'"));
}

#[test]
fn test_missing_fragment_fails() {
    let dir = TempDir::new().unwrap();
    let output = consolidate(&["merge", "./nonexistent"], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot find module"));
}

#[test]
fn test_settings_file_supplies_fragments() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("consolidate.toml"),
        format!(
            "fragments = [\"deferred\"]\nbase_dir = \"{}\"\n",
            fixtures::fragments_dir().display().to_string().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    let output = consolidate(&["merge"], dir.path());
    let json = stdout_json(&output);
    assert_eq!(json["derivedValue"], 300);
}

#[test]
fn test_no_fragments_fails() {
    let dir = TempDir::new().unwrap();
    let output = consolidate(&["merge"], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no fragments given"));
}
