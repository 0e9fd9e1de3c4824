//! CLI tests for the `composer` binary.
//!
//! Spawns the binary inside a scaffolded workspace and checks exit codes
//! for clean, invalid and degraded inputs.

use std::fs;
use std::process::{Command, Output};

use composer::core::model::ModuleReference;
use composer::exit_codes;
use composer::io::init::sample_model;
use composer::io::model_store::write_model;
use composer::test_support::TestWorkspace;

fn composer(workspace: &TestWorkspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_composer"))
        .current_dir(workspace.root())
        .args(args)
        .output()
        .expect("composer")
}

#[test]
fn init_in_empty_directory_creates_workspace() {
    let temp = tempfile::tempdir().expect("tempdir");
    let status = Command::new(env!("CARGO_BIN_EXE_composer"))
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("composer init");

    assert_eq!(status.code(), Some(exit_codes::OK));
    for file in ["composer.toml", "rig.json", "types.toml"] {
        assert!(temp.path().join(file).exists(), "{file} missing");
    }
}

#[test]
fn run_sample_workspace_exits_ok() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = composer(&workspace, &["run"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Spine\tConstruction\tExecuted"));
    assert!(stdout.contains("Spine/Arm\tForwards Solve\tExecuted"));
}

#[test]
fn run_json_prints_queue() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = composer(&workspace, &["run", "--event", "Forwards Solve", "--json"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let queue: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let entries = queue.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["module_path"], "Spine");
    assert_eq!(entries[1]["state"], "executed");
}

#[test]
fn resolve_lists_default_target_first() {
    let workspace = TestWorkspace::new().expect("workspace");
    let output = composer(&workspace, &["resolve", "--connector", "parent", "--json"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let matches: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(matches["outcome"], "success");
    assert_eq!(matches["matches"][0]["key"]["name"], "Spine:chest");
    assert_eq!(matches["matches"][0]["state"], "default");
}

#[test]
fn validate_rejects_invalid_model() {
    let workspace = TestWorkspace::new().expect("workspace");
    fs::write(
        &workspace.paths().model_path,
        r#"{"modules": [{"name": "a/b", "type_id": "Spine"}]}"#,
    )
    .expect("write model");

    let output = composer(&workspace, &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!output.stderr.is_empty());
}

#[test]
fn unknown_type_degrades_tree() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut model = sample_model();
    model
        .modules
        .push(ModuleReference::new("Tail", "Spine", "Tail"));
    write_model(&workspace.paths().model_path, &model).expect("write model");

    let output = composer(&workspace, &["tree"]);

    assert_eq!(output.status.code(), Some(exit_codes::DEGRADED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Spine [Spine] rig#1"));
    assert!(!stdout.contains("Tail"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown rig type 'Tail'"));
}
