//! Integration tests for the diagtree CLI
//!
//! These tests exercise the full CLI workflow using a temporary data file.
//! They verify that commands work end-to-end without mocking.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run diagtree inside `dir` against the data file at `data`
fn run_diagtree(dir: &Path, data: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .current_dir(dir)
        .arg("--data")
        .arg(data)
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute diagtree")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// A temp dir with an empty collection already saved
fn empty_project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("elements.json");
    fs::write(&data, r#"{"elements":[]}"#).unwrap();
    (dir, data)
}

fn add(dir: &Path, data: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    let output = run_diagtree(dir, data, &full);
    assert!(output.status.success(), "add failed: {}", stderr(&output));
    stdout(&output).trim().to_string()
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("diagtree"));
    assert!(out.contains("troubleshooting"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("diagtree"));
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "completion failed: {}", stderr(&output));
    assert!(stdout(&output).contains("_diagtree"));
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_missing_data_file_uses_sample() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("fresh.json");

    let output = run_diagtree(dir.path(), &data, &["tree"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("[cat] GENERAL OPERATION (cat1)"));
    assert!(out.contains("  [prob] Machine does not start (prob1)"));

    // Reading alone never writes the slot
    assert!(!data.exists());
}

#[test]
fn test_init_creates_config_and_data() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .current_dir(dir.path())
        .args(["init", "--empty"])
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(dir.path().join(".diagtree/config.toml").exists());
    let data = fs::read_to_string(dir.path().join(".diagtree/elements.json")).unwrap();
    assert_eq!(data, r#"{"elements":[]}"#);

    // Config discovery from a nested directory finds the same data file
    let nested = dir.path().join("sub");
    fs::create_dir_all(&nested).unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_diagtree"))
        .current_dir(&nested)
        .args(["add", "-t", "category", "Pump"])
        .output()
        .expect("Failed to execute");
    assert!(output.status.success(), "add failed: {}", stderr(&output));
    let data = fs::read_to_string(dir.path().join(".diagtree/elements.json")).unwrap();
    assert!(data.contains("\"Pump\""));
}

// =============================================================================
// Mutations
// =============================================================================

#[test]
fn test_add_and_show() {
    let (dir, data) = empty_project();
    let id = add(dir.path(), &data, &["-t", "category", "Pump"]);
    assert!(id.starts_with("category"), "unexpected id {}", id);

    let output = run_diagtree(dir.path(), &data, &["show", &id, "--json"]);
    assert!(output.status.success());
    let element: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(element["title"], "Pump");
    assert_eq!(element["type"], "category");
    assert_eq!(element["parent"], serde_json::Value::Null);
}

#[test]
fn test_add_rejects_unknown_parent() {
    let (dir, data) = empty_project();
    let output = run_diagtree(
        dir.path(),
        &data,
        &["add", "-t", "problem", "Leak", "--parent", "ghost"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Parent 'ghost' does not exist"));
    assert_eq!(fs::read_to_string(&data).unwrap(), r#"{"elements":[]}"#);
}

#[test]
fn test_delete_cascades() {
    let (dir, data) = empty_project();
    add(dir.path(), &data, &["-t", "category", "A", "--id", "A"]);
    add(dir.path(), &data, &["-t", "problem", "B", "--id", "B", "-p", "A"]);
    add(dir.path(), &data, &["-t", "state", "C", "--id", "C", "-p", "B"]);

    let output = run_diagtree(dir.path(), &data, &["delete", "A"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "A\nB\nC\n");

    let output = run_diagtree(dir.path(), &data, &["export", "--stdout"]);
    assert_eq!(stdout(&output).trim(), "{\n  \"elements\": []\n}");
}

#[test]
fn test_delete_scrubs_flow_references() {
    let (dir, data) = empty_project();
    add(dir.path(), &data, &["-t", "action", "Target", "--id", "t"]);
    add(dir.path(), &data, &["-t", "state", "Source", "--id", "s", "-n", "t"]);

    run_diagtree(dir.path(), &data, &["delete", "t"]);
    let output = run_diagtree(dir.path(), &data, &["show", "s", "--json"]);
    let element: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(element.get("next").is_none());
}

#[test]
fn test_move_rejects_cycle() {
    let (dir, data) = empty_project();
    add(dir.path(), &data, &["-t", "category", "A", "--id", "A"]);
    add(dir.path(), &data, &["-t", "problem", "C", "--id", "C", "-p", "A"]);
    add(dir.path(), &data, &["-t", "state", "B", "--id", "B", "-p", "C"]);

    let output = run_diagtree(dir.path(), &data, &["move", "A", "--to", "B"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("own descendant"));

    let output = run_diagtree(dir.path(), &data, &["show", "A", "--json"]);
    let element: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(element["parent"], serde_json::Value::Null);

    let output = run_diagtree(dir.path(), &data, &["move", "B", "--root"]);
    assert!(output.status.success());
    let output = run_diagtree(dir.path(), &data, &["children"]);
    assert!(stdout(&output).contains("(B)"));
}

#[test]
fn test_update_fields() {
    let (dir, data) = empty_project();
    add(dir.path(), &data, &["-t", "action", "Fix", "--id", "fix"]);
    add(dir.path(), &data, &["-t", "verification", "Check", "--id", "v"]);

    let output = run_diagtree(
        dir.path(),
        &data,
        &["update", "v", "--title", "Check seal", "--ok", "fix", "--usedoc", "true"],
    );
    assert!(output.status.success(), "update failed: {}", stderr(&output));

    let output = run_diagtree(dir.path(), &data, &["show", "v", "--json"]);
    let element: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(element["title"], "Check seal");
    assert_eq!(element["next_ok"], "fix");
    assert_eq!(element["usedoc"], true);

    let output = run_diagtree(dir.path(), &data, &["update", "nope", "--title", "x"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Element 'nope' not found"));
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_search_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("sample.json");

    let output = run_diagtree(dir.path(), &data, &["search", "FUSE"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("(verif2)"));
    assert!(out.contains("(action2)"));
}

#[test]
fn test_graph_dot_branches() {
    let (dir, data) = empty_project();
    add(dir.path(), &data, &["-t", "action", "X", "--id", "X"]);
    add(dir.path(), &data, &["-t", "action", "Y", "--id", "Y"]);
    add(
        dir.path(),
        &data,
        &["-t", "verification", "V", "--id", "V", "--ok", "X", "--ko", "Y"],
    );

    let output = run_diagtree(dir.path(), &data, &["graph", "V", "--format", "dot"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"V\" -> \"X\" [color=\"#228B22\" label=\"OK\""));
    assert!(out.contains("\"V\" -> \"Y\" [color=\"#DC143C\" label=\"KO\""));

    let output = run_diagtree(dir.path(), &data, &["graph", "V", "--format", "json"]);
    let view: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(view["subgraph"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(view["layout"]["nodes"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Export / Import / Check
// =============================================================================

#[test]
fn test_export_default_file_name() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("sample.json");

    let output = run_diagtree(dir.path(), &data, &["export"]);
    assert!(output.status.success(), "export failed: {}", stderr(&output));

    let exported = fs::read_to_string(dir.path().join("troubleshooting-data.json")).unwrap();
    assert!(exported.starts_with("{\n  \"elements\": ["));
    assert!(exported.contains("\"id\": \"cat1\""));
}

#[test]
fn test_import_bare_array() {
    let (dir, data) = empty_project();
    let file = dir.path().join("import.json");
    fs::write(
        &file,
        r#"[{"id":"c1","type":"categorie","title":"Power","parent":null},
            {"id":"p1","type":"probleme","title":"No power","parent":"c1"}]"#,
    )
    .unwrap();

    let output = run_diagtree(dir.path(), &data, &["import", file.to_str().unwrap()]);
    assert!(output.status.success(), "import failed: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "2");

    let saved = fs::read_to_string(&data).unwrap();
    assert!(saved.contains(r#""type":"problem""#));
}

#[test]
fn test_check_reports_dangling() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("broken.json");
    fs::write(
        &data,
        r#"{"elements":[{"id":"s","type":"state","title":"S","parent":null,"next":["gone"]}]}"#,
    )
    .unwrap();

    let output = run_diagtree(dir.path(), &data, &["check"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("s.next -> gone (missing)"));
}

#[test]
fn test_sqlite_backend() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("tree.db");

    let output = run_diagtree(dir.path(), &data, &["import", "/dev/null"]);
    assert!(!output.status.success());

    let id = add(dir.path(), &data, &["-t", "category", "Boiler"]);
    assert!(data.exists());

    let output = run_diagtree(dir.path(), &data, &["show", &id]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Boiler"));

    // First write seeded the slot from the sample data plus the new element
    let output = run_diagtree(dir.path(), &data, &["check"]);
    assert!(stdout(&output).contains("Elements:  35"));
}
