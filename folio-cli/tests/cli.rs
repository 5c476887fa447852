use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn folio(dir: &TempDir) -> assert_cmd::Command {
    let config = dir.path().join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "[logging]\nlevel = \"debug\"\n").unwrap();
    }
    let mut cmd = cargo_bin_cmd!("folio");
    cmd.arg("--state-dir")
        .arg(dir.path().join("state"))
        .arg("--log-dir")
        .arg(dir.path().join("logs"))
        .env_remove("RUST_LOG")
        .env("FOLIO_CONFIG", config);
    cmd
}

fn json_stdout(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

fn new_document(dir: &TempDir, pages: usize) -> std::path::PathBuf {
    let path = dir.path().join("doc.json");
    folio(dir)
        .arg("new")
        .arg(&path)
        .arg("--pages")
        .arg(pages.to_string())
        .assert()
        .success();
    path
}

fn write_script(path: &Path, script: &str) {
    std::fs::write(path, script).expect("script should be written");
}

#[test]
fn new_then_inspect_reports_blank_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 3);

    let value = json_stdout(folio(&dir).arg("inspect").arg(&path));
    assert_eq!(value["pageCount"], 3);
    let pages = value["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0]["width"], 612.0);
    assert_eq!(pages[0]["height"], 792.0);
    assert_eq!(pages[0]["rotation"], 0);
    assert_eq!(pages[2]["index"], 2);
}

#[test]
fn apply_runs_script_and_keeps_history_depths() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 2);
    let script = dir.path().join("script.json");
    write_script(
        &script,
        r#"[
            {"op": "addText", "page": 0, "x": 72, "y": 700, "text": "Hello"},
            {"op": "addHighlight", "page": 1, "x1": 10, "y1": 10, "x2": 110, "y2": 40},
            {"op": "rotatePage", "page": 1, "degrees": 90},
            {"op": "undo"}
        ]"#,
    );

    let summary = json_stdout(folio(&dir).arg("apply").arg(&path).arg(&script));
    assert_eq!(summary["commands"], 4);
    assert_eq!(summary["pages"], 2);
    assert_eq!(summary["annotations"], 2);
    assert_eq!(summary["undoDepth"], 2);
    assert_eq!(summary["redoDepth"], 1);
    let notices = summary["notices"].as_array().unwrap();
    assert!(notices.iter().any(|notice| notice == "Undid rotate page"));

    let value = json_stdout(folio(&dir).arg("inspect").arg(&path));
    assert_eq!(value["pages"][0]["texts"], 1);
    assert_eq!(value["pages"][1]["highlights"], 1);
    assert_eq!(value["pages"][1]["rotation"], 0);
}

#[test]
fn apply_can_write_to_a_separate_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    let output = dir.path().join("out.json");
    let script = dir.path().join("script.json");
    write_script(&script, r#"[{"op": "addBlankPage"}, {"op": "duplicatePage", "page": 0}]"#);

    folio(&dir)
        .arg("apply")
        .arg(&path)
        .arg(&script)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(json_stdout(folio(&dir).arg("inspect").arg(&path))["pageCount"], 1);
    assert_eq!(json_stdout(folio(&dir).arg("inspect").arg(&output))["pageCount"], 3);
}

#[test]
fn pointer_gesture_draws_a_highlight() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    let script = dir.path().join("script.json");
    write_script(
        &script,
        r#"[
            {"op": "setTool", "tool": "highlight"},
            {"op": "pointerDown", "x": 100, "y": 100},
            {"op": "pointerMove", "x": 160, "y": 130},
            {"op": "pointerUp", "x": 200, "y": 150}
        ]"#,
    );

    let summary = json_stdout(folio(&dir).arg("apply").arg(&path).arg(&script));
    assert_eq!(summary["annotations"], 1);
    assert_eq!(summary["undoDepth"], 1);
}

#[test]
fn undo_on_fresh_document_reports_nothing_to_undo() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    let script = dir.path().join("script.json");
    write_script(&script, r#"[{"op": "undo"}]"#);

    folio(&dir)
        .arg("apply")
        .arg(&path)
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to undo"));
}

#[test]
fn render_writes_rotated_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    let script = dir.path().join("script.json");
    write_script(&script, r#"[{"op": "rotatePage", "page": 0, "degrees": 90}]"#);
    folio(&dir).arg("apply").arg(&path).arg(&script).assert().success();

    let png = dir.path().join("page.png");
    folio(&dir)
        .arg("render")
        .arg(&path)
        .arg("--page")
        .arg("0")
        .arg("--scale")
        .arg("0.5")
        .arg("--output")
        .arg(&png)
        .assert()
        .success()
        .stdout(predicate::str::contains("396x306"));

    let image = image::open(&png).expect("render output should be a readable image");
    assert_eq!((image.width(), image.height()), (396, 306));
}

#[test]
fn render_rejects_missing_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    folio(&dir)
        .arg("render")
        .arg(&path)
        .arg("--page")
        .arg("4")
        .arg("--output")
        .arg(dir.path().join("nope.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn inspect_fails_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    folio(&dir)
        .arg("inspect")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read document"));
}

#[test]
fn malformed_script_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    let script = dir.path().join("script.json");
    write_script(&script, r#"[{"op": "teleportPage"}]"#);
    folio(&dir)
        .arg("apply")
        .arg(&path)
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to decode script"));
}

#[test]
fn unreadable_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_document(&dir, 1);
    folio(&dir)
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}
