//! Corruption recovery tests for the doseline binary.
//!
//! These tests verify the system can handle:
//! - Corrupted store values
//! - Misaligned snapshots
//! - A store holding only one table
//! - Unwritable store locations

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("doseline"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn store_dir(dir: &Path) -> std::path::PathBuf {
    let store = dir.join("data/store");
    fs::create_dir_all(&store).unwrap();
    store
}

#[test]
fn test_corrupted_store_falls_back_to_preset() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);

    fs::write(store.join("multiDoseTable.json"), "{ invalid json }}}}").unwrap();
    fs::write(store.join("steadyStateTable.json"), "[[1,2").unwrap();

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: default preset"));
}

#[test]
fn test_misaligned_columns_are_ignored() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);

    fs::write(
        store.join("multiDoseTable.json"),
        r#"[[0, 7], [4], ["EV im", "EV im"], [true, null], [true, null]]"#,
    )
    .unwrap();

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: default preset"));
}

#[test]
fn test_unknown_method_in_store_is_ignored() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);

    fs::write(
        store.join("multiDoseTable.json"),
        r#"[[0], [4], ["gel"], [true], [true]]"#,
    )
    .unwrap();

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: default preset"));
}

#[test]
fn test_single_stored_table_is_restored() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);

    // only the steady-state table was ever saved
    fs::write(
        store.join("steadyStateTable.json"),
        r#"[[12, null], [3, null], ["EEn im", "EEn im"], [true, true], [false, true]]"#,
    )
    .unwrap();

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: local store"))
        .stdout(predicate::str::contains(
            "steady state: 3 mg EEn im every 12 days (curve on, uncertainty off)",
        ))
        // the multidose table keeps the preset rows
        .stdout(predicate::str::contains("day   30.00"));
}

#[test]
fn test_incomplete_cells_survive_restore() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);

    fs::write(
        store.join("multiDoseTable.json"),
        r#"[[0, 7, null], [4, null, null], ["EV im", "EC im", "EC im"], [false, null, null], [true, null, null]]"#,
    )
    .unwrap();

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: local store"))
        .stdout(predicate::str::contains("(draft)"))
        .stdout(predicate::str::contains("multidose: curve off, uncertainty on"));
}

#[test]
fn test_unwritable_store_reports_error() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    // a plain file where the store directory should be
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(dir.join("data/store"), "not a directory").unwrap();

    // reading still works from the preset
    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: default preset"));

    cli(dir).args(["add", "0", "4"]).assert().failure();
}

#[test]
fn test_store_is_rewritten_after_corruption() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let store = store_dir(dir);
    fs::write(store.join("multiDoseTable.json"), "garbage").unwrap();

    cli(dir).arg("clear").assert().success();

    let contents = fs::read_to_string(store.join("multiDoseTable.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(json.as_array().map(|a| a.len()), Some(5));

    cli(dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: local store"));
}
