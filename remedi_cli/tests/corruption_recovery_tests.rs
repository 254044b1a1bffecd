//! Corruption recovery tests for remedi.
//!
//! These tests verify the system can handle:
//! - Corrupted item stores
//! - Corrupted or tampered trial records
//! - Partial dose log lines
//! - Unreadable backend drop files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("remedi"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_item_store() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::write(data_dir.join("items.json"), "{ invalid json }}}}")
        .expect("Failed to write corrupted store");

    // Reads degrade to an empty store instead of failing
    cli()
        .arg("due")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("No reminder items"));
}

#[test]
fn test_corrupted_item_store_recovers_on_write() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::write(data_dir.join("items.json"), "corrupted").unwrap();

    // Adding an item rewrites the store from scratch
    cli()
        .arg("add")
        .arg("Vitamin D")
        .arg("--period")
        .arg("breakfast")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let contents = fs::read_to_string(data_dir.join("items.json")).unwrap();
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&contents);
    assert!(parsed.is_ok(), "Store should be valid JSON after rewrite");
}

#[test]
fn test_partial_dose_log_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("add")
        .arg("Vitamin D")
        .arg("--period")
        .arg("breakfast")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // Simulate a crash mid-append: a partial last line with no newline
    fs::create_dir_all(data_dir.join("log")).unwrap();
    let mut file = fs::File::create(data_dir.join("log/doses.log")).unwrap();
    write!(file, r#"{{"id":"partial"#).unwrap();
    drop(file);

    // The partial line is skipped, not fatal
    cli()
        .arg("due")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("[ ] 08:00"));
}

#[test]
fn test_corrupted_dose_log_ignored_during_read() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("add")
        .arg("Iron")
        .arg("--period")
        .arg("dinner")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    fs::create_dir_all(data_dir.join("log")).unwrap();
    fs::write(
        data_dir.join("log/doses.log"),
        "{ invalid json }\n{ more invalid }\n",
    )
    .unwrap();

    cli()
        .arg("due")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_corrupted_trial_record() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::write(data_dir.join("trial.json"), "not json at all").unwrap();

    // An unreadable record is treated as no trial
    cli()
        .arg("trial")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("No trial on this device"));
}

#[test]
fn test_tampered_trial_record_flagged() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("trial")
        .arg("--start")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // Push the expiry out without re-sealing the record
    let trial_path = data_dir.join("trial.json");
    let contents = fs::read_to_string(&trial_path).unwrap();
    let mut record: serde_json::Value = serde_json::from_str(&contents).unwrap();
    record["state"]["expires_at"] = serde_json::json!("2099-01-01T00:00:00Z");
    fs::write(&trial_path, serde_json::to_string(&record).unwrap()).unwrap();

    // With no backend available, the record is kept but flagged
    cli()
        .arg("trial")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("failed verification"));
}

#[test]
fn test_backend_record_overrides_tampered_local() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("trial")
        .arg("--start")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // Tamper with the local record
    let trial_path = data_dir.join("trial.json");
    let contents = fs::read_to_string(&trial_path).unwrap();
    let mut record: serde_json::Value = serde_json::from_str(&contents).unwrap();
    record["state"]["expires_at"] = serde_json::json!("2099-01-01T00:00:00Z");
    fs::write(&trial_path, serde_json::to_string(&record).unwrap()).unwrap();

    // Drop a backend record; it is authoritative
    fs::create_dir_all(data_dir.join("backend")).unwrap();
    fs::write(
        data_dir.join("backend/trial.json"),
        r#"{"valid":true,"started_at":"2026-08-20T00:00:00Z","expires_at":"2026-09-03T00:00:00Z","sessions_used":3,"sessions_remaining":11}"#,
    )
    .unwrap();

    cli()
        .arg("trial")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("Source:         Backend"));

    // The local record was re-sealed from the backend copy and verifies
    // again once the backend file is gone
    fs::remove_file(data_dir.join("backend/trial.json")).unwrap();

    cli()
        .arg("trial")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("Source:         Local"))
        .stdout(predicates::str::contains("failed verification").not());
}

#[test]
fn test_corrupted_backend_record_falls_back_to_local() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("trial")
        .arg("--start")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    fs::create_dir_all(data_dir.join("backend")).unwrap();
    fs::write(data_dir.join("backend/trial.json"), "{ garbage").unwrap();

    cli()
        .arg("trial")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("Source:         Local"))
        .stdout(predicates::str::contains("Valid:          true"));
}

#[test]
fn test_empty_dose_log_export() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("log")).unwrap();
    fs::write(data_dir.join("log/doses.log"), "").unwrap();

    cli()
        .arg("export")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicates::str::contains("Exported 0 dose(s)"));
}

#[test]
fn test_unreadable_trial_record_permissions() {
    // Skip on Windows (permission model is different)
    if cfg!(windows) {
        return;
    }

    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::write(data_dir.join("trial.json"), "{}").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let trial_path = data_dir.join("trial.json");
        let mut perms = fs::metadata(&trial_path).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(&trial_path, perms).unwrap();

        // Unreadable record degrades to "no trial"
        cli()
            .arg("trial")
            .arg("--data-dir")
            .arg(&data_dir)
            .assert()
            .success();

        // Clean up permissions for temp dir cleanup
        let mut perms = fs::metadata(&trial_path).unwrap().permissions();
        perms.set_mode(0o644);
        fs::set_permissions(&trial_path, perms).unwrap();
    }
}
