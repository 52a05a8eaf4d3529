//! End-to-end tests for the mis binary
//!
//! These tests run the binary against temporary instance directories:
//! - Help and argument handling
//! - Configuration display
//! - Trailer generation and cleanup
//! - Run lock errors
//! - A full intake, assemble, stage and load cycle

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn mis(instance: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mis").unwrap();
    cmd.arg("--instance").arg(instance);
    cmd
}

fn cb_records(campus: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{:<220}\n", format!("CB{}253R{:06}", campus, i)))
        .collect()
}

// ============================================================================
// Argument Handling
// ============================================================================

#[test]
fn test_help_lists_stages() {
    Command::cargo_bin("mis")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("intake"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("load-reports"));
}

#[test]
fn test_missing_subcommand() {
    Command::cargo_bin("mis")
        .unwrap()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("A subcommand is required"));
}

#[test]
fn test_markdown_help() {
    Command::cargo_bin("mis")
        .unwrap()
        .arg("--markdown-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("# Command-Line Help for `mis`"));
}

#[test]
fn test_unknown_clean_area_is_rejected() {
    let dir = TempDir::new().unwrap();
    mis(dir.path())
        .args(["clean", "everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_show_json() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config").join("mis.toml"),
        "[pipeline]\nbatch_size = 42\n",
    )
    .unwrap();

    mis(dir.path())
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"district\": \"860\""))
        .stdout(predicate::str::contains("\"batch_size\": 42"));
}

#[test]
fn test_instance_from_environment() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("mis")
        .unwrap()
        .env("MIS_INSTANCE_PATH", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.path().display().to_string()));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config").join("mis.toml"),
        "[pipeline]\ndistrict = \"86\"\n",
    )
    .unwrap();

    mis(dir.path())
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

// ============================================================================
// Trailer and Cleanup
// ============================================================================

#[test]
fn test_trailer_counts_final_masters() {
    let dir = TempDir::new().unwrap();
    let final_dat = dir.path().join("final_dat");
    fs::create_dir_all(&final_dat).unwrap();
    fs::write(final_dat.join("U86253CB.dat"), cb_records("861", 4)).unwrap();

    mis(dir.path())
        .args(["trailer", "--term", "253"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));

    let trailer = fs::read_to_string(final_dat.join("U86253TX.dat")).unwrap();
    assert!(trailer.starts_with("TX860253CB00000004"));

    let log = fs::read_to_string(dir.path().join("mis-cli.log")).unwrap();
    assert!(log.contains("===== trailer started ====="));
    assert!(log.contains("===== trailer finished ====="));
}

#[test]
fn test_clean_empties_area() {
    let dir = TempDir::new().unwrap();
    let pending = dir.path().join("dat_loader").join("pending");
    fs::create_dir_all(&pending).unwrap();
    fs::write(pending.join("U86253CB.dat"), "CB861253\n").unwrap();
    fs::write(pending.join("U86253SB.dat"), "SB861253\n").unwrap();

    mis(dir.path())
        .args(["clean", "loader-pending", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 item(s)"));

    assert!(pending.is_dir());
    assert_eq!(fs::read_dir(&pending).unwrap().count(), 0);
}

#[test]
fn test_locked_instance_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".mis-run.lock"), "pid=1 stage=merge started=now\n").unwrap();

    mis(dir.path())
        .args(["trailer", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Another MIS run is in progress"))
        .stderr(predicate::str::contains("stage=merge"));

    // Someone else's lock is left alone
    assert!(dir.path().join(".mis-run.lock").exists());
}

#[test]
fn test_history_list_empty() {
    let dir = TempDir::new().unwrap();
    mis(dir.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history snapshots yet"));
}

#[test]
fn test_intake_reports_ambiguous_and_superseded_files() {
    let dir = TempDir::new().unwrap();
    let intake = dir.path().join("manual_download");
    fs::create_dir_all(&intake).unwrap();
    fs::write(intake.join("gvprmis_05.dat"), "PP861253 a\n").unwrap();
    fs::write(intake.join("svrppca_05.dat"), "PP861253 b\n").unwrap();
    fs::write(intake.join("gvprmis_01.dat"), cb_records("862", 1)).unwrap();
    fs::write(intake.join("gvprmis_02.dat"), cb_records("862", 2)).unwrap();

    mis(dir.path())
        .args(["intake", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superseded: gvprmis_01.dat by gvprmis_02.dat"))
        .stdout(predicate::str::contains("Skipping PP_861_253: Ambiguous version 5"))
        .stdout(predicate::str::contains("Committed 1 extract(s)"));

    let export = dir.path().join("shared_export");
    assert!(export.join("862").join("CB_862_253_01.txt").is_file());
    assert!(!export.join("861").join("PP_861_253_01.txt").exists());
}

// ============================================================================
// Full Cycle
// ============================================================================

#[test]
fn test_intake_assemble_stage_load() {
    let dir = TempDir::new().unwrap();
    let intake = dir.path().join("manual_download");
    fs::create_dir_all(&intake).unwrap();
    fs::write(intake.join("gvprmis_01.dat"), cb_records("861", 3)).unwrap();

    mis(dir.path())
        .args(["intake", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Committed 1 extract(s)"));
    assert!(dir
        .path()
        .join("shared_export")
        .join("861")
        .join("CB_861_253_01.txt")
        .is_file());

    mis(dir.path())
        .args(["assemble", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assembled 1 master(s) for term 253"));
    assert!(dir.path().join("final_dat").join("U86253CB.dat").is_file());

    mis(dir.path())
        .args(["stage", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("as history 01"));
    assert!(dir.path().join("input_dat").join("U86253CB.dat").is_file());

    mis(dir.path())
        .args(["history", "load-latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued 2 file(s) from history 01"));

    mis(dir.path())
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 3 row(s) from 1 file(s)"));

    assert!(dir.path().join("dat_loader").join("mis.sqlite").is_file());
    assert!(dir
        .path()
        .join("dat_loader")
        .join("completed")
        .join("U86253CB.dat")
        .is_file());
}
