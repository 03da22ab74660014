//! Concurrency tests for the nutri binary.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the intake journal simultaneously (file locking)
//! - Update different profile fields at once without losing either edit
//! - Roll up the journal while others append, without losing entries

use assert_cmd::Command;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("nutri").expect("Failed to find nutri binary")
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn log_item(data_dir: &std::path::Path, name: &str) {
    cli()
        .args(["log", "--name", name, "--calories", "100", "--protein", "5"])
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success();
}

#[test]
fn test_no_journal_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 5));
                log_item(&data_dir, &format!("item_{}", i));
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let content = std::fs::read_to_string(data_dir.join("journal/intake.jsonl"))
        .expect("Failed to read journal");
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 10);
    for line in lines {
        serde_json::from_str::<serde_json::Value>(line).expect("Every line is valid JSON");
    }
}

#[test]
fn test_concurrent_profile_updates_leave_valid_record() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .args(["profile", "init", "--name", "Sam", "--age", "28"])
        .args(["--weight", "70", "--height", "175", "--sex", "male"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 3));
                cli()
                    .args(["profile", "update", "--weight", &format!("{}", 70 + i)])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Updater thread panicked");
    }

    let output = cli()
        .args(["profile", "show", "--json"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let profile: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    let weight = profile["weight_kg"].as_f64().expect("weight present");
    assert!((70.0..=75.0).contains(&weight));
    assert!(profile["estimate"]["tdee"].as_u64().is_some());
}

#[test]
fn test_rollup_while_writing() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    for i in 0..3 {
        log_item(&data_dir, &format!("before_{}", i));
    }

    let data_dir_rollup = data_dir.clone();
    let rollup_handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        cli()
            .arg("rollup")
            .arg("--data-dir")
            .arg(&data_dir_rollup)
            .assert()
            .success();
    });

    for i in 0..2 {
        log_item(&data_dir, &format!("during_{}", i));
        thread::sleep(Duration::from_millis(5));
    }

    rollup_handle.join().expect("Rollup thread panicked");

    assert!(data_dir.join("intake.csv").exists());

    let journal_path = data_dir.join("journal/intake.jsonl");
    let journal_entries = std::fs::read_to_string(&journal_path)
        .map(|c| c.lines().count())
        .unwrap_or(0);
    let csv_entries = csv_rows(&data_dir.join("intake.csv"));
    assert_eq!(journal_entries + csv_entries, 5);
}

#[test]
fn test_concurrent_updates_to_different_fields_are_merged() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .args(["profile", "init", "--name", "Sam", "--age", "28"])
        .args(["--weight", "70", "--height", "175", "--sex", "male"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    for round in 0..5u32 {
        let barrier = Arc::new(Barrier::new(2));
        let weight = format!("{}", 80 + round);
        let age = format!("{}", 40 + round);

        let handles: Vec<_> = [("--weight", weight.clone()), ("--age", age.clone())]
            .into_iter()
            .map(|(flag, value)| {
                let data_dir = data_dir.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cli()
                        .args(["profile", "update", flag, value.as_str()])
                        .arg("--data-dir")
                        .arg(&data_dir)
                        .assert()
                        .success();
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Updater thread panicked");
        }

        let output = cli()
            .args(["profile", "show", "--json"])
            .arg("--data-dir")
            .arg(&data_dir)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let profile: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");

        assert_eq!(profile["weight_kg"].as_f64(), Some(f64::from(80 + round)));
        assert_eq!(profile["age_years"].as_u64(), Some(u64::from(40 + round)));

        // Moderate: (10w + 6.25 * 175 - 5a + 5) * 1.55
        let expected_tdee =
            ((10.0 * f64::from(80 + round) + 1093.75 - 5.0 * f64::from(40 + round) + 5.0) * 1.55)
                .round() as u64;
        assert_eq!(profile["estimate"]["tdee"].as_u64(), Some(expected_tdee));
    }
}

fn csv_rows(path: &std::path::Path) -> usize {
    std::fs::read_to_string(path)
        .map(|c| c.lines().count().saturating_sub(1))
        .unwrap_or(0)
}
