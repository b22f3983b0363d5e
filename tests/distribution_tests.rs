//! End-to-end tests for the count and distribution subcommands
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use std::fs;
use std::path::Path;

use predicates::prelude::*;

fn write_trace(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn minar() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("minar").unwrap()
}

#[test]
fn test_count_tallies_all_ops() {
    let dir = tempfile::tempdir().unwrap();
    // No block machinery in count mode: every op line counts
    let trace = write_trace(
        dir.path(),
        "trace.log",
        "OPType: Get, key: 6801, size: 1\n\
         OPType: Get, key: 6802, size: 1\n\
         OPType: BatchPut, key: 6201, size: 64\n\
         OPType: NewIterator\n\
         random log noise\n",
    );
    let output = dir.path().join("counts.txt");

    minar()
        .args(["count", "--trace"])
        .arg(&trace)
        .arg("-o")
        .arg(&output)
        .args(["--progress", "0"])
        .assert()
        .success();

    let report = fs::read_to_string(&output).unwrap();
    assert!(report.contains("Category: HeaderPrefix\n  OPType: Get, Count: 2"));
    assert!(report.contains("Category: BlockBodyPrefix\n  OPType: BatchPut, Count: 1"));
    // Keyless ops land in the sentinel category
    assert!(report.contains("Category: Unknown\n  OPType: NewIterator, Count: 1"));
}

#[test]
fn test_count_uses_literal_key_precedence() {
    let dir = tempfile::tempdir().unwrap();
    // 4c617374426c6f636b = "LastBlock": the literal marker must not be
    // mistaken for the one-byte "L" table prefix.
    let trace = write_trace(
        dir.path(),
        "trace.log",
        "OPType: Get, key: 4c617374426c6f636b, size: 8\n\
         OPType: Get, key: 4c01, size: 8\n",
    );
    let output = dir.path().join("counts.txt");

    minar()
        .args(["count", "--trace"])
        .arg(&trace)
        .arg("-o")
        .arg(&output)
        .args(["--progress", "0"])
        .assert()
        .success();

    let report = fs::read_to_string(&output).unwrap();
    assert!(report.contains("Category: HeadBlockKey\n  OPType: Get, Count: 1"));
    assert!(report.contains("Category: StateIDPrefix\n  OPType: Get, Count: 1"));
}

#[test]
fn test_distribution_windows_write_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    // Blocks 10 and 11 fall in window [10,11], block 12 in [12,13].
    let trace = write_trace(
        dir.path(),
        "trace.log",
        "Processing block (start), ID: 10\n\
         OPType: Get, key: 6801, size: 1\n\
         OPType: Get, key: 6802, size: 1\n\
         Processing block (end), ID: 10\n\
         Processing block (start), ID: 11\n\
         OPType: Get, key: 6801, size: 1\n\
         Processing block (end), ID: 11\n\
         Processing block (start), ID: 12\n\
         OPType: Get, key: 6803, size: 1\n\
         Processing block (end), ID: 12\n",
    );

    minar()
        .args(["distribution", "--trace"])
        .arg(&trace)
        .arg("--output-dir")
        .arg(out.path())
        .args([
            "--start", "10", "--end", "14", "--step", "2", "--progress", "0",
        ])
        .assert()
        .success();

    let first = fs::read_to_string(out.path().join("countKVDist-10_11.txt")).unwrap();
    assert!(first.contains("Category: HeaderPrefix"));
    assert!(first.contains("  OPType: Get, Count: 3"));

    // Per-key frequency file: key 6801 touched twice, 6802 once
    let dist = fs::read_to_string(
        out.path()
            .join("distribution-10_11_HeaderPrefix_get_dis.txt"),
    )
    .unwrap();
    let mut lines = dist.lines();
    assert_eq!(lines.next(), Some("ID\tKey\tCount"));
    assert_eq!(lines.next(), Some("1\t6801\t2"));
    assert_eq!(lines.next(), Some("2\t6802\t1"));

    // The second window starts from zero: count is 1, not 4
    let second = fs::read_to_string(out.path().join("countKVDist-12_13.txt")).unwrap();
    assert!(second.contains("  OPType: Get, Count: 1"));
}

#[test]
fn test_distribution_zero_step_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path(), "trace.log", "");
    minar()
        .args(["distribution", "--trace"])
        .arg(&trace)
        .args(["--start", "10", "--end", "20", "--step", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("block step must be greater than zero"));
}

#[test]
fn test_distribution_inverted_range_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path(), "trace.log", "");
    minar()
        .args(["distribution", "--trace"])
        .arg(&trace)
        .args(["--start", "20", "--end", "10", "--step", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not below end block"));
}
