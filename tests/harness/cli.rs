use ftreduce::{CheckpointStore, RoundReport};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const LAUNCHER_VARS: &[&str] = &[
    "FTREDUCE_RANK",
    "FTREDUCE_WORLD_SIZE",
    "OMPI_COMM_WORLD_RANK",
    "OMPI_COMM_WORLD_SIZE",
    "PMI_RANK",
    "PMI_SIZE",
];

/// Run the binary as a single participant with checkpoints under `dir`.
fn ftreduce(dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ftreduce"));
    for var in LAUNCHER_VARS {
        cmd.env_remove(var);
    }
    cmd.args(args)
        .env("FTREDUCE_CHECKPOINT_DIR", dir)
        .env("FTREDUCE_FAIL_DELAY_MS", "0")
        .env("FTREDUCE_VERBOSE", "1")
        .env("FTREDUCE_SEED", "7")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn timing_rounds(output: &Output) -> Vec<u64> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(RoundReport::parse_line)
        .map(|r| r.round)
        .collect()
}

#[test]
fn usage_error_exits_one() {
    let dir = TempDir::new().unwrap();
    let out = ftreduce(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(1));

    let out = ftreduce(dir.path(), &["4", "three", "1"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(timing_rounds(&out).is_empty());
}

#[test]
fn completed_run_exits_zero_with_one_line_per_round() {
    let dir = TempDir::new().unwrap();
    let out = ftreduce(dir.path(), &["4", "3", "1"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut lines = stdout.lines();
    let banner = lines.next().unwrap();
    assert!(banner.starts_with("participant rank 0 out of 1 on "), "{banner}");
    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 3, "{line}");
        assert!(fields[0].parse::<u64>().is_ok());
        assert!(fields[1].parse::<f64>().is_ok());
        assert!(fields[2].parse::<u64>().is_ok());
    }
    assert_eq!(timing_rounds(&out), vec![0, 1, 2]);
}

#[test]
fn injected_fault_exits_one_after_earlier_rounds() {
    let dir = TempDir::new().unwrap();
    let out = ftreduce(dir.path(), &["4", "5", "1", "2"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(timing_rounds(&out), vec![0, 1]);

    let store = CheckpointStore::new(dir.path(), 0);
    assert!(store.exists(1));
    assert!(!store.exists(2));
}

#[test]
fn relaunch_after_fault_resumes_and_exits_zero() {
    let dir = TempDir::new().unwrap();
    let crashed = ftreduce(dir.path(), &["4", "5", "2", "3"]);
    assert_eq!(crashed.status.code(), Some(1));

    let resumed = ftreduce(dir.path(), &["4", "5", "2"]);
    assert_eq!(resumed.status.code(), Some(0));
    assert_eq!(timing_rounds(&resumed), vec![2, 3, 4]);
}

#[test]
fn unreadable_checkpoint_exits_one() {
    let dir = TempDir::new().unwrap();
    let path = CheckpointStore::new(dir.path(), 0).path_for(1);
    std::fs::write(&path, b"not a checkpoint").unwrap();

    let out = ftreduce(dir.path(), &["4", "3", "1"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(timing_rounds(&out).is_empty());
}
