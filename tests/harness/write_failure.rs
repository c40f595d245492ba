use super::helpers::{fast_config, ramp, run_config, run_local};
use ftreduce::{CheckpointOutcome, FtError, WriteFailurePolicy};
use tempfile::TempDir;

#[tokio::test]
async fn continue_policy_finishes_the_run() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(&dir.path().join("missing"));

    let results = run_local(2, run_config(4, 3, 1, None), harness, Some(ramp)).await;
    for r in results {
        let summary = r.unwrap();
        assert_eq!(summary.failed_checkpoints, 2);
        assert_eq!(summary.buffer, vec![12.0; 4]);
        let last = summary.last_report.unwrap();
        assert!(matches!(last.checkpoint, CheckpointOutcome::Failed(_)));
    }
}

#[tokio::test]
async fn abort_policy_stops_at_first_failed_write() {
    let dir = TempDir::new().unwrap();
    let mut harness = fast_config(&dir.path().join("missing"));
    harness.write_failure = WriteFailurePolicy::Abort;

    let results = run_local(2, run_config(4, 3, 1, None), harness, None).await;
    for r in results {
        assert!(matches!(r, Err(FtError::CheckpointWrite { round: 1, .. })));
    }
}
