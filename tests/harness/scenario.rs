use super::helpers::{fast_config, ramp, run_config, run_local};
use ftreduce::{CheckpointOutcome, CheckpointStore};
use tempfile::TempDir;

#[tokio::test]
async fn two_ranks_three_rounds_interval_one() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(dir.path());
    let run = run_config(4, 3, 1, None);

    let results = run_local(2, run, harness, Some(ramp)).await;
    for (rank, result) in results.into_iter().enumerate() {
        let summary = result.unwrap();
        assert_eq!(summary.start_round, 0);
        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.buffer, vec![12.0; 4]);
        assert_eq!(summary.failed_checkpoints, 0);

        let last = summary.last_report.unwrap();
        assert_eq!(last.round, 2);
        assert!(matches!(last.checkpoint, CheckpointOutcome::Written(_)));

        let store = CheckpointStore::new(dir.path(), rank as u32);
        assert!(!store.exists(0));
        assert_eq!(store.load(1, 4).await.unwrap(), vec![3.0; 4]);
        assert_eq!(store.load(2, 4).await.unwrap(), vec![6.0; 4]);
    }
}

#[tokio::test]
async fn summary_counts_every_round() {
    let dir = TempDir::new().unwrap();
    let results = run_local(3, run_config(8, 5, 2, None), fast_config(dir.path()), None).await;
    for result in results {
        let summary = result.unwrap();
        assert_eq!(summary.rounds, 5);
        assert_eq!(summary.latency.unwrap().rounds, 5);
        assert_eq!(summary.last_report.unwrap().round, 4);
    }
}

#[tokio::test]
async fn all_ranks_end_with_identical_buffers() {
    let dir = TempDir::new().unwrap();
    let results = run_local(4, run_config(32, 6, 3, None), fast_config(dir.path()), None).await;
    let buffers: Vec<Vec<f32>> = results.into_iter().map(|r| r.unwrap().buffer).collect();
    for b in &buffers[1..] {
        assert_eq!(b, &buffers[0]);
    }
}

#[tokio::test]
async fn zero_rounds_is_a_clean_run() {
    let dir = TempDir::new().unwrap();
    let run = run_config(4, 0, 1, None);
    let results = run_local(2, run, fast_config(dir.path()), Some(ramp)).await;
    for (rank, result) in results.into_iter().enumerate() {
        let summary = result.unwrap();
        assert_eq!(summary.rounds, 0);
        assert!(summary.latency.is_none());
        assert!(summary.last_report.is_none());
        assert_eq!(summary.buffer, ramp(rank as u32, 4));
    }
}
