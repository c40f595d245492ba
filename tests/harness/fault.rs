use super::helpers::{fast_config, run_config, run_local};
use ftreduce::{CheckpointStore, FtError, LocalGroup, RunConfig, RunController};
use tempfile::TempDir;

#[tokio::test]
async fn crash_on_boundary_leaves_that_checkpoint_absent() {
    let dir = TempDir::new().unwrap();
    let results = run_local(2, run_config(4, 10, 2, Some(4)), fast_config(dir.path()), None).await;
    for r in results {
        assert!(matches!(r, Err(FtError::InjectedFault { round: 4 })));
    }

    for rank in 0..2 {
        let store = CheckpointStore::new(dir.path(), rank);
        assert!(store.exists(2));
        assert!(!store.exists(4), "rank {rank} wrote the crash round's checkpoint");
        assert!(!store.exists(6));
    }
}

#[tokio::test]
async fn crash_between_boundaries_keeps_earlier_checkpoints() {
    let dir = TempDir::new().unwrap();
    let results = run_local(2, run_config(4, 10, 3, Some(5)), fast_config(dir.path()), None).await;
    for r in results {
        assert!(r.unwrap_err().is_injected_fault());
    }
    for rank in 0..2 {
        let store = CheckpointStore::new(dir.path(), rank);
        let present: Vec<u64> = (0..10).filter(|&round| store.exists(round)).collect();
        assert_eq!(present, vec![3]);
    }
}

#[tokio::test]
async fn fail_at_beyond_last_round_never_fires() {
    let dir = TempDir::new().unwrap();
    let results = run_local(2, run_config(4, 3, 1, Some(3)), fast_config(dir.path()), None).await;
    for r in results {
        assert_eq!(r.unwrap().rounds, 3);
    }
}

#[tokio::test]
async fn resumed_run_does_not_crash_at_replayed_round_without_fail_at() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(dir.path());

    let first = run_local(2, run_config(4, 6, 2, Some(3)), harness.clone(), None).await;
    assert!(first.iter().all(|r| matches!(r, Err(FtError::InjectedFault { round: 3 }))));

    let second = run_local(2, run_config(4, 6, 2, None), harness, None).await;
    for r in second {
        let summary = r.unwrap();
        assert_eq!(summary.start_round, 2);
        assert_eq!(summary.rounds, 4);
    }
}

#[tokio::test]
async fn huge_round_count_still_crashes_on_schedule() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(dir.path());
    let run = RunConfig::from_args(["4", "18446744073709551615", "1000000", "2"]).unwrap();
    let comm = LocalGroup::new(1, &harness).pop().unwrap();

    let err = RunController::new(&comm, run, harness).run().await.unwrap_err();
    assert!(matches!(err, FtError::InjectedFault { round: 2 }));
}
