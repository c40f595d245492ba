use super::helpers::{fast_config, run_config, run_local};
use tempfile::TempDir;

const ELEMENTS: usize = 64;
const ROUNDS: u64 = 9;
const INTERVAL: u64 = 2;

async fn continuous() -> Vec<Vec<f32>> {
    let dir = TempDir::new().unwrap();
    run_local(3, run_config(ELEMENTS, ROUNDS, INTERVAL, None), fast_config(dir.path()), None)
        .await
        .into_iter()
        .map(|r| r.unwrap().buffer)
        .collect()
}

#[tokio::test]
async fn interrupted_runs_match_continuous_run() {
    let expected = continuous().await;

    for fail_at in 1..ROUNDS {
        let dir = TempDir::new().unwrap();
        let harness = fast_config(dir.path());

        let crashed = run_local(
            3,
            run_config(ELEMENTS, ROUNDS, INTERVAL, Some(fail_at)),
            harness.clone(),
            None,
        )
        .await;
        assert!(crashed.iter().all(|r| r.as_ref().is_err_and(|e| e.is_injected_fault())));

        let run = run_config(ELEMENTS, ROUNDS, INTERVAL, None);
        let resumed = run_local(3, run, harness, None).await;
        for (rank, r) in resumed.into_iter().enumerate() {
            let summary = r.unwrap();
            let boundary = (fail_at - 1) / INTERVAL * INTERVAL;
            assert_eq!(summary.start_round, boundary, "fail_at {fail_at}");
            assert_eq!(
                summary.buffer, expected[rank],
                "rank {rank} diverged after crash at round {fail_at}"
            );
        }
    }
}

#[tokio::test]
async fn resume_after_complete_run_replays_last_boundary() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(dir.path());
    let run = run_config(8, 5, 2, None);

    let first: Vec<_> = run_local(2, run, harness.clone(), None)
        .await
        .into_iter()
        .map(|r| r.unwrap().buffer)
        .collect();
    let second = run_local(2, run, harness, None).await;
    for (rank, r) in second.into_iter().enumerate() {
        let summary = r.unwrap();
        assert_eq!(summary.start_round, 4);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.buffer, first[rank]);
    }
}
