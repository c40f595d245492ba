use super::helpers::{fast_config, run_config, run_local};
use ftreduce::CheckpointStore;
use tempfile::TempDir;

#[tokio::test]
async fn checkpoints_only_at_positive_multiples() {
    let dir = TempDir::new().unwrap();
    let results = run_local(2, run_config(16, 10, 3, None), fast_config(dir.path()), None).await;
    for r in results {
        r.unwrap();
    }

    for rank in 0..2 {
        let store = CheckpointStore::new(dir.path(), rank);
        let present: Vec<u64> = (0..12).filter(|&round| store.exists(round)).collect();
        assert_eq!(present, vec![3, 6, 9], "rank {rank}");
    }
}

#[tokio::test]
async fn no_stray_files_in_checkpoint_dir() {
    let dir = TempDir::new().unwrap();
    let results = run_local(2, run_config(4, 5, 2, None), fast_config(dir.path()), None).await;
    for r in results {
        r.unwrap();
    }

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "ftreduce-checkpoint-0-2",
            "ftreduce-checkpoint-0-4",
            "ftreduce-checkpoint-1-2",
            "ftreduce-checkpoint-1-4",
        ]
    );
}

#[tokio::test]
async fn interval_beyond_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let results = run_local(1, run_config(4, 5, 100, None), fast_config(dir.path()), None).await;
    results.into_iter().for_each(|r| {
        r.unwrap();
    });
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
