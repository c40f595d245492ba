use super::helpers::{each_rank, fast_config, ramp, run_config, run_group, run_local};
use ftreduce::{Collective, FtError, ReduceOp, TcpComm};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

async fn tcp_group(world_size: u32, dir: &Path) -> Vec<TcpComm> {
    TcpComm::bootstrap_local(world_size, &fast_config(dir))
        .await
        .unwrap()
}

#[tokio::test]
async fn tcp_collectives_across_three_ranks() {
    let dir = TempDir::new().unwrap();
    let results = each_rank(tcp_group(3, dir.path()).await, |c| async move {
        let rank = c.context().rank();
        c.barrier().await.unwrap();

        let input = vec![rank as f32 + 1.0; 5];
        let mut sum = vec![0.0; 5];
        c.all_reduce(&input, &mut sum, ReduceOp::Sum).await.unwrap();

        let mut noop = vec![0.0; 5];
        c.all_reduce(&input, &mut noop, ReduceOp::Noop).await.unwrap();

        let min = c.agree_min(10 - u64::from(rank)).await.unwrap();
        c.barrier().await.unwrap();
        (rank, sum, noop, min)
    })
    .await;

    for (rank, sum, noop, min) in results {
        assert_eq!(sum, vec![6.0; 5], "rank {rank}");
        assert_eq!(noop, vec![1.0; 5], "rank {rank}");
        assert_eq!(min, 8);
    }
}

#[tokio::test]
async fn tcp_context_matches_rank_order() {
    let dir = TempDir::new().unwrap();
    let comms = tcp_group(4, dir.path()).await;
    for (i, c) in comms.iter().enumerate() {
        assert_eq!(c.context().rank(), i as u32);
        assert_eq!(c.context().world_size(), 4);
    }
}

#[tokio::test]
async fn tcp_run_reproduces_the_two_rank_scenario() {
    let dir = TempDir::new().unwrap();
    let harness = fast_config(dir.path());
    let comms = tcp_group(2, dir.path()).await;

    let results = run_group(comms, run_config(4, 3, 1, None), harness, Some(ramp)).await;
    for r in results {
        assert_eq!(r.unwrap().buffer, vec![12.0; 4]);
    }
}

#[tokio::test]
async fn tcp_and_local_groups_agree_bit_for_bit() {
    let tcp_dir = TempDir::new().unwrap();
    let local_dir = TempDir::new().unwrap();
    let run = run_config(100, 6, 2, None);

    let over_tcp = run_group(
        tcp_group(3, tcp_dir.path()).await,
        run,
        fast_config(tcp_dir.path()),
        None,
    )
    .await;
    let in_process = run_local(3, run, fast_config(local_dir.path()), None).await;

    for (a, b) in over_tcp.into_iter().zip(in_process) {
        let (a, b) = (a.unwrap().buffer, b.unwrap().buffer);
        let a_bits: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }
}

#[tokio::test]
async fn departed_peer_fails_the_barrier() {
    let dir = TempDir::new().unwrap();
    let mut comms = tcp_group(3, dir.path()).await;
    drop(comms.pop());

    let results = each_rank(comms, |c| async move { c.barrier().await }).await;
    for r in results {
        assert!(
            matches!(r, Err(FtError::CollectiveFailed { operation: "barrier", .. })),
            "got {r:?}"
        );
    }
}

#[tokio::test]
async fn departed_peer_fails_the_reduction() {
    let dir = TempDir::new().unwrap();
    let mut comms = tcp_group(2, dir.path()).await;
    drop(comms.pop());

    let survivor = comms.pop().unwrap();
    let mut out = vec![0.0; 4];
    let err = survivor
        .all_reduce(&[1.0; 4], &mut out, ReduceOp::Sum)
        .await
        .unwrap_err();
    assert!(matches!(err, FtError::CollectiveFailed { operation: "allreduce", rank: 1, .. }));
}

#[tokio::test]
async fn silent_peer_times_out() {
    let dir = TempDir::new().unwrap();
    let mut harness = fast_config(dir.path());
    harness.barrier_timeout = Duration::from_millis(200);
    let comms = TcpComm::bootstrap_local(2, &harness).await.unwrap();

    // Rank 1 stays connected but never enters the barrier.
    let started = std::time::Instant::now();
    let err = comms[0].barrier().await.unwrap_err();
    assert!(matches!(err, FtError::CollectiveFailed { operation: "barrier", rank: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn small_frames_reduce_bit_for_bit() {
    let tcp_dir = TempDir::new().unwrap();
    let local_dir = TempDir::new().unwrap();
    let run = run_config(100, 4, 2, None);

    // 100 values over 7-value frames: 15 frames per contribution.
    let mut chunked = fast_config(tcp_dir.path());
    chunked.frame_values = 7;
    let comms = TcpComm::bootstrap_local(3, &chunked).await.unwrap();

    let over_tcp = run_group(comms, run, chunked, None).await;
    let in_process = run_local(3, run, fast_config(local_dir.path()), None).await;

    for (a, b) in over_tcp.into_iter().zip(in_process) {
        let (a, b) = (a.unwrap().buffer, b.unwrap().buffer);
        let a_bits: Vec<u32> = a.iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }
}

#[tokio::test]
async fn small_frames_carry_uneven_tail() {
    let dir = TempDir::new().unwrap();
    let mut harness = fast_config(dir.path());
    harness.frame_values = 4;
    let comms = TcpComm::bootstrap_local(2, &harness).await.unwrap();

    let results = each_rank(comms, |c| async move {
        let rank = c.context().rank() as f32;
        let input: Vec<f32> = (0..10).map(|i| i as f32 + rank * 100.0).collect();
        let mut out = vec![0.0; 10];
        c.all_reduce(&input, &mut out, ReduceOp::Sum).await.unwrap();
        out
    })
    .await;

    let expected: Vec<f32> = (0..10).map(|i| 2.0 * i as f32 + 100.0).collect();
    for out in results {
        assert_eq!(out, expected);
    }
}
