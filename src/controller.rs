use crate::checkpoint::{CheckpointStore, latest_resumable_round};
use crate::comm::Collective;
use crate::config::{HarnessConfig, RunConfig};
use crate::error::{FtError, Result};
use crate::fault::FaultInjector;
use crate::round::{CheckpointOutcome, RoundExecutor, RoundReport};
use crate::stats::{LatencyAccumulator, LatencySummary};
use crate::types::{Rank, Round};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of a run that reached its last round.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Round the run resumed at; 0 for a fresh start.
    pub start_round: Round,
    /// Rounds executed by this incarnation.
    pub rounds: u64,
    /// `None` when no round was executed.
    pub latency: Option<LatencySummary>,
    pub last_report: Option<RoundReport>,
    /// Data buffer after the last round.
    pub buffer: Vec<f32>,
    /// Checkpoints that could not be written but were tolerated.
    pub failed_checkpoints: usize,
}

/// Drives one participant through a whole benchmark run.
///
/// Starts from a fresh random buffer, or from the latest checkpoint every
/// participant holds when a previous incarnation left some behind.
pub struct RunController<'c> {
    comm: &'c dyn Collective,
    run: RunConfig,
    harness: HarnessConfig,
    initial: Option<Vec<f32>>,
}

impl<'c> RunController<'c> {
    pub fn new(comm: &'c dyn Collective, run: RunConfig, harness: HarnessConfig) -> Self {
        Self {
            comm,
            run,
            harness,
            initial: None,
        }
    }

    /// Start from `buffer` instead of random data.
    ///
    /// A checkpoint found at startup still takes precedence.
    pub fn with_initial_buffer(mut self, buffer: Vec<f32>) -> Self {
        self.initial = Some(buffer);
        self
    }

    pub async fn run(self) -> Result<RunSummary> {
        let ctx = self.comm.context();
        let n = self.run.num_elements_per_proc;
        let store = CheckpointStore::new(&self.harness.checkpoint_dir, ctx.rank());

        let mut buffer = match self.initial {
            Some(buffer) if buffer.len() == n => buffer,
            Some(buffer) => {
                return Err(FtError::Usage(format!(
                    "initial buffer holds {} elements, expected {n}",
                    buffer.len()
                )));
            }
            None => {
                let seed = self.harness.seed.unwrap_or_else(|| clock_seed(ctx.rank()));
                random_buffer(n, seed)?
            }
        };
        let mut output = zeroed(n)?;

        let local = latest_resumable_round(
            |round| store.exists(round),
            self.run.checkpoint_interval,
            self.harness.discovery,
        );
        let start_round = self.comm.agree_min(local).await?;
        if start_round != local {
            tracing::info!(
                local,
                agreed = start_round,
                "a peer holds fewer checkpoints; resuming from the common round"
            );
        }
        if start_round > 0 {
            buffer = store.load(start_round, n).await?;
        }
        tracing::info!(rank = ctx.rank(), "starting from round {start_round}");

        let executor = RoundExecutor::new(
            self.comm,
            store,
            FaultInjector::new(self.run.fail_at, self.harness.fail_delay),
            self.run.checkpoint_interval,
        )
        .with_op(self.harness.reduce_op)
        .with_write_failure(self.harness.write_failure)
        .with_verbose(self.harness.verbose);

        let mut latency = LatencyAccumulator::default();
        let mut last_report = None;
        let mut failed_checkpoints = 0;
        for round in start_round..self.run.num_rounds {
            let report = executor.run_round(round, &mut buffer, &mut output).await?;
            if matches!(report.checkpoint, CheckpointOutcome::Failed(_)) {
                failed_checkpoints += 1;
            }
            latency.record(&report);
            last_report = Some(report);
        }

        self.comm.barrier().await?;

        let latency = latency.finish();
        if ctx.is_reporter() {
            match &latency {
                Some(summary) => tracing::info!("{summary}"),
                None => tracing::info!("no rounds executed"),
            }
        }
        if failed_checkpoints > 0 {
            tracing::warn!(failed_checkpoints, "run finished with missing checkpoints");
        }

        Ok(RunSummary {
            start_round,
            rounds: self.run.num_rounds.saturating_sub(start_round),
            latency,
            last_report,
            buffer,
            failed_checkpoints,
        })
    }
}

fn clock_seed(rank: Rank) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    now ^ u64::from(rank).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn zeroed(elements: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| FtError::Allocation { elements })?;
    buf.resize(elements, 0.0);
    Ok(buf)
}

/// Uniform values in `[0, 1)` from a seeded generator.
fn random_buffer(elements: usize, seed: u64) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| FtError::Allocation { elements })?;
    let mut rng = StdRng::seed_from_u64(seed);
    buf.extend((0..elements).map(|_| rng.gen_range(0.0f32..1.0)));
    Ok(buf)
}
