use crate::checkpoint::CheckpointStore;
use crate::comm::Collective;
use crate::config::WriteFailurePolicy;
use crate::error::Result;
use crate::fault::FaultInjector;
use crate::types::{ReduceOp, Round};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// What happened to the checkpoint of one round.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointOutcome {
    /// The round is not a checkpoint boundary.
    NotDue,
    Written(PathBuf),
    /// The write failed and the run continued.
    Failed(String),
}

/// Timing and checkpoint result of one completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: Round,
    /// Barrier-to-barrier wall time.
    pub elapsed: Duration,
    /// Unix time in milliseconds when the round finished.
    pub emitted_at_ms: u64,
    pub checkpoint: CheckpointOutcome,
}

impl RoundReport {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Parse a timing line written by the `Display` impl.
    ///
    /// The line carries no checkpoint information, so the result reports
    /// [`CheckpointOutcome::NotDue`].
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(',');
        let round = fields.next()?.trim().parse().ok()?;
        let elapsed_ms: f64 = fields.next()?.trim().parse().ok()?;
        let emitted_at_ms = fields.next()?.trim().parse().ok()?;
        if fields.next().is_some() || !elapsed_ms.is_finite() || elapsed_ms < 0.0 {
            return None;
        }
        Some(Self {
            round,
            elapsed: Duration::from_secs_f64(elapsed_ms / 1000.0),
            emitted_at_ms,
            checkpoint: CheckpointOutcome::NotDue,
        })
    }
}

impl std::fmt::Display for RoundReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{:.6},{}",
            self.round,
            self.elapsed_ms(),
            self.emitted_at_ms
        )
    }
}

/// Runs one synchronized round: reduce, maybe crash, maybe checkpoint.
pub struct RoundExecutor<'c> {
    comm: &'c dyn Collective,
    store: CheckpointStore,
    fault: FaultInjector,
    op: ReduceOp,
    checkpoint_interval: Round,
    write_failure: WriteFailurePolicy,
    verbose: bool,
}

impl<'c> RoundExecutor<'c> {
    pub fn new(
        comm: &'c dyn Collective,
        store: CheckpointStore,
        fault: FaultInjector,
        checkpoint_interval: Round,
    ) -> Self {
        Self {
            comm,
            store,
            fault,
            op: ReduceOp::Sum,
            checkpoint_interval,
            write_failure: WriteFailurePolicy::Continue,
            verbose: true,
        }
    }

    pub fn with_op(mut self, op: ReduceOp) -> Self {
        self.op = op;
        self
    }

    pub fn with_write_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure = policy;
        self
    }

    /// Print timing lines on the reporter.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    fn is_checkpoint_round(&self, round: Round) -> bool {
        self.checkpoint_interval > 0 && round > 0 && round % self.checkpoint_interval == 0
    }

    /// Execute `round`.
    ///
    /// On return `input` holds the reduced buffer, ready for the next round.
    /// The checkpoint of a boundary round stores `input` as it was before
    /// the reduction, so resuming from it replays the round exactly.
    pub async fn run_round(
        &self,
        round: Round,
        input: &mut [f32],
        output: &mut [f32],
    ) -> Result<RoundReport> {
        self.comm.barrier().await?;
        let start = Instant::now();

        self.comm.all_reduce(input, output, self.op).await?;
        self.fault.maybe_fail(round).await?;

        let checkpoint = if self.is_checkpoint_round(round) {
            match self.store.save(input, round).await {
                Ok(path) => CheckpointOutcome::Written(path),
                Err(e) if self.write_failure == WriteFailurePolicy::Continue => {
                    tracing::warn!(round, "checkpoint skipped: {e}");
                    CheckpointOutcome::Failed(e.to_string())
                }
                Err(e) => return Err(e),
            }
        } else {
            CheckpointOutcome::NotDue
        };

        self.comm.barrier().await?;
        let elapsed = start.elapsed();

        let report = RoundReport {
            round,
            elapsed,
            emitted_at_ms: unix_millis(),
            checkpoint,
        };
        if self.verbose && self.comm.context().is_reporter() {
            println!("{report}");
        }

        input.copy_from_slice(output);
        Ok(report)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
