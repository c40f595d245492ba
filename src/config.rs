//! Run parameters and environment-tunable harness settings.
//!
//! `RunConfig` holds the four positional CLI parameters. `HarnessConfig`
//! holds everything else. All of its values have defaults; override them
//! via environment variables (prefixed `FTREDUCE_`) or by constructing a
//! custom `HarnessConfig`.

use crate::checkpoint::DiscoveryStrategy;
use crate::error::{FtError, Result};
use crate::protocol::header::MAX_FRAME_VALUES;
use crate::types::{Rank, ReduceOp, Round};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const USAGE: &str =
    "usage: ftreduce <num_elements_per_proc> <num_rounds> <checkpoint_interval> [<fail_at>]";

/// The four numeric parameters of a run. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub num_elements_per_proc: usize,
    pub num_rounds: Round,
    pub checkpoint_interval: Round,
    /// Round at which the fault injector terminates this participant.
    pub fail_at: Option<Round>,
}

impl RunConfig {
    /// Parse positional arguments (without the program name).
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_owned()).collect();
        if args.len() != 3 && args.len() != 4 {
            return Err(FtError::Usage(USAGE.to_owned()));
        }

        let num_elements_per_proc: usize = parse_arg(&args[0], "num_elements_per_proc")?;
        let num_rounds: Round = parse_arg(&args[1], "num_rounds")?;
        let checkpoint_interval: Round = parse_arg(&args[2], "checkpoint_interval")?;
        let fail_at = match args.get(3) {
            Some(raw) => {
                let v: i64 = parse_arg(raw, "fail_at")?;
                (v > 0).then_some(v as Round)
            }
            None => None,
        };

        if num_elements_per_proc == 0 {
            return Err(FtError::Usage(format!(
                "num_elements_per_proc must be positive\n{USAGE}"
            )));
        }
        if checkpoint_interval == 0 {
            return Err(FtError::Usage(format!(
                "checkpoint_interval must be positive\n{USAGE}"
            )));
        }

        Ok(Self {
            num_elements_per_proc,
            num_rounds,
            checkpoint_interval,
            fail_at,
        })
    }
}

fn parse_arg<T: std::str::FromStr>(raw: &str, name: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FtError::Usage(format!("invalid {name}: {raw:?}\n{USAGE}")))
}

/// What to do when a checkpoint cannot be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailurePolicy {
    /// Log a warning, count the failure and keep running.
    #[default]
    Continue,
    /// Stop the run with the write error.
    Abort,
}

impl WriteFailurePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "continue" | "warn" => Some(Self::Continue),
            "abort" | "fail" => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Tuning parameters for the harness and its communication layer.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// This participant's rank, as assigned by the launcher.
    pub rank: Rank,

    /// Number of participants.
    pub world_size: u32,

    /// Address rank 0 listens on and the other ranks connect to.
    pub coordinator: SocketAddr,

    /// Directory holding checkpoint files.
    pub checkpoint_dir: PathBuf,

    /// Reduction operator for every round.
    pub reduce_op: ReduceOp,

    /// Explicit seed for the initial buffer. `None` derives one from the
    /// wall clock and the rank.
    pub seed: Option<u64>,

    /// Delay before an injected fault terminates the participant.
    pub fail_delay: Duration,

    /// Emit per-round timing lines on the reporter.
    pub verbose: bool,

    /// Reaction to checkpoint write failures.
    pub write_failure: WriteFailurePolicy,

    /// How checkpoint discovery searches for the resume round.
    pub discovery: DiscoveryStrategy,

    /// Timeout for barrier operations.
    pub barrier_timeout: Duration,

    /// Timeout for all-reduce and agreement operations.
    pub collective_timeout: Duration,

    /// How long rank 0 waits for every other rank to join.
    pub formation_timeout: Duration,

    /// Largest number of values sent in one TCP frame. Bigger buffers are
    /// split across frames.
    pub frame_values: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rank: 0,
            world_size: 1,
            coordinator: SocketAddr::from(([127, 0, 0, 1], 29500)),
            checkpoint_dir: std::env::temp_dir(),
            reduce_op: ReduceOp::Sum,
            seed: None,
            fail_delay: Duration::from_secs(2),
            verbose: true,
            write_failure: WriteFailurePolicy::Continue,
            discovery: DiscoveryStrategy::Linear,
            barrier_timeout: Duration::from_secs(300),
            collective_timeout: Duration::from_secs(300),
            formation_timeout: Duration::from_secs(60),
            frame_values: MAX_FRAME_VALUES,
        }
    }
}

impl HarnessConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `FTREDUCE_RANK` (or `OMPI_COMM_WORLD_RANK`, `PMI_RANK`)
    /// - `FTREDUCE_WORLD_SIZE` (or `OMPI_COMM_WORLD_SIZE`, `PMI_SIZE`)
    /// - `FTREDUCE_COORDINATOR`
    /// - `FTREDUCE_CHECKPOINT_DIR`
    /// - `FTREDUCE_REDUCE_OP`
    /// - `FTREDUCE_SEED`
    /// - `FTREDUCE_FAIL_DELAY_MS`
    /// - `FTREDUCE_VERBOSE`
    /// - `FTREDUCE_ON_WRITE_ERROR`
    /// - `FTREDUCE_DISCOVERY`
    /// - `FTREDUCE_BARRIER_TIMEOUT_SECS`
    /// - `FTREDUCE_COLLECTIVE_TIMEOUT_SECS`
    /// - `FTREDUCE_FORMATION_TIMEOUT_SECS`
    /// - `FTREDUCE_FRAME_VALUES`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k));

        if let Some(v) = first(&["FTREDUCE_RANK", "OMPI_COMM_WORLD_RANK", "PMI_RANK"]) {
            if let Ok(r) = v.trim().parse::<Rank>() {
                cfg.rank = r;
            }
        }
        if let Some(v) = first(&["FTREDUCE_WORLD_SIZE", "OMPI_COMM_WORLD_SIZE", "PMI_SIZE"]) {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.world_size = n;
            }
        }
        if let Some(v) = lookup("FTREDUCE_COORDINATOR") {
            if let Ok(addr) = v.trim().parse::<SocketAddr>() {
                cfg.coordinator = addr;
            }
        }
        if let Some(v) = lookup("FTREDUCE_CHECKPOINT_DIR") {
            if !v.trim().is_empty() {
                cfg.checkpoint_dir = PathBuf::from(v.trim());
            }
        }
        if let Some(v) = lookup("FTREDUCE_REDUCE_OP") {
            if let Some(op) = ReduceOp::from_name(&v) {
                cfg.reduce_op = op;
            }
        }
        if let Some(v) = lookup("FTREDUCE_SEED") {
            if let Ok(s) = v.trim().parse::<u64>() {
                cfg.seed = Some(s);
            }
        }
        if let Some(v) = lookup("FTREDUCE_FAIL_DELAY_MS") {
            if let Ok(ms) = v.trim().parse::<u64>() {
                cfg.fail_delay = Duration::from_millis(ms);
            }
        }
        if let Some(v) = lookup("FTREDUCE_VERBOSE") {
            cfg.verbose = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(v) = lookup("FTREDUCE_ON_WRITE_ERROR") {
            if let Some(p) = WriteFailurePolicy::from_name(&v) {
                cfg.write_failure = p;
            }
        }
        if let Some(v) = lookup("FTREDUCE_DISCOVERY") {
            if let Some(s) = DiscoveryStrategy::from_name(&v) {
                cfg.discovery = s;
            }
        }
        if let Some(v) = lookup("FTREDUCE_BARRIER_TIMEOUT_SECS") {
            if let Ok(s) = v.trim().parse::<u64>() {
                cfg.barrier_timeout = Duration::from_secs(s);
            }
        }
        if let Some(v) = lookup("FTREDUCE_COLLECTIVE_TIMEOUT_SECS") {
            if let Ok(s) = v.trim().parse::<u64>() {
                cfg.collective_timeout = Duration::from_secs(s);
            }
        }
        if let Some(v) = lookup("FTREDUCE_FORMATION_TIMEOUT_SECS") {
            if let Ok(s) = v.trim().parse::<u64>() {
                cfg.formation_timeout = Duration::from_secs(s);
            }
        }
        if let Some(v) = lookup("FTREDUCE_FRAME_VALUES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if (1..=MAX_FRAME_VALUES).contains(&n) {
                    cfg.frame_values = n;
                }
            }
        }

        cfg
    }

    /// Reject identity assignments the launcher got wrong.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(FtError::Usage("world size must be at least 1".into()));
        }
        if self.rank >= self.world_size {
            return Err(FtError::Usage(format!(
                "rank {} is outside world size {}",
                self.rank, self.world_size
            )));
        }
        Ok(())
    }
}
