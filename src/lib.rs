pub mod checkpoint;
pub mod cluster;
pub mod comm;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod fault;
pub mod logging;
pub mod protocol;
mod reduce;
pub mod round;
pub mod stats;
pub mod transport;
pub mod types;

pub use checkpoint::{CheckpointStore, DiscoveryStrategy};
pub use comm::{Collective, LocalComm, LocalGroup, TcpComm};
pub use config::{HarnessConfig, RunConfig, WriteFailurePolicy};
pub use context::ProcessContext;
pub use controller::{RunController, RunSummary};
pub use error::{FtError, Result};
pub use fault::FaultInjector;
pub use round::{CheckpointOutcome, RoundExecutor, RoundReport};
pub use stats::{LatencyAccumulator, LatencySummary};
pub use types::{Rank, ReduceOp, Round};
