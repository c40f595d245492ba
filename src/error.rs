use crate::types::{Rank, Round};
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FtError>;

#[derive(Debug, thiserror::Error)]
pub enum FtError {
    #[error("{0}")]
    Usage(String),

    #[error("failed to allocate a buffer of {elements} f32 elements")]
    Allocation { elements: usize },

    #[error("failed to read checkpoint for round {round} at {}: {reason}", path.display())]
    CheckpointRead {
        round: Round,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to write checkpoint for round {round} at {}: {reason}", path.display())]
    CheckpointWrite {
        round: Round,
        path: PathBuf,
        reason: String,
    },

    #[error("injected fault at round {round}")]
    InjectedFault { round: Round },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("cluster formation timed out: {joined}/{expected} ranks joined")]
    FormationTimeout { joined: u32, expected: u32 },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FtError {
    /// Create a `CollectiveFailed` error.
    pub fn collective(operation: &'static str, rank: Rank, reason: impl Into<String>) -> Self {
        Self::CollectiveFailed {
            operation,
            rank,
            reason: reason.into(),
        }
    }

    /// True for the designed crash path, which is not a harness failure.
    pub fn is_injected_fault(&self) -> bool {
        matches!(self, Self::InjectedFault { .. })
    }
}
