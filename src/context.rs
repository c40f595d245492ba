use crate::types::Rank;

/// Rank of the participant that prints per-round timing lines.
pub const REPORTER_RANK: Rank = 0;

/// Identity of this participant within the benchmark group.
///
/// Assigned once by the communication layer and handed to every component
/// at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessContext {
    rank: Rank,
    world_size: u32,
}

impl ProcessContext {
    pub fn new(rank: Rank, world_size: u32) -> Self {
        debug_assert!(rank < world_size, "rank {rank} outside world {world_size}");
        Self { rank, world_size }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Whether this participant emits the timing protocol on stdout.
    pub fn is_reporter(&self) -> bool {
        self.rank == REPORTER_RANK
    }
}

impl std::fmt::Display for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rank {} out of {}", self.rank, self.world_size)
    }
}
