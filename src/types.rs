/// Rank of a participant in the benchmark group (0-indexed).
pub type Rank = u32;

/// Index of a benchmark round.
pub type Round = u64;

/// Reduction operators the harness can ask the collective layer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    #[default]
    Sum = 0,
    /// Leaves the accumulator untouched: every rank receives rank 0's input.
    ///
    /// Used to measure the communication cost without the arithmetic.
    Noop = 1,
}

impl ReduceOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ReduceOp::Sum),
            1 => Some(ReduceOp::Noop),
            _ => None,
        }
    }

    /// Parse the name used in configuration (`sum` / `noop`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(ReduceOp::Sum),
            "noop" | "no-op" => Some(ReduceOp::Noop),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Noop => f.write_str("noop"),
        }
    }
}

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;
