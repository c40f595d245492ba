//! Startup discovery of the round a participant can resume from.
//!
//! Checkpoints are written at every positive multiple of the interval in
//! increasing order, so the persisted set is always a contiguous prefix
//! `interval, 2*interval, .., m*interval`. Discovery finds `m*interval`.

use crate::types::Round;

/// How discovery looks for existing checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryStrategy {
    /// Check every multiple in order. One lookup per checkpoint.
    #[default]
    Linear,
    /// Exponential search followed by binary search. O(log m) lookups.
    Galloping,
}

impl DiscoveryStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "galloping" | "gallop" => Some(Self::Galloping),
            _ => None,
        }
    }
}

/// Highest round `k * interval` such that every multiple up to it has a
/// checkpoint, or 0 if there is none.
///
/// `exists` is the presence check, usually [`CheckpointStore::exists`].
///
/// [`CheckpointStore::exists`]: crate::checkpoint::CheckpointStore::exists
pub fn latest_resumable_round<F>(exists: F, interval: Round, strategy: DiscoveryStrategy) -> Round
where
    F: Fn(Round) -> bool,
{
    if interval == 0 {
        return 0;
    }
    let present = |k: u64| k.checked_mul(interval).is_some_and(&exists);
    let k = match strategy {
        DiscoveryStrategy::Linear => linear_scan(present),
        DiscoveryStrategy::Galloping => galloping_search(present),
    };
    k * interval
}

fn linear_scan(present: impl Fn(u64) -> bool) -> u64 {
    let mut k = 0u64;
    while present(k + 1) {
        k += 1;
    }
    k
}

fn galloping_search(present: impl Fn(u64) -> bool) -> u64 {
    if !present(1) {
        return 0;
    }
    // Invariant: present(lo) holds, present(hi) does not (or hi is out of range).
    let mut lo = 1u64;
    let mut hi = loop {
        let next = lo.saturating_mul(2);
        if next == lo {
            return lo;
        }
        if present(next) {
            lo = next;
        } else {
            break next;
        }
    };
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if present(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}
