//! Group communication used by the round loop.
//!
//! Every operation is collective: all participants call it in the same
//! order and it completes only once each of them has arrived.

mod local;
mod tcp;

pub use local::{LocalComm, LocalGroup};
pub use tcp::TcpComm;

use crate::config::HarnessConfig;
use crate::context::ProcessContext;
use crate::error::{FtError, Result};
use crate::types::ReduceOp;
use futures::future::BoxFuture;

/// Collective operations over a fixed group of participants.
///
/// Implementations bound every wait by the timeouts in [`HarnessConfig`]
/// and report [`FtError::CollectiveFailed`] when a peer leaves or stalls.
pub trait Collective: Send + Sync {
    /// Identity of the calling participant.
    fn context(&self) -> ProcessContext;

    /// Block until every participant has reached this point.
    fn barrier(&self) -> BoxFuture<'_, Result<()>>;

    /// Reduce `input` element-wise across all participants into `output`.
    ///
    /// Contributions are folded in rank order, so every participant observes
    /// bit-identical results. `input` and `output` must have the same length
    /// at every participant.
    fn all_reduce<'a>(
        &'a self,
        input: &'a [f32],
        output: &'a mut [f32],
        op: ReduceOp,
    ) -> BoxFuture<'a, Result<()>>;

    /// Return the minimum of `value` over all participants.
    fn agree_min(&self, value: u64) -> BoxFuture<'_, Result<u64>>;
}

/// Join the group described by `config`.
///
/// A single participant needs no network and runs on an in-process group.
pub async fn connect(config: &HarnessConfig) -> Result<Box<dyn Collective>> {
    config.validate()?;
    if config.world_size == 1 {
        let comm = LocalGroup::new(1, config)
            .pop()
            .ok_or_else(|| FtError::collective("connect", 0, "empty local group"))?;
        return Ok(Box::new(comm));
    }
    let comm = TcpComm::connect(config).await?;
    Ok(Box::new(comm))
}

/// Check that an all-reduce call has matching buffer sizes.
fn check_lengths(
    operation: &'static str,
    ctx: ProcessContext,
    input: &[f32],
    output: &[f32],
) -> Result<()> {
    if input.len() != output.len() {
        return Err(FtError::collective(
            operation,
            ctx.rank(),
            format!(
                "input has {} elements but output has {}",
                input.len(),
                output.len()
            ),
        ));
    }
    Ok(())
}
