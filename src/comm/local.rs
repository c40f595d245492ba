use super::{Collective, check_lengths};
use crate::config::HarnessConfig;
use crate::context::ProcessContext;
use crate::error::{FtError, Result};
use crate::reduce::fold_ordered;
use crate::types::ReduceOp;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, Mutex};

/// State shared by every participant of one in-process group.
struct Shared {
    barrier: Barrier,
    /// One contribution slot per rank, overwritten by every all-reduce.
    slots: Mutex<Vec<Vec<f32>>>,
    proposals: Mutex<Vec<u64>>,
}

/// Factory for in-process groups.
pub struct LocalGroup;

impl LocalGroup {
    /// Create `world_size` participants, returned in rank order.
    ///
    /// Each one is meant to be driven by its own task.
    pub fn new(world_size: u32, config: &HarnessConfig) -> Vec<LocalComm> {
        let n = world_size as usize;
        let shared = Arc::new(Shared {
            barrier: Barrier::new(n),
            slots: Mutex::new(vec![Vec::new(); n]),
            proposals: Mutex::new(vec![0; n]),
        });
        (0..world_size)
            .map(|rank| LocalComm {
                ctx: ProcessContext::new(rank, world_size),
                shared: Arc::clone(&shared),
                barrier_timeout: config.barrier_timeout,
                collective_timeout: config.collective_timeout,
            })
            .collect()
    }
}

/// One participant of a [`LocalGroup`].
pub struct LocalComm {
    ctx: ProcessContext,
    shared: Arc<Shared>,
    barrier_timeout: Duration,
    collective_timeout: Duration,
}

impl LocalComm {
    async fn rendezvous(&self, operation: &'static str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.shared.barrier.wait())
            .await
            .map(|_| ())
            .map_err(|_| {
                FtError::collective(
                    operation,
                    self.ctx.rank(),
                    format!("timed out waiting for peers after {}ms", timeout.as_millis()),
                )
            })
    }

    async fn reduce(&self, input: &[f32], output: &mut [f32], op: ReduceOp) -> Result<()> {
        check_lengths("allreduce", self.ctx, input, output)?;
        let rank = self.ctx.rank() as usize;
        {
            let mut slots = self.shared.slots.lock().await;
            slots[rank].clear();
            slots[rank].extend_from_slice(input);
        }
        self.rendezvous("allreduce", self.collective_timeout).await?;

        {
            let slots = self.shared.slots.lock().await;
            if let Some((r, slot)) = slots
                .iter()
                .enumerate()
                .find(|(_, s)| s.len() != output.len())
            {
                return Err(FtError::collective(
                    "allreduce",
                    r as u32,
                    format!(
                        "contributed {} elements, expected {}",
                        slot.len(),
                        output.len()
                    ),
                ));
            }
            fold_ordered(output, slots.iter().map(Vec::as_slice), op);
        }

        // Nobody may overwrite a slot before every participant has read it.
        self.rendezvous("allreduce", self.collective_timeout).await
    }

    async fn min(&self, value: u64) -> Result<u64> {
        self.shared.proposals.lock().await[self.ctx.rank() as usize] = value;
        self.rendezvous("agree_min", self.collective_timeout).await?;
        let agreed = self
            .shared
            .proposals
            .lock()
            .await
            .iter()
            .copied()
            .min()
            .unwrap_or(value);
        self.rendezvous("agree_min", self.collective_timeout).await?;
        Ok(agreed)
    }
}

impl Collective for LocalComm {
    fn context(&self) -> ProcessContext {
        self.ctx
    }

    fn barrier(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.rendezvous("barrier", self.barrier_timeout))
    }

    fn all_reduce<'a>(
        &'a self,
        input: &'a [f32],
        output: &'a mut [f32],
        op: ReduceOp,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.reduce(input, output, op))
    }

    fn agree_min(&self, value: u64) -> BoxFuture<'_, Result<u64>> {
        Box::pin(self.min(value))
    }
}
