use super::{Collective, check_lengths};
use crate::cluster::{self, Coordinator};
use crate::config::HarnessConfig;
use crate::context::ProcessContext;
use crate::error::{FtError, Result};
use crate::protocol::WireMessage;
use crate::reduce::fold_ordered;
use crate::transport::PeerConnection;
use crate::types::{Rank, ReduceOp};
use futures::future::{BoxFuture, try_join_all};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Star-topology group over TCP.
///
/// Rank 0 coordinates every collective: members send it their part and it
/// answers with the combined result. One epoch counter is advanced per
/// collective call so a stale or reordered frame is caught immediately.
pub struct TcpComm {
    ctx: ProcessContext,
    role: Role,
    epoch: AtomicU64,
    barrier_timeout: Duration,
    collective_timeout: Duration,
}

enum Role {
    /// Connections to ranks `1..world_size`, in rank order.
    Coordinator(Vec<PeerConnection>),
    Member(PeerConnection),
}

impl TcpComm {
    /// Form the group described by `config`.
    ///
    /// Rank 0 listens on `config.coordinator`; every other rank connects to it.
    pub async fn connect(config: &HarnessConfig) -> Result<Self> {
        config.validate()?;
        let role = if config.rank == 0 {
            let coordinator = Coordinator::bind(config.coordinator, config.world_size)
                .await?
                .with_formation_timeout(config.formation_timeout);
            tracing::info!(
                addr = %config.coordinator,
                world_size = config.world_size,
                "waiting for members"
            );
            Role::Coordinator(coordinator.form_group().await?)
        } else {
            Role::Member(
                cluster::join(
                    config.coordinator,
                    config.rank,
                    config.world_size,
                    config.formation_timeout,
                )
                .await?,
            )
        };
        Ok(Self::from_role(config, config.rank, config.world_size, role))
    }

    /// Form a loopback group of `world_size` participants inside this process.
    ///
    /// The coordinator binds an ephemeral port on 127.0.0.1; `config.rank`
    /// and `config.coordinator` are ignored. Returned in rank order.
    pub async fn bootstrap_local(world_size: u32, config: &HarnessConfig) -> Result<Vec<Self>> {
        if world_size == 0 {
            return Err(FtError::Usage("world size must be positive".into()));
        }
        let coordinator = Coordinator::bind(([127, 0, 0, 1], 0).into(), world_size)
            .await?
            .with_formation_timeout(config.formation_timeout);
        let addr = coordinator.local_addr()?;

        let joins = (1..world_size)
            .map(|rank| cluster::join(addr, rank, world_size, config.formation_timeout));
        let (members, links) = tokio::try_join!(coordinator.form_group(), try_join_all(joins))?;

        let mut comms = Vec::with_capacity(world_size as usize);
        comms.push(Self::from_role(config, 0, world_size, Role::Coordinator(members)));
        for (rank, link) in (1..world_size).zip(links) {
            comms.push(Self::from_role(config, rank, world_size, Role::Member(link)));
        }
        Ok(comms)
    }

    fn from_role(config: &HarnessConfig, rank: Rank, world_size: u32, mut role: Role) -> Self {
        match &mut role {
            Role::Coordinator(members) => {
                for conn in members {
                    conn.set_max_frame_values(config.frame_values);
                }
            }
            Role::Member(conn) => conn.set_max_frame_values(config.frame_values),
        }
        Self {
            ctx: ProcessContext::new(rank, world_size),
            role,
            epoch: AtomicU64::new(0),
            barrier_timeout: config.barrier_timeout,
            collective_timeout: config.collective_timeout,
        }
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::Relaxed)
    }

    async fn two_phase_barrier(&self) -> Result<()> {
        let epoch = self.next_epoch();
        let timeout = self.barrier_timeout;
        match &self.role {
            Role::Coordinator(members) => {
                for conn in members {
                    match recv(conn, "barrier", timeout).await? {
                        WireMessage::Barrier { epoch: e } if e == epoch => {}
                        other => {
                            return Err(unexpected("barrier", conn.rank, "Barrier", epoch, &other));
                        }
                    }
                }
                let ack = WireMessage::BarrierAck { epoch };
                for conn in members {
                    send(conn, "barrier", conn.send_message(&ack)).await?;
                }
            }
            Role::Member(conn) => {
                let arrived = WireMessage::Barrier { epoch };
                send(conn, "barrier", conn.send_message(&arrived)).await?;
                match recv(conn, "barrier", timeout).await? {
                    WireMessage::BarrierAck { epoch: e } if e == epoch => {}
                    other => {
                        return Err(unexpected("barrier", conn.rank, "BarrierAck", epoch, &other));
                    }
                }
            }
        }
        Ok(())
    }

    async fn reduce(&self, input: &[f32], output: &mut [f32], op: ReduceOp) -> Result<()> {
        check_lengths("allreduce", self.ctx, input, output)?;
        let epoch = self.next_epoch();
        let count = output.len() as u64;
        let timeout = self.collective_timeout;

        match &self.role {
            Role::Coordinator(members) => {
                let mut contributions = Vec::with_capacity(members.len());
                for conn in members {
                    let values = tokio::time::timeout(timeout, async {
                        match conn.recv_message().await? {
                            WireMessage::Contribute { epoch: e, op: o, count: c }
                                if e == epoch && o == op as u8 && c == count =>
                            {
                                conn.recv_values(count as usize).await
                            }
                            other => Err(FtError::DecodeFailed(format!(
                                "expected Contribute(epoch={epoch}, op={op}, count={count}), got {other:?}"
                            ))),
                        }
                    })
                    .await
                    .map_err(|_| timed_out("allreduce", conn.rank, timeout))?
                    .map_err(|e| FtError::collective("allreduce", conn.rank, e.to_string()))?;
                    contributions.push(values);
                }

                fold_ordered(
                    output,
                    std::iter::once(input).chain(contributions.iter().map(Vec::as_slice)),
                    op,
                );

                let header = WireMessage::Reduced { epoch, count };
                for conn in members {
                    send(conn, "allreduce", conn.send_message(&header)).await?;
                    send(conn, "allreduce", conn.send_values(output)).await?;
                }
            }
            Role::Member(conn) => {
                let contribute = WireMessage::Contribute {
                    epoch,
                    op: op as u8,
                    count,
                };
                send(conn, "allreduce", conn.send_message(&contribute)).await?;
                send(conn, "allreduce", conn.send_values(input)).await?;

                let reduced = tokio::time::timeout(timeout, async {
                    match conn.recv_message().await? {
                        WireMessage::Reduced { epoch: e, count: c } if e == epoch && c == count => {
                            conn.recv_values(count as usize).await
                        }
                        other => Err(FtError::DecodeFailed(format!(
                            "expected Reduced(epoch={epoch}, count={count}), got {other:?}"
                        ))),
                    }
                })
                .await
                .map_err(|_| timed_out("allreduce", conn.rank, timeout))?
                .map_err(|e| FtError::collective("allreduce", conn.rank, e.to_string()))?;
                output.copy_from_slice(&reduced);
            }
        }
        Ok(())
    }

    async fn min(&self, value: u64) -> Result<u64> {
        let epoch = self.next_epoch();
        let timeout = self.collective_timeout;
        match &self.role {
            Role::Coordinator(members) => {
                let mut agreed = value;
                for conn in members {
                    match recv(conn, "agree_min", timeout).await? {
                        WireMessage::Propose { epoch: e, value: v } if e == epoch => {
                            agreed = agreed.min(v);
                        }
                        other => {
                            return Err(unexpected(
                                "agree_min",
                                conn.rank,
                                "Propose",
                                epoch,
                                &other,
                            ));
                        }
                    }
                }
                let reply = WireMessage::Agreed { epoch, value: agreed };
                for conn in members {
                    send(conn, "agree_min", conn.send_message(&reply)).await?;
                }
                Ok(agreed)
            }
            Role::Member(conn) => {
                let propose = WireMessage::Propose { epoch, value };
                send(conn, "agree_min", conn.send_message(&propose)).await?;
                match recv(conn, "agree_min", timeout).await? {
                    WireMessage::Agreed { epoch: e, value: v } if e == epoch => Ok(v),
                    other => Err(unexpected("agree_min", conn.rank, "Agreed", epoch, &other)),
                }
            }
        }
    }
}

impl Collective for TcpComm {
    fn context(&self) -> ProcessContext {
        self.ctx
    }

    fn barrier(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.two_phase_barrier())
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

async fn recv(
    conn: &PeerConnection,
    operation: &'static str,
    timeout: Duration,
) -> Result<WireMessage> {
    tokio::time::timeout(timeout, conn.recv_message())
        .await
        .map_err(|_| timed_out(operation, conn.rank, timeout))?
        .map_err(|e| FtError::collective(operation, conn.rank, e.to_string()))
}

async fn send(
    conn: &PeerConnection,
    operation: &'static str,
    fut: impl Future<Output = Result<()>>,
) -> Result<()> {
    fut.await
        .map_err(|e| FtError::collective(operation, conn.rank, format!("send failed: {e}")))
}

fn timed_out(operation: &'static str, rank: Rank, timeout: Duration) -> FtError {
    FtError::collective(
        operation,
        rank,
        format!("timed out after {}ms", timeout.as_millis()),
    )
}

fn unexpected(
    operation: &'static str,
    rank: Rank,
    expected: &str,
    epoch: u64,
    got: &WireMessage,
) -> FtError {
    FtError::collective(
        operation,
        rank,
        format!("expected {expected}(epoch={epoch}), got {got:?}"),
    )
}
