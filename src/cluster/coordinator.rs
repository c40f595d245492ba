use crate::error::{FtError, Result};
use crate::protocol::WireMessage;
use crate::transport::PeerConnection;
use crate::types::{PROTOCOL_VERSION, Rank};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Rank 0's side of group formation.
///
/// Listens for the other `world_size - 1` participants, checks that each
/// one announces a distinct rank in range and the same world size and
/// protocol version, then welcomes them all at once.
pub struct Coordinator {
    listener: TcpListener,
    world_size: u32,
    formation_timeout: Duration,
}

impl Coordinator {
    pub async fn bind(addr: SocketAddr, world_size: u32) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            world_size,
            formation_timeout: Duration::from_secs(60),
        })
    }

    /// Set the group formation timeout.
    pub fn with_formation_timeout(mut self, timeout: Duration) -> Self {
        self.formation_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait until every rank in `1..world_size` has joined.
    ///
    /// Returns the member connections ordered by rank. Members announcing a
    /// bad identity are rejected and formation keeps waiting for the rest.
    pub async fn form_group(&self) -> Result<Vec<PeerConnection>> {
        let expected = self.world_size.saturating_sub(1);
        let mut members: BTreeMap<Rank, PeerConnection> = BTreeMap::new();
        let deadline = tokio::time::Instant::now() + self.formation_timeout;

        while (members.len() as u32) < expected {
            let (stream, addr) = tokio::select! {
                result = self.listener.accept() => result?,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(FtError::FormationTimeout {
                        joined: members.len() as u32 + 1,
                        expected: self.world_size,
                    });
                }
            };

            // Placeholder rank until Hello tells us who this is.
            let conn = PeerConnection::new(Rank::MAX, stream)?;
            let hello = tokio::time::timeout_at(deadline, conn.recv_message()).await;
            let msg = match hello {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    tracing::warn!(%addr, "dropping connection without a valid Hello: {e}");
                    continue;
                }
                Err(_) => continue,
            };

            let rank = match self.check_hello(&msg, &members) {
                Ok(rank) => rank,
                Err(reason) => {
                    tracing::warn!(%addr, "rejecting member: {reason}");
                    let _ = conn.send_message(&WireMessage::Reject { reason }).await;
                    conn.close().await;
                    continue;
                }
            };

            let mut conn = conn;
            conn.rank = rank;
            members.insert(rank, conn);
            tracing::info!(
                rank,
                %addr,
                "member joined: {}/{}",
                members.len() + 1,
                self.world_size
            );
        }

        let welcome = WireMessage::Welcome {
            world_size: self.world_size,
        };
        for conn in members.values() {
            conn.send_message(&welcome).await.map_err(|e| {
                FtError::collective("join", conn.rank, format!("send welcome: {e}"))
            })?;
        }

        Ok(members.into_values().collect())
    }

    fn check_hello(
        &self,
        msg: &WireMessage,
        members: &BTreeMap<Rank, PeerConnection>,
    ) -> std::result::Result<Rank, String> {
        match *msg {
            WireMessage::Hello {
                protocol_version,
                rank,
                world_size,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    Err(FtError::ProtocolMismatch {
                        local: PROTOCOL_VERSION,
                        remote: protocol_version,
                    }
                    .to_string())
                } else if world_size != self.world_size {
                    Err(format!(
                        "world size mismatch: coordinator expects {}, member announced {world_size}",
                        self.world_size
                    ))
                } else if rank == 0 || rank >= self.world_size {
                    Err(FtError::InvalidRank {
                        rank,
                        world_size: self.world_size,
                    }
                    .to_string())
                } else if members.contains_key(&rank) {
                    Err(format!("rank {rank} already joined"))
                } else {
                    Ok(rank)
                }
            }
            ref other => Err(format!("expected Hello, got {}", other.kind())),
        }
    }
}
