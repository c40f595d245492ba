use crate::error::{FtError, Result};
use crate::protocol::WireMessage;
use crate::transport::PeerConnection;
use crate::types::{PROTOCOL_VERSION, Rank};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Pause between connection attempts while the coordinator is not up yet.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Join the group hosted by rank 0 at `coordinator`.
///
/// Retries the TCP connect until `timeout` elapses, since launchers start
/// every rank at roughly the same time and rank 0 may not be listening yet.
/// Returns the connection to the coordinator once it sends `Welcome`.
pub async fn join(
    coordinator: SocketAddr,
    rank: Rank,
    world_size: u32,
    timeout: Duration,
) -> Result<PeerConnection> {
    let deadline = tokio::time::Instant::now() + timeout;

    let stream = loop {
        match TcpStream::connect(coordinator).await {
            Ok(stream) => break stream,
            Err(e) if tokio::time::Instant::now() + RETRY_INTERVAL < deadline => {
                tracing::debug!(%coordinator, "coordinator not reachable yet: {e}");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => {
                return Err(FtError::collective(
                    "join",
                    0,
                    format!("connect to coordinator {coordinator}: {e}"),
                ));
            }
        }
    };

    let conn = PeerConnection::new(0, stream)?;
    conn.send_message(&WireMessage::Hello {
        protocol_version: PROTOCOL_VERSION,
        rank,
        world_size,
    })
    .await
    .map_err(|e| FtError::collective("join", 0, format!("send hello: {e}")))?;

    let reply = tokio::time::timeout_at(deadline, conn.recv_message())
        .await
        .map_err(|_| FtError::FormationTimeout {
            joined: 0,
            expected: world_size,
        })?
        .map_err(|e| FtError::collective("join", 0, format!("await welcome: {e}")))?;

    match reply {
        WireMessage::Welcome { world_size: w } if w == world_size => {
            tracing::debug!(rank, world_size, "joined group");
            Ok(conn)
        }
        WireMessage::Welcome { world_size: w } => Err(FtError::collective(
            "join",
            0,
            format!("coordinator welcomed us into a group of {w}, expected {world_size}"),
        )),
        WireMessage::Reject { reason } => Err(FtError::collective("join", 0, reason)),
        other => Err(FtError::DecodeFailed(format!(
            "expected Welcome, got {}",
            other.kind()
        ))),
    }
}
