use crate::error::{FtError, Result};
use crate::protocol::WireMessage;
use crate::protocol::codec::{
    decode_control, decode_header, decode_values, encode_message, encode_values,
};
use crate::protocol::header::{HEADER_SIZE, MAX_FRAME_VALUES, MessageType};
use crate::types::Rank;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

/// A framed TCP connection to one peer.
///
/// Reads and writes are serialized independently, so a send never waits
/// behind a pending receive on the same peer. Value buffers larger than
/// `max_frame_values` travel as several consecutive `RawData` frames.
#[derive(Debug)]
pub struct PeerConnection {
    pub rank: Rank,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    max_frame_values: usize,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Control(WireMessage),
    Values(Vec<f32>),
}

impl PeerConnection {
    /// Wrap an already-connected stream to `rank`.
    pub fn new(rank: Rank, stream: TcpStream) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|e| FtError::collective("connect", rank, format!("set_nodelay: {e}")))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            rank,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_frame_values: MAX_FRAME_VALUES,
        })
    }

    /// Cap the number of values per `RawData` frame, within `1..=MAX_FRAME_VALUES`.
    pub fn set_max_frame_values(&mut self, max: usize) {
        self.max_frame_values = max.clamp(1, MAX_FRAME_VALUES);
    }

    /// Send a control message.
    pub async fn send_message(&self, msg: &WireMessage) -> Result<()> {
        let buf = encode_message(msg)?;
        self.write_all(&buf).await
    }

    /// Send a buffer of values as one or more `RawData` frames.
    ///
    /// The frames are written under a single writer lock, so they stay
    /// contiguous on the wire.
    pub async fn send_values(&self, values: &[f32]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        for chunk in values.chunks(self.max_frame_values) {
            writer.write_all(&encode_values(chunk)?).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn write_all(&self, buf: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Receive the next frame of any type.
    pub async fn recv_frame(&self) -> Result<Frame> {
        let mut reader = self.reader.lock().await;
        let mut header_buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buf).await?;
        let header = decode_header(&header_buf)?;
        let mut payload = vec![0u8; header.payload_length as usize];
        reader.read_exact(&mut payload).await?;
        match header.message_type {
            MessageType::Control => Ok(Frame::Control(decode_control(&payload)?)),
            MessageType::RawData => Ok(Frame::Values(decode_values(&payload)?)),
        }
    }

    /// Receive a control message; a `RawData` frame here is a protocol error.
    pub async fn recv_message(&self) -> Result<WireMessage> {
        match self.recv_frame().await? {
            Frame::Control(msg) => Ok(msg),
            Frame::Values(v) => Err(FtError::DecodeFailed(format!(
                "expected control message from rank {}, got {} raw values",
                self.rank,
                v.len()
            ))),
        }
    }

    /// Receive exactly `count` values, gathering as many frames as it takes.
    pub async fn recv_values(&self, count: usize) -> Result<Vec<f32>> {
        let mut values: Vec<f32> = Vec::new();
        values
            .try_reserve_exact(count)
            .map_err(|_| FtError::Allocation { elements: count })?;
        while values.len() < count {
            match self.recv_frame().await? {
                Frame::Values(v) if values.len() + v.len() <= count => values.extend(v),
                Frame::Values(v) => {
                    return Err(FtError::DecodeFailed(format!(
                        "expected {count} values from rank {}, got at least {}",
                        self.rank,
                        values.len() + v.len()
                    )));
                }
                Frame::Control(msg) => {
                    return Err(FtError::DecodeFailed(format!(
                        "expected raw values from rank {}, got {} after {} of {count} values",
                        self.rank,
                        msg.kind(),
                        values.len()
                    )));
                }
            }
        }
        Ok(values)
    }

    /// Shut down the write side; the peer sees end-of-stream.
    pub async fn close(&self) {
        let _ = self.writer.lock().await.shutdown().await;
    }
}
