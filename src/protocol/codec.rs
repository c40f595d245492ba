use crate::error::{FtError, Result};
use crate::protocol::header::{HEADER_SIZE, Header, MAX_PAYLOAD_SIZE, MessageType};
use crate::protocol::message::WireMessage;
use bytes::{Buf, BufMut};

/// Encode a `WireMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &WireMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| FtError::EncodeFailed(e.to_string()))?;
    frame(MessageType::Control, &payload)
}

/// Encode `values` into a framed `RawData` buffer.
pub fn encode_values(values: &[f32]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(values.len() * 4);
    for v in values {
        payload.put_f32_le(*v);
    }
    frame(MessageType::RawData, &payload)
}

fn frame(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FtError::EncodeFailed(format!(
            "payload of {} bytes exceeds frame limit of {MAX_PAYLOAD_SIZE}",
            payload.len()
        )));
    }
    let header = Header {
        payload_length: payload.len() as u32,
        message_type,
    };
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode and validate a header read off the wire.
pub fn decode_header(buf: &[u8; HEADER_SIZE]) -> Result<Header> {
    let header = Header::decode(buf)
        .ok_or_else(|| FtError::DecodeFailed("invalid header: unknown message type".into()))?;
    if header.payload_length as usize > MAX_PAYLOAD_SIZE {
        return Err(FtError::DecodeFailed(format!(
            "announced payload of {} bytes exceeds frame limit of {MAX_PAYLOAD_SIZE}",
            header.payload_length
        )));
    }
    Ok(header)
}

/// Decode an rkyv payload into a `WireMessage`.
pub fn decode_control(payload: &[u8]) -> Result<WireMessage> {
    // rkyv validation needs an aligned buffer; socket reads give no guarantee.
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<WireMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| FtError::DecodeFailed(e.to_string()))
}

/// Decode a `RawData` payload into `f32` values.
pub fn decode_values(mut payload: &[u8]) -> Result<Vec<f32>> {
    if payload.len() % 4 != 0 {
        return Err(FtError::DecodeFailed(format!(
            "raw payload of {} bytes is not a whole number of f32 values",
            payload.len()
        )));
    }
    let mut values = Vec::with_capacity(payload.len() / 4);
    while payload.has_remaining() {
        values.push(payload.get_f32_le());
    }
    Ok(values)
}
