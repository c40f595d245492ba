use crate::error::{FtError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Leading bytes of every snapshot file.
pub const MAGIC: [u8; 4] = *b"FTCK";

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed snapshot header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Encode a buffer as a snapshot record.
///
/// ```text
/// [0..4]   magic: b"FTCK"
/// [4..6]   version: u16 LE
/// [6..8]   reserved: u16 (must be 0)
/// [8..16]  element count: u64 LE
/// [16..]   count * f32 LE
/// ```
pub fn encode(values: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(values.len()));
    buf.put_slice(&MAGIC);
    buf.put_u16_le(FORMAT_VERSION);
    buf.put_u16_le(0);
    buf.put_u64_le(values.len() as u64);
    for v in values {
        buf.put_f32_le(*v);
    }
    buf.freeze()
}

/// Total encoded size of a snapshot holding `count` elements.
pub const fn encoded_len(count: usize) -> usize {
    HEADER_SIZE + count * std::mem::size_of::<f32>()
}

/// Decode a snapshot record, validating header and payload length.
pub fn decode(mut buf: &[u8]) -> Result<Vec<f32>> {
    if buf.len() < HEADER_SIZE {
        return Err(FtError::DecodeFailed(format!(
            "snapshot too short: {} < {HEADER_SIZE} header bytes",
            buf.len()
        )));
    }

    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(FtError::DecodeFailed(format!(
            "bad snapshot magic {magic:02x?}"
        )));
    }

    let version = buf.get_u16_le();
    if version != FORMAT_VERSION {
        return Err(FtError::DecodeFailed(format!(
            "unsupported snapshot version {version} (expected {FORMAT_VERSION})"
        )));
    }
    let _reserved = buf.get_u16_le();

    let count = buf.get_u64_le();
    let expected = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| FtError::DecodeFailed(format!("element count {count} overflows")))?;
    if buf.remaining() != expected {
        return Err(FtError::DecodeFailed(format!(
            "snapshot payload is {} bytes, header declares {count} elements ({expected} bytes)",
            buf.remaining()
        )));
    }

    let mut values = Vec::with_capacity(count as usize);
    while buf.has_remaining() {
        values.push(buf.get_f32_le());
    }
    Ok(values)
}
