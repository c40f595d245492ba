/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a peer is allowed to announce (1 GiB).
pub const MAX_PAYLOAD_SIZE: usize = 1 << 30;

/// Most `f32` values a single `RawData` frame can carry.
pub const MAX_FRAME_VALUES: usize = MAX_PAYLOAD_SIZE / std::mem::size_of::<f32>();

/// Type tag for the payload that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Serialized `WireMessage` (rkyv-encoded control message).
    Control = 0,
    /// Raw little-endian `f32` elements.
    RawData = 1,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MessageType::Control),
            1 => Some(MessageType::RawData),
            _ => None,
        }
    }
}

/// 8-byte wire header prepended to every frame.
///
/// ```text
/// [0..4] payload_length: u32 LE
/// [4]    message_type: u8
/// [5..8] reserved (must be 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_length: u32,
    pub message_type: MessageType,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4] = self.message_type as u8;
        buf
    }

    /// Returns `None` if the message type byte is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let message_type = MessageType::from_u8(buf[4])?;
        Some(Header {
            payload_length,
            message_type,
        })
    }
}
