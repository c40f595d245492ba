use crate::types::Rank;

/// Control messages exchanged between a member and the coordinator.
///
/// Buffer contents do NOT flow through this enum. `Contribute` and
/// `Reduced` announce a payload that follows in its own `RawData` frame.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// First frame from a member: the identity the launcher assigned it.
    Hello {
        protocol_version: u16,
        rank: Rank,
        world_size: u32,
    },

    /// Coordinator accepted the member; the group is complete.
    Welcome { world_size: u32 },

    /// Coordinator refused the member (duplicate rank, size mismatch, ...).
    Reject { reason: String },

    /// Member reached the barrier with the given sequence number.
    Barrier { epoch: u64 },

    /// Every rank reached the barrier.
    BarrierAck { epoch: u64 },

    /// Member contribution to an all-reduce; `count` f32 values follow.
    Contribute { epoch: u64, op: u8, count: u64 },

    /// Reduced result; `count` f32 values follow.
    Reduced { epoch: u64, count: u64 },

    /// Member's local value for a minimum agreement.
    Propose { epoch: u64, value: u64 },

    /// Agreed minimum across all ranks.
    Agreed { epoch: u64, value: u64 },
}

impl WireMessage {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Hello { .. } => "Hello",
            WireMessage::Welcome { .. } => "Welcome",
            WireMessage::Reject { .. } => "Reject",
            WireMessage::Barrier { .. } => "Barrier",
            WireMessage::BarrierAck { .. } => "BarrierAck",
            WireMessage::Contribute { .. } => "Contribute",
            WireMessage::Reduced { .. } => "Reduced",
            WireMessage::Propose { .. } => "Propose",
            WireMessage::Agreed { .. } => "Agreed",
        }
    }
}
