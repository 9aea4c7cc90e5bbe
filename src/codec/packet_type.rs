//! MQTT v5 control packet types and fixed-header flag validation.

/// The sixteen values of a control packet type's position in the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ControlPacketType {
    Connect,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
    Auth,
}

impl ControlPacketType {
    /// The 4-bit type code occupying the high nibble of the fixed header's first byte.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            ControlPacketType::Connect => 1,
            ControlPacketType::ConnAck => 2,
            ControlPacketType::Publish => 3,
            ControlPacketType::PubAck => 4,
            ControlPacketType::PubRec => 5,
            ControlPacketType::PubRel => 6,
            ControlPacketType::PubComp => 7,
            ControlPacketType::Subscribe => 8,
            ControlPacketType::SubAck => 9,
            ControlPacketType::Unsubscribe => 10,
            ControlPacketType::UnsubAck => 11,
            ControlPacketType::PingReq => 12,
            ControlPacketType::PingResp => 13,
            ControlPacketType::Disconnect => 14,
            ControlPacketType::Auth => 15,
        }
    }

    /// Map a 4-bit type code back to a [`ControlPacketType`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => ControlPacketType::Connect,
            2 => ControlPacketType::ConnAck,
            3 => ControlPacketType::Publish,
            4 => ControlPacketType::PubAck,
            5 => ControlPacketType::PubRec,
            6 => ControlPacketType::PubRel,
            7 => ControlPacketType::PubComp,
            8 => ControlPacketType::Subscribe,
            9 => ControlPacketType::SubAck,
            10 => ControlPacketType::Unsubscribe,
            11 => ControlPacketType::UnsubAck,
            12 => ControlPacketType::PingReq,
            13 => ControlPacketType::PingResp,
            14 => ControlPacketType::Disconnect,
            15 => ControlPacketType::Auth,
            _ => return None,
        })
    }

    /// Validate the low-nibble flag bits for this packet type: PUBLISH may
    /// carry DUP/QoS/RETAIN bits; PUBREL, SUBSCRIBE and
    /// UNSUBSCRIBE require exactly `0010`; all others require `0000`.
    #[must_use]
    pub fn valid_flags(self, flags: u8) -> bool {
        match self {
            ControlPacketType::Publish => true,
            ControlPacketType::PubRel
            | ControlPacketType::Subscribe
            | ControlPacketType::Unsubscribe => flags == 0b0010,
            _ => flags == 0,
        }
    }
}
