//! CONNACK packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::reason::{is_valid, ReasonCategory};
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded CONNACK packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub reason_code: u8,
    pub properties: Properties,
}

impl ConnAck {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(u8::from(self.session_present));
        body.push(self.reason_code);
        self.properties.encode(&mut body);
        let mut out = Vec::new();
        write_packet(ControlPacketType::ConnAck, 0, &body, &mut out);
        out
    }

    /// Decode a CONNACK packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated CONNACK".into()));
        }
        let flags = buf.get_u8();
        let session_present = flags & 0x01 != 0;
        let reason_code = buf.get_u8();
        if !is_valid(ReasonCategory::ConnAck, reason_code) {
            return Err(PacketDecodeError::InvalidReasonCode(reason_code));
        }
        let properties = Properties::decode(&mut buf)?;
        Ok(ConnAck {
            session_present,
            reason_code,
            properties,
        })
    }
}
