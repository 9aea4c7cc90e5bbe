//! PUBACK / PUBREC / PUBREL / PUBCOMP share one wire shape: packet id,
//! optional reason code, optional properties.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::reason::{is_valid, ReasonCategory};
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded PUBACK, PUBREC, PUBREL, or PUBCOMP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub pkid: u16,
    pub reason_code: u8,
    pub properties: Properties,
}

impl Ack {
    /// Encode the packet. When `reason_code == 0` and `properties` is empty,
    /// the abbreviated 2-byte form permitted by MQTT v5 is emitted.
    #[must_use]
    pub fn encode(&self, packet_type: ControlPacketType) -> Vec<u8> {
        let flags = if packet_type == ControlPacketType::PubRel {
            0b0010
        } else {
            0
        };
        let mut body = Vec::new();
        body.extend_from_slice(&self.pkid.to_be_bytes());
        if self.reason_code != 0 || !is_default_properties(&self.properties) {
            body.push(self.reason_code);
            self.properties.encode(&mut body);
        }
        let mut out = Vec::new();
        write_packet(packet_type, flags, &body, &mut out);
        out
    }

    /// Decode an ack-family packet body, validating `reason_code` against
    /// the category appropriate to `packet_type`.
    pub fn decode(packet_type: ControlPacketType, mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated packet id".into()));
        }
        let pkid = buf.get_u16();
        if !buf.has_remaining() {
            return Ok(Ack {
                pkid,
                reason_code: 0,
                properties: Properties::default(),
            });
        }
        let reason_code = buf.get_u8();
        let category = match packet_type {
            ControlPacketType::PubAck | ControlPacketType::PubRec => ReasonCategory::PubAckOrRec,
            ControlPacketType::PubRel | ControlPacketType::PubComp => ReasonCategory::PubRelOrComp,
            _ => unreachable!("Ack::decode called with non-ack packet type"),
        };
        if !is_valid(category, reason_code) {
            return Err(PacketDecodeError::InvalidReasonCode(reason_code));
        }
        let properties = if buf.has_remaining() {
            Properties::decode(&mut buf)?
        } else {
            Properties::default()
        };
        Ok(Ack {
            pkid,
            reason_code,
            properties,
        })
    }
}

fn is_default_properties(props: &Properties) -> bool {
    props == &Properties::default()
}
