//! DISCONNECT packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::reason::{is_valid, ReasonCategory};
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded DISCONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason_code: u8,
    pub properties: Properties,
}

impl Disconnect {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if self.reason_code != 0 || self.properties != Properties::default() {
            body.push(self.reason_code);
            self.properties.encode(&mut body);
        }
        let mut out = Vec::new();
        write_packet(ControlPacketType::Disconnect, 0, &body, &mut out);
        out
    }

    /// Encode the packet without properties, used when the full encoding
    /// exceeds CONNACK `maximum_packet_size`.
    #[must_use]
    pub fn encode_without_properties(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(self.reason_code);
        let mut out = Vec::new();
        write_packet(ControlPacketType::Disconnect, 0, &body, &mut out);
        out
    }

    /// Decode a DISCONNECT packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if !buf.has_remaining() {
            return Ok(Disconnect {
                reason_code: 0,
                properties: Properties::default(),
            });
        }
        let reason_code = buf.get_u8();
        if !is_valid(ReasonCategory::Disconnect, reason_code) {
            return Err(PacketDecodeError::InvalidReasonCode(reason_code));
        }
        let properties = if buf.has_remaining() {
            Properties::decode(&mut buf)?
        } else {
            Properties::default()
        };
        Ok(Disconnect {
            reason_code,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_reason_string() {
        let disc = Disconnect {
            reason_code: 0x81,
            properties: Properties {
                reason_string: Some("Malformed PUBACK: invalid Reason Code".into()),
                ..Default::default()
            },
        };
        let encoded = disc.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Disconnect::decode(body).unwrap(), disc);
    }

    #[test]
    fn shrinks_by_dropping_properties() {
        let disc = Disconnect {
            reason_code: 0x95,
            properties: Properties {
                reason_string: Some("x".repeat(1000)),
                ..Default::default()
            },
        };
        let full = disc.encode();
        let shrunk = disc.encode_without_properties();
        assert!(shrunk.len() < full.len());
    }
}
