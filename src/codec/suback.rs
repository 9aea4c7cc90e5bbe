//! SUBACK packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::reason::{is_valid, ReasonCategory};
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded SUBACK packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub pkid: u16,
    pub properties: Properties,
    pub reason_codes: Vec<u8>,
}

impl SubAck {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.pkid.to_be_bytes());
        self.properties.encode(&mut body);
        body.extend_from_slice(&self.reason_codes);
        let mut out = Vec::new();
        write_packet(ControlPacketType::SubAck, 0, &body, &mut out);
        out
    }

    /// Decode a SUBACK packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated packet id".into()));
        }
        let pkid = buf.get_u16();
        let properties = Properties::decode(&mut buf)?;
        let mut reason_codes = Vec::new();
        while buf.has_remaining() {
            let rc = buf.get_u8();
            if !is_valid(ReasonCategory::SubAck, rc) {
                return Err(PacketDecodeError::InvalidReasonCode(rc));
            }
            reason_codes.push(rc);
        }
        if reason_codes.is_empty() {
            return Err(PacketDecodeError::Malformed("SUBACK with no reason codes".into()));
        }
        Ok(SubAck {
            pkid,
            properties,
            reason_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let suback = SubAck {
            pkid: 3,
            properties: Properties::default(),
            reason_codes: vec![0x00, 0x01, 0x80],
        };
        let encoded = suback.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(SubAck::decode(body).unwrap(), suback);
    }
}
