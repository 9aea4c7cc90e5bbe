//! AUTH packet, used for enhanced authentication exchanges.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::reason::{is_valid, ReasonCategory};
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded AUTH packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    pub reason_code: u8,
    pub properties: Properties,
}

impl Auth {
    /// Encode the full packet. MQTT v5 permits omitting the reason code and
    /// properties entirely when the reason code is 0 (success) and there are
    /// no properties to send.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if self.reason_code != 0 || self.properties != Properties::default() {
            body.push(self.reason_code);
            self.properties.encode(&mut body);
        }
        let mut out = Vec::new();
        write_packet(ControlPacketType::Auth, 0, &body, &mut out);
        out
    }

    /// Decode an AUTH packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if !buf.has_remaining() {
            return Ok(Auth {
                reason_code: 0,
                properties: Properties::default(),
            });
        }
        let reason_code = buf.get_u8();
        if !is_valid(ReasonCategory::Auth, reason_code) {
            return Err(PacketDecodeError::InvalidReasonCode(reason_code));
        }
        let properties = if buf.has_remaining() {
            Properties::decode(&mut buf)?
        } else {
            Properties::default()
        };
        Ok(Auth {
            reason_code,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_challenge() {
        let auth = Auth {
            reason_code: 0x18,
            properties: Properties {
                authentication_method: Some("SAT".into()),
                authentication_data: Some(Bytes::from_static(b"token")),
                ..Default::default()
            },
        };
        let encoded = auth.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Auth::decode(body).unwrap(), auth);
    }
}
