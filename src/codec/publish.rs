//! PUBLISH packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::strtypes::decode_string;
use super::{write_packet, PacketDecodeError};
use crate::control_packet::QoS;

/// A decoded/to-be-encoded PUBLISH packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub pkid: u16,
    pub qos: QoS,
    pub dup: bool,
    pub retain: bool,
    pub properties: Properties,
    pub payload: Bytes,
}

impl Publish {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= 0b1000;
        }
        if self.retain {
            flags |= 0b0001;
        }

        let mut body = Vec::new();
        super::strtypes::encode_string(&self.topic, &mut body);
        if self.qos != QoS::AtMostOnce {
            body.extend_from_slice(&self.pkid.to_be_bytes());
        }
        self.properties.encode(&mut body);
        body.extend_from_slice(&self.payload);

        let mut out = Vec::new();
        write_packet(ControlPacketType::Publish, flags, &body, &mut out);
        out
    }

    /// Decode a PUBLISH packet body, given the flag bits from the fixed header.
    pub fn decode(flags: u8, mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        let dup = flags & 0b1000 != 0;
        let retain = flags & 0b0001 != 0;
        let qos = QoS::from_u8((flags >> 1) & 0x03)
            .ok_or_else(|| PacketDecodeError::Malformed("invalid QoS bits".into()))?;

        let topic = decode_string(&mut buf)?;
        if topic.is_empty() {
            return Err(PacketDecodeError::Malformed("empty topic name".into()));
        }

        let pkid = if qos != QoS::AtMostOnce {
            if buf.remaining() < 2 {
                return Err(PacketDecodeError::Malformed("truncated packet id".into()));
            }
            buf.get_u16()
        } else {
            0
        };

        let properties = Properties::decode(&mut buf)?;
        let payload = buf;

        Ok(Publish {
            topic,
            pkid,
            qos,
            dup,
            retain,
            properties,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_qos0() {
        let p = Publish {
            topic: "a/b".into(),
            pkid: 0,
            qos: QoS::AtMostOnce,
            dup: false,
            retain: false,
            properties: Properties::default(),
            payload: Bytes::from_static(b"hello"),
        };
        let encoded = p.encode();
        let flags = encoded[0] & 0x0F;
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Publish::decode(flags, body).unwrap(), p);
    }

    #[test]
    fn round_trips_qos1_with_dup() {
        let p = Publish {
            topic: "t".into(),
            pkid: 42,
            qos: QoS::AtLeastOnce,
            dup: true,
            retain: false,
            properties: Properties {
                content_type: Some("text/plain".into()),
                ..Default::default()
            },
            payload: Bytes::from_static(b"p"),
        };
        let encoded = p.encode();
        let flags = encoded[0] & 0x0F;
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Publish::decode(flags, body).unwrap(), p);
    }
}
