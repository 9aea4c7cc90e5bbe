//! UNSUBSCRIBE packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::strtypes::decode_string;
use super::{write_packet, PacketDecodeError};

/// A decoded/to-be-encoded UNSUBSCRIBE packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub pkid: u16,
    pub properties: Properties,
    pub filters: Vec<String>,
}

impl Unsubscribe {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.pkid.to_be_bytes());
        self.properties.encode(&mut body);
        for filter in &self.filters {
            super::strtypes::encode_string(filter, &mut body);
        }
        let mut out = Vec::new();
        write_packet(ControlPacketType::Unsubscribe, 0b0010, &body, &mut out);
        out
    }

    /// Decode an UNSUBSCRIBE packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated packet id".into()));
        }
        let pkid = buf.get_u16();
        let properties = Properties::decode(&mut buf)?;
        let mut filters = Vec::new();
        while buf.has_remaining() {
            filters.push(decode_string(&mut buf)?);
        }
        if filters.is_empty() {
            return Err(PacketDecodeError::Malformed("UNSUBSCRIBE with no filters".into()));
        }
        Ok(Unsubscribe {
            pkid,
            properties,
            filters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let unsub = Unsubscribe {
            pkid: 4,
            properties: Properties::default(),
            filters: vec!["a/b".into(), "c/#".into()],
        };
        let encoded = unsub.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Unsubscribe::decode(body).unwrap(), unsub);
    }
}
