//! Packet assembler: a streaming FSM turning a byte stream
//! into framed packets and routing them to the reply matcher or the read loop.

use bytes::{Bytes, BytesMut};

use crate::codec::packet_type::ControlPacketType;
use crate::codec::{self, varint, PacketDecodeError};

use super::reply_matcher::ReplyMatcher;

const DEFAULT_SCRATCH: usize = 65_536;

/// A framed, not-yet-decoded packet: fixed header validated, body fully buffered.
struct RawPacket {
    packet_type: ControlPacketType,
    flags: u8,
    body: Bytes,
}

/// A packet the read loop must surface to the application or the connection
/// manager, rather than dispatch to a waiter.
#[derive(Debug, PartialEq)]
pub enum AssembledPacket {
    Publish(codec::publish::Publish),
    Auth(codec::auth_packet::Auth),
    Disconnect(codec::disconnect::Disconnect),
}

/// Streaming packet framer over a growable read buffer.
pub struct Assembler {
    buf: BytesMut,
    scratch_cap: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_SCRATCH),
            scratch_cap: DEFAULT_SCRATCH,
        }
    }

    /// Grow the scratch cap to the negotiated CONNACK `maximum_packet_size`.
    pub fn set_maximum_packet_size(&mut self, max: Option<u32>) {
        self.scratch_cap = max.map_or(DEFAULT_SCRATCH, |m| (m as usize).max(DEFAULT_SCRATCH));
    }

    /// Discard any partially-assembled packet and restart from a clear
    /// read buffer.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append newly-read bytes to the buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempt to split one complete, fixed-header-validated packet off the
    /// front of the buffer. `Ok(None)` means more bytes are needed.
    fn try_parse_one(&mut self) -> Result<Option<RawPacket>, PacketDecodeError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let first = self.buf[0];
        let type_code = first >> 4;
        let packet_type = ControlPacketType::from_code(type_code)
            .ok_or_else(|| PacketDecodeError::Malformed("unknown control packet type".into()))?;
        let flags = first & 0x0F;
        if !packet_type.valid_flags(flags) {
            return Err(PacketDecodeError::InvalidFlags);
        }

        let header_rest = &self.buf[1..];
        let (remaining_len, consumed) = match varint::decode(header_rest) {
            Ok(v) => v,
            Err(varint::DecodeError::Incomplete) => {
                if header_rest.len() >= 4 {
                    return Err(PacketDecodeError::Malformed("remaining length too long".into()));
                }
                return Ok(None);
            }
            Err(varint::DecodeError::Malformed) => {
                return Err(PacketDecodeError::Malformed("remaining length malformed".into()));
            }
        };

        let total_len = 1 + consumed + remaining_len as usize;
        if total_len > self.scratch_cap {
            return Err(PacketDecodeError::Malformed("packet exceeds maximum packet size".into()));
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }

        let mut packet = self.buf.split_to(total_len);
        let body = packet.split_off(1 + consumed).freeze();
        Ok(Some(RawPacket {
            packet_type,
            flags,
            body,
        }))
    }

    /// Parse and route every packet currently fully buffered. PINGRESP is
    /// consumed silently; ack-family packets are dispatched to `matcher`;
    /// the first PUBLISH/AUTH/DISCONNECT encountered is returned to the
    /// caller.
    pub fn drain_routed(
        &mut self,
        matcher: &ReplyMatcher,
    ) -> Result<Option<AssembledPacket>, PacketDecodeError> {
        while let Some(raw) = self.try_parse_one()? {
            if let Some(surfaced) = route(raw, matcher)? {
                return Ok(Some(surfaced));
            }
        }
        Ok(None)
    }
}

fn peek_pid(body: &Bytes) -> Result<u16, PacketDecodeError> {
    if body.len() < 2 {
        return Err(PacketDecodeError::Malformed("truncated packet id".into()));
    }
    Ok(u16::from_be_bytes([body[0], body[1]]))
}

fn route(
    raw: RawPacket,
    matcher: &ReplyMatcher,
) -> Result<Option<AssembledPacket>, PacketDecodeError> {
    use ControlPacketType::*;
    match raw.packet_type {
        PingResp => Ok(None),
        Publish => Ok(Some(AssembledPacket::Publish(codec::publish::Publish::decode(
            raw.flags, raw.body,
        )?))),
        Auth => Ok(Some(AssembledPacket::Auth(codec::auth_packet::Auth::decode(
            raw.body,
        )?))),
        Disconnect => Ok(Some(AssembledPacket::Disconnect(
            codec::disconnect::Disconnect::decode(raw.body)?,
        ))),
        PubAck | PubRec | PubRel | PubComp | SubAck | UnsubAck => {
            let pid = peek_pid(&raw.body)?;
            matcher.dispatch(raw.packet_type, pid, raw.body);
            Ok(None)
        }
        other => Err(PacketDecodeError::Malformed(format!(
            "unexpected packet type on read path: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_more_bytes_for_a_split_header() {
        let mut asm = Assembler::new();
        let matcher = ReplyMatcher::new();
        asm.feed(&[0xD0]); // PINGRESP type/flags byte only
        assert!(asm.drain_routed(&matcher).unwrap().is_none());
    }

    #[test]
    fn pingresp_is_consumed_silently() {
        let mut asm = Assembler::new();
        let matcher = ReplyMatcher::new();
        asm.feed(&[0xD0, 0x00]);
        assert!(asm.drain_routed(&matcher).unwrap().is_none());
        assert!(asm.buf.is_empty());
    }

    #[test]
    fn ack_family_is_dispatched_not_surfaced() {
        let mut asm = Assembler::new();
        let matcher = ReplyMatcher::new();
        let ack = codec::ack::Ack {
            pkid: 5,
            reason_code: 0,
            properties: codec::properties::Properties::default(),
        };
        asm.feed(&ack.encode(ControlPacketType::PubAck));
        assert!(asm.drain_routed(&matcher).unwrap().is_none());
        assert!(!matcher.any_expired());
    }

    #[test]
    fn rejects_invalid_fixed_header_flags() {
        let mut asm = Assembler::new();
        let matcher = ReplyMatcher::new();
        // SUBSCRIBE requires flags 0b0010; send 0b0000 instead.
        asm.feed(&[0x80, 0x00]);
        assert_eq!(asm.drain_routed(&matcher), Err(PacketDecodeError::InvalidFlags));
    }

    #[test]
    fn surfaces_publish_to_the_caller() {
        let mut asm = Assembler::new();
        let matcher = ReplyMatcher::new();
        let publish = codec::publish::Publish {
            topic: "t".into(),
            pkid: 0,
            qos: crate::control_packet::QoS::AtMostOnce,
            dup: false,
            retain: false,
            properties: codec::properties::Properties::default(),
            payload: Bytes::from_static(b"hi"),
        };
        asm.feed(&publish.encode());
        match asm.drain_routed(&matcher).unwrap() {
            Some(AssembledPacket::Publish(p)) => assert_eq!(p.topic, "t"),
            _ => panic!("expected a surfaced PUBLISH"),
        }
    }
}
