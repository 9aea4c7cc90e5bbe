//! Pure packet codec: no I/O, the only growable allocation is the output
//! buffer itself.

pub mod ack;
pub mod auth_packet;
pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod packet_type;
pub mod ping;
pub mod properties;
pub mod publish;
pub mod reason;
pub mod strtypes;
pub mod subscribe;
pub mod suback;
pub mod unsubscribe;
pub mod unsuback;
pub mod varint;

use bytes::{Buf, Bytes};
use packet_type::ControlPacketType;

/// Errors that can occur while decoding a packet whose remaining length is
/// already known and fully buffered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketDecodeError {
    /// The fixed header flag bits were invalid for this packet type.
    #[error("invalid fixed header flags for this packet type")]
    InvalidFlags,
    /// A field failed to decode (bad string, truncated buffer, etc).
    #[error("malformed packet: {0}")]
    Malformed(String),
    /// A reason code was not a member of this packet type's category.
    #[error("invalid reason code 0x{0:02x}")]
    InvalidReasonCode(u8),
}

impl From<strtypes::CodecError> for PacketDecodeError {
    fn from(e: strtypes::CodecError) -> Self {
        PacketDecodeError::Malformed(e.to_string())
    }
}

/// Write a fixed header (type nibble + flags nibble, then the variable byte
/// remaining length) to `out`, followed by `body`.
pub fn write_packet(packet_type: ControlPacketType, flags: u8, body: &[u8], out: &mut Vec<u8>) {
    out.push((packet_type.code() << 4) | (flags & 0x0F));
    varint::encode(body.len() as u32, out);
    out.extend_from_slice(body);
}

/// Read a two-byte big-endian packet identifier from `buf`.
pub fn read_pid(buf: &mut Bytes) -> Result<u16, PacketDecodeError> {
    if buf.remaining() < 2 {
        return Err(PacketDecodeError::Malformed("truncated packet id".into()));
    }
    Ok(buf.get_u16())
}
