//! PINGREQ / PINGRESP packets: fixed header only, no variable header or payload.

use super::packet_type::ControlPacketType;
use super::write_packet;

/// Encode a PINGREQ packet.
#[must_use]
pub fn encode_pingreq() -> Vec<u8> {
    let mut out = Vec::new();
    write_packet(ControlPacketType::PingReq, 0, &[], &mut out);
    out
}

/// Encode a PINGRESP packet.
#[must_use]
pub fn encode_pingresp() -> Vec<u8> {
    let mut out = Vec::new();
    write_packet(ControlPacketType::PingResp, 0, &[], &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pingreq_is_two_bytes() {
        assert_eq!(encode_pingreq(), vec![0xC0, 0x00]);
    }

    #[test]
    fn pingresp_is_two_bytes() {
        assert_eq!(encode_pingresp(), vec![0xD0, 0x00]);
    }
}
