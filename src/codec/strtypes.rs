//! UTF-8 string, binary data, and two-byte integer primitives.

use bytes::{Buf, BufMut, Bytes};

/// Error decoding or validating a value from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Not enough bytes were available to complete decoding.
    #[error("buffer ended before the value was fully decoded")]
    Incomplete,
    /// The bytes did not form a valid MQTT UTF-8 string.
    #[error("invalid MQTT UTF-8 string")]
    InvalidUtf8,
}

/// Validate `s` against the MQTT v5 "UTF-8 Encoded String" rules:
/// no control characters (U+0000–U+001F, U+007F–U+009F), no surrogates
/// (U+D800–U+DFFF), no non-characters (U+FDD0–U+FDEF or any plane's last two
/// code points), and a 2-byte length prefix bounds the string to 65535 bytes.
pub fn validate_mqtt_utf8(s: &str) -> Result<(), CodecError> {
    if s.len() > u16::MAX as usize {
        return Err(CodecError::InvalidUtf8);
    }
    for c in s.chars() {
        let cp = c as u32;
        if cp <= 0x001F {
            return Err(CodecError::InvalidUtf8);
        }
        if (0x007F..=0x009F).contains(&cp) {
            return Err(CodecError::InvalidUtf8);
        }
        if (0xD800..=0xDFFF).contains(&cp) {
            return Err(CodecError::InvalidUtf8);
        }
        if (0xFDD0..=0xFDEF).contains(&cp) {
            return Err(CodecError::InvalidUtf8);
        }
        if cp & 0xFFFE == 0xFFFE {
            // Last two code points of every plane (U+xFFFE, U+xFFFF) are non-characters.
            return Err(CodecError::InvalidUtf8);
        }
    }
    Ok(())
}

/// Encode a 2-byte-length-prefixed UTF-8 string.
///
/// # Panics
/// Panics if `s` is not valid per [`validate_mqtt_utf8`]; callers validate
/// user-supplied strings up front, so this is an invariant
/// violation, not a runtime condition.
pub fn encode_string(s: &str, out: &mut Vec<u8>) {
    validate_mqtt_utf8(s).expect("string must be validated before encoding");
    out.put_u16(s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

/// Decode a 2-byte-length-prefixed UTF-8 string.
pub fn decode_string(buf: &mut Bytes) -> Result<String, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Incomplete);
    }
    let raw = buf.copy_to_bytes(len);
    let s = String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)?;
    validate_mqtt_utf8(&s)?;
    Ok(s)
}

/// Encode 2-byte-length-prefixed binary data.
pub fn encode_binary(data: &[u8], out: &mut Vec<u8>) {
    out.put_u16(data.len() as u16);
    out.extend_from_slice(data);
}

/// Decode 2-byte-length-prefixed binary data.
pub fn decode_binary(buf: &mut Bytes) -> Result<Bytes, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.copy_to_bytes(len))
}
