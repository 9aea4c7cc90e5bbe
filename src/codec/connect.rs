//! CONNECT packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::strtypes::{decode_binary, decode_string, encode_binary, encode_string};
use super::{write_packet, PacketDecodeError};
use crate::control_packet::QoS;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_VERSION: u8 = 5;

/// The Will message carried by a CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
}

/// A decoded/to-be-encoded CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub properties: Properties,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Connect {
    /// Encode the full packet (fixed header + variable header + payload).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        encode_string(PROTOCOL_NAME, &mut body);
        body.push(PROTOCOL_VERSION);

        let mut connect_flags = 0u8;
        if self.clean_start {
            connect_flags |= 0b0000_0010;
        }
        if let Some(will) = &self.will {
            connect_flags |= 0b0000_0100;
            connect_flags |= (will.qos as u8) << 3;
            if will.retain {
                connect_flags |= 0b0010_0000;
            }
        }
        if self.password.is_some() {
            connect_flags |= 0b0100_0000;
        }
        if self.username.is_some() {
            connect_flags |= 0b1000_0000;
        }
        body.push(connect_flags);
        body.extend_from_slice(&self.keep_alive.to_be_bytes());

        self.properties.encode(&mut body);
        encode_string(&self.client_id, &mut body);

        if let Some(will) = &self.will {
            will.properties.encode(&mut body);
            encode_string(&will.topic, &mut body);
            encode_binary(&will.payload, &mut body);
        }
        if let Some(username) = &self.username {
            encode_string(username, &mut body);
        }
        if let Some(password) = &self.password {
            encode_string(password, &mut body);
        }

        let mut out = Vec::new();
        write_packet(ControlPacketType::Connect, 0, &body, &mut out);
        out
    }

    /// Decode a CONNECT packet body (variable header + payload, no fixed header).
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        let protocol_name = decode_string(&mut buf)?;
        if protocol_name != PROTOCOL_NAME {
            return Err(PacketDecodeError::Malformed("unexpected protocol name".into()));
        }
        if buf.remaining() < 1 {
            return Err(PacketDecodeError::Malformed("truncated".into()));
        }
        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(PacketDecodeError::Malformed("unsupported protocol version".into()));
        }
        if buf.remaining() < 1 {
            return Err(PacketDecodeError::Malformed("truncated".into()));
        }
        let connect_flags = buf.get_u8();
        let clean_start = connect_flags & 0b0000_0010 != 0;
        let has_will = connect_flags & 0b0000_0100 != 0;
        let will_qos = QoS::from_u8((connect_flags >> 3) & 0x03)
            .ok_or_else(|| PacketDecodeError::Malformed("invalid will QoS".into()))?;
        let will_retain = connect_flags & 0b0010_0000 != 0;
        let has_password = connect_flags & 0b0100_0000 != 0;
        let has_username = connect_flags & 0b1000_0000 != 0;

        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated".into()));
        }
        let keep_alive = buf.get_u16();
        let properties = Properties::decode(&mut buf)?;
        let client_id = decode_string(&mut buf)?;

        let will = if has_will {
            let will_properties = Properties::decode(&mut buf)?;
            let topic = decode_string(&mut buf)?;
            let payload = decode_binary(&mut buf)?;
            Some(Will {
                topic,
                payload,
                qos: will_qos,
                retain: will_retain,
                properties: will_properties,
            })
        } else {
            None
        };

        let username = if has_username {
            Some(decode_string(&mut buf)?)
        } else {
            None
        };
        let password = if has_password {
            Some(decode_string(&mut buf)?)
        } else {
            None
        };

        Ok(Connect {
            client_id,
            clean_start,
            keep_alive,
            properties,
            will,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_minimal_connect() {
        let connect = Connect {
            client_id: "client-1".into(),
            clean_start: true,
            keep_alive: 60,
            properties: Properties::default(),
            will: None,
            username: Some("user".into()),
            password: Some("pass".into()),
        };
        let encoded = connect.encode();
        // Strip fixed header (1 byte type/flags + 1 byte remaining length for this size).
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        let decoded = Connect::decode(body).unwrap();
        assert_eq!(decoded, connect);
    }

    #[test]
    fn round_trips_with_will() {
        let connect = Connect {
            client_id: "client-2".into(),
            clean_start: false,
            keep_alive: 30,
            properties: Properties {
                session_expiry_interval: Some(120),
                ..Default::default()
            },
            will: Some(Will {
                topic: "lwt/topic".into(),
                payload: Bytes::from_static(b"goodbye"),
                qos: QoS::AtLeastOnce,
                retain: true,
                properties: Properties::default(),
            }),
            username: None,
            password: None,
        };
        let encoded = connect.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        let decoded = Connect::decode(body).unwrap();
        assert_eq!(decoded, connect);
    }
}
