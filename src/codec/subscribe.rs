//! SUBSCRIBE packet.

use bytes::{Buf, Bytes};

use super::packet_type::ControlPacketType;
use super::properties::Properties;
use super::strtypes::decode_string;
use super::{write_packet, PacketDecodeError};
use crate::control_packet::QoS;

/// Retain-handling option for a subscription (MQTT v5 §3.8.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainHandling {
    SendAtSubscribe,
    SendAtSubscribeIfNew,
    DoNotSend,
}

impl RetainHandling {
    fn bits(self) -> u8 {
        match self {
            RetainHandling::SendAtSubscribe => 0,
            RetainHandling::SendAtSubscribeIfNew => 1,
            RetainHandling::DoNotSend => 2,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(RetainHandling::SendAtSubscribe),
            1 => Some(RetainHandling::SendAtSubscribeIfNew),
            2 => Some(RetainHandling::DoNotSend),
            _ => None,
        }
    }
}

/// Per-topic-filter subscribe options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

/// A single `(filter, options)` entry in a SUBSCRIBE packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub filter: String,
    pub options: SubscribeOptions,
}

/// A decoded/to-be-encoded SUBSCRIBE packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub pkid: u16,
    pub properties: Properties,
    pub subscriptions: Vec<Subscription>,
}

impl Subscribe {
    /// Encode the full packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.pkid.to_be_bytes());
        self.properties.encode(&mut body);
        for sub in &self.subscriptions {
            super::strtypes::encode_string(&sub.filter, &mut body);
            let mut opts = sub.options.qos as u8;
            if sub.options.no_local {
                opts |= 0b0000_0100;
            }
            if sub.options.retain_as_published {
                opts |= 0b0000_1000;
            }
            opts |= sub.options.retain_handling.bits() << 4;
            body.push(opts);
        }
        let mut out = Vec::new();
        write_packet(ControlPacketType::Subscribe, 0b0010, &body, &mut out);
        out
    }

    /// Decode a SUBSCRIBE packet body.
    pub fn decode(mut buf: Bytes) -> Result<Self, PacketDecodeError> {
        if buf.remaining() < 2 {
            return Err(PacketDecodeError::Malformed("truncated packet id".into()));
        }
        let pkid = buf.get_u16();
        let properties = Properties::decode(&mut buf)?;
        let mut subscriptions = Vec::new();
        while buf.has_remaining() {
            let filter = decode_string(&mut buf)?;
            if !buf.has_remaining() {
                return Err(PacketDecodeError::Malformed("missing subscribe options".into()));
            }
            let opts = buf.get_u8();
            let qos = QoS::from_u8(opts & 0x03)
                .ok_or_else(|| PacketDecodeError::Malformed("invalid QoS".into()))?;
            let retain_handling = RetainHandling::from_bits((opts >> 4) & 0x03)
                .ok_or_else(|| PacketDecodeError::Malformed("invalid retain handling".into()))?;
            subscriptions.push(Subscription {
                filter,
                options: SubscribeOptions {
                    qos,
                    no_local: opts & 0b0000_0100 != 0,
                    retain_as_published: opts & 0b0000_1000 != 0,
                    retain_handling,
                },
            });
        }
        if subscriptions.is_empty() {
            return Err(PacketDecodeError::Malformed("SUBSCRIBE with no filters".into()));
        }
        Ok(Subscribe {
            pkid,
            properties,
            subscriptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let sub = Subscribe {
            pkid: 9,
            properties: Properties {
                subscription_identifiers: vec![5],
                ..Default::default()
            },
            subscriptions: vec![
                Subscription {
                    filter: "a/+".into(),
                    options: SubscribeOptions {
                        qos: QoS::ExactlyOnce,
                        no_local: true,
                        retain_as_published: false,
                        retain_handling: RetainHandling::DoNotSend,
                    },
                },
                Subscription {
                    filter: "b/#".into(),
                    options: SubscribeOptions {
                        qos: QoS::AtMostOnce,
                        no_local: false,
                        retain_as_published: true,
                        retain_handling: RetainHandling::SendAtSubscribeIfNew,
                    },
                },
            ],
        };
        let encoded = sub.encode();
        let (_rl, consumed) = super::super::varint::decode(&encoded[1..]).unwrap();
        let body = Bytes::copy_from_slice(&encoded[1 + consumed..]);
        assert_eq!(Subscribe::decode(body).unwrap(), sub);
    }
}
