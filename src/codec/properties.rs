//! MQTT v5 properties: a typed map keyed by a single-byte property identifier.
//! Rather than a generic `HashMap`, [`Properties`] exposes one
//! `Option`/`Vec` field per property id — the fixed enumeration MQTT v5
//! defines — since each id has a fixed value type and (for most) a fixed
//! singleton-vs-repeatable cardinality.

use bytes::{Buf, BufMut, Bytes};

use super::strtypes::{decode_binary, decode_string, encode_binary, encode_string, CodecError};
use super::varint;

macro_rules! prop_id {
    ($($name:ident = $val:expr),* $(,)?) => {
        /// Single-byte MQTT v5 property identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[allow(missing_docs)]
        pub enum PropertyId {
            $($name = $val,)*
        }

        impl PropertyId {
            fn from_u32(v: u32) -> Option<Self> {
                match v {
                    $($val => Some(PropertyId::$name),)*
                    _ => None,
                }
            }
        }
    };
}

prop_id! {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0B,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1A,
    ServerReference = 0x1C,
    ReasonString = 0x1F,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQos = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2A,
}

/// A decoded/to-be-encoded properties block. Unset fields are simply absent
/// from the wire encoding (MQTT v5 properties are all optional).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub payload_format_indicator: Option<u8>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub subscription_identifiers: Vec<u32>,
    pub session_expiry_interval: Option<u32>,
    pub assigned_client_identifier: Option<String>,
    pub server_keep_alive: Option<u16>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Bytes>,
    pub request_problem_information: Option<u8>,
    pub will_delay_interval: Option<u32>,
    pub request_response_information: Option<u8>,
    pub response_information: Option<String>,
    pub server_reference: Option<String>,
    pub reason_string: Option<String>,
    pub receive_maximum: Option<u16>,
    pub topic_alias_maximum: Option<u16>,
    pub topic_alias: Option<u16>,
    pub maximum_qos: Option<u8>,
    pub retain_available: Option<bool>,
    /// User properties, order-preserving.
    pub user_properties: Vec<(String, String)>,
    pub maximum_packet_size: Option<u32>,
    pub wildcard_subscription_available: Option<bool>,
    pub subscription_identifier_available: Option<bool>,
    pub shared_subscription_available: Option<bool>,
}

impl Properties {
    /// Encode this properties block, with its variable-byte-integer length
    /// prefix, appending to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        macro_rules! put_u8 {
            ($id:expr, $field:expr) => {
                if let Some(v) = $field {
                    body.push($id as u8);
                    body.push(v);
                }
            };
        }
        macro_rules! put_bool {
            ($id:expr, $field:expr) => {
                if let Some(v) = $field {
                    body.push($id as u8);
                    body.push(u8::from(v));
                }
            };
        }
        macro_rules! put_u16 {
            ($id:expr, $field:expr) => {
                if let Some(v) = $field {
                    body.push($id as u8);
                    body.put_u16(v);
                }
            };
        }
        macro_rules! put_u32 {
            ($id:expr, $field:expr) => {
                if let Some(v) = $field {
                    body.push($id as u8);
                    body.put_u32(v);
                }
            };
        }
        macro_rules! put_str {
            ($id:expr, $field:expr) => {
                if let Some(ref v) = $field {
                    body.push($id as u8);
                    encode_string(v, &mut body);
                }
            };
        }
        macro_rules! put_bin {
            ($id:expr, $field:expr) => {
                if let Some(ref v) = $field {
                    body.push($id as u8);
                    encode_binary(v, &mut body);
                }
            };
        }

        put_u8!(PropertyId::PayloadFormatIndicator, self.payload_format_indicator);
        put_u32!(PropertyId::MessageExpiryInterval, self.message_expiry_interval);
        put_str!(PropertyId::ContentType, self.content_type);
        put_str!(PropertyId::ResponseTopic, self.response_topic);
        put_bin!(PropertyId::CorrelationData, self.correlation_data);
        for sub_id in &self.subscription_identifiers {
            body.push(PropertyId::SubscriptionIdentifier as u8);
            varint::encode(*sub_id, &mut body);
        }
        put_u32!(PropertyId::SessionExpiryInterval, self.session_expiry_interval);
        put_str!(
            PropertyId::AssignedClientIdentifier,
            self.assigned_client_identifier
        );
        put_u16!(PropertyId::ServerKeepAlive, self.server_keep_alive);
        put_str!(PropertyId::AuthenticationMethod, self.authentication_method);
        put_bin!(PropertyId::AuthenticationData, self.authentication_data);
        put_u8!(
            PropertyId::RequestProblemInformation,
            self.request_problem_information
        );
        put_u32!(PropertyId::WillDelayInterval, self.will_delay_interval);
        put_u8!(
            PropertyId::RequestResponseInformation,
            self.request_response_information
        );
        put_str!(PropertyId::ResponseInformation, self.response_information);
        put_str!(PropertyId::ServerReference, self.server_reference);
        put_str!(PropertyId::ReasonString, self.reason_string);
        put_u16!(PropertyId::ReceiveMaximum, self.receive_maximum);
        put_u16!(PropertyId::TopicAliasMaximum, self.topic_alias_maximum);
        put_u16!(PropertyId::TopicAlias, self.topic_alias);
        put_u8!(PropertyId::MaximumQos, self.maximum_qos);
        put_bool!(PropertyId::RetainAvailable, self.retain_available);
        for (k, v) in &self.user_properties {
            body.push(PropertyId::UserProperty as u8);
            encode_string(k, &mut body);
            encode_string(v, &mut body);
        }
        put_u32!(PropertyId::MaximumPacketSize, self.maximum_packet_size);
        put_bool!(
            PropertyId::WildcardSubscriptionAvailable,
            self.wildcard_subscription_available
        );
        put_bool!(
            PropertyId::SubscriptionIdentifierAvailable,
            self.subscription_identifier_available
        );
        put_bool!(
            PropertyId::SharedSubscriptionAvailable,
            self.shared_subscription_available
        );

        varint::encode(body.len() as u32, out);
        out.extend_from_slice(&body);
    }

    /// Decode a properties block (length prefix + entries) from the front of `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let remaining_slice = buf.chunk();
        let (len, consumed) =
            varint::decode(remaining_slice).map_err(|_| CodecError::Incomplete)?;
        if buf.remaining() < consumed + len as usize {
            return Err(CodecError::Incomplete);
        }
        buf.advance(consumed);
        let mut body = buf.copy_to_bytes(len as usize);

        let mut props = Properties::default();
        while body.has_remaining() {
            let id_slice = body.chunk();
            let (id_val, id_len) =
                varint::decode(id_slice).map_err(|_| CodecError::InvalidUtf8)?;
            body.advance(id_len);
            let id = PropertyId::from_u32(id_val).ok_or(CodecError::InvalidUtf8)?;
            match id {
                PropertyId::PayloadFormatIndicator => {
                    props.payload_format_indicator = Some(require_u8(&mut body)?);
                }
                PropertyId::MessageExpiryInterval => {
                    props.message_expiry_interval = Some(require_u32(&mut body)?);
                }
                PropertyId::ContentType => props.content_type = Some(decode_string(&mut body)?),
                PropertyId::ResponseTopic => props.response_topic = Some(decode_string(&mut body)?),
                PropertyId::CorrelationData => {
                    props.correlation_data = Some(decode_binary(&mut body)?);
                }
                PropertyId::SubscriptionIdentifier => {
                    let slice = body.chunk();
                    let (v, n) = varint::decode(slice).map_err(|_| CodecError::Incomplete)?;
                    body.advance(n);
                    props.subscription_identifiers.push(v);
                }
                PropertyId::SessionExpiryInterval => {
                    props.session_expiry_interval = Some(require_u32(&mut body)?);
                }
                PropertyId::AssignedClientIdentifier => {
                    props.assigned_client_identifier = Some(decode_string(&mut body)?);
                }
                PropertyId::ServerKeepAlive => {
                    props.server_keep_alive = Some(require_u16(&mut body)?);
                }
                PropertyId::AuthenticationMethod => {
                    props.authentication_method = Some(decode_string(&mut body)?);
                }
                PropertyId::AuthenticationData => {
                    props.authentication_data = Some(decode_binary(&mut body)?);
                }
                PropertyId::RequestProblemInformation => {
                    props.request_problem_information = Some(require_u8(&mut body)?);
                }
                PropertyId::WillDelayInterval => {
                    props.will_delay_interval = Some(require_u32(&mut body)?);
                }
                PropertyId::RequestResponseInformation => {
                    props.request_response_information = Some(require_u8(&mut body)?);
                }
                PropertyId::ResponseInformation => {
                    props.response_information = Some(decode_string(&mut body)?);
                }
                PropertyId::ServerReference => {
                    props.server_reference = Some(decode_string(&mut body)?);
                }
                PropertyId::ReasonString => props.reason_string = Some(decode_string(&mut body)?),
                PropertyId::ReceiveMaximum => props.receive_maximum = Some(require_u16(&mut body)?),
                PropertyId::TopicAliasMaximum => {
                    props.topic_alias_maximum = Some(require_u16(&mut body)?);
                }
                PropertyId::TopicAlias => props.topic_alias = Some(require_u16(&mut body)?),
                PropertyId::MaximumQos => props.maximum_qos = Some(require_u8(&mut body)?),
                PropertyId::RetainAvailable => {
                    props.retain_available = Some(require_u8(&mut body)? != 0);
                }
                PropertyId::UserProperty => {
                    let k = decode_string(&mut body)?;
                    let v = decode_string(&mut body)?;
                    props.user_properties.push((k, v));
                }
                PropertyId::MaximumPacketSize => {
                    props.maximum_packet_size = Some(require_u32(&mut body)?);
                }
                PropertyId::WildcardSubscriptionAvailable => {
                    props.wildcard_subscription_available = Some(require_u8(&mut body)? != 0);
                }
                PropertyId::SubscriptionIdentifierAvailable => {
                    props.subscription_identifier_available = Some(require_u8(&mut body)? != 0);
                }
                PropertyId::SharedSubscriptionAvailable => {
                    props.shared_subscription_available = Some(require_u8(&mut body)? != 0);
                }
            }
        }
        Ok(props)
    }
}

fn require_u8(buf: &mut Bytes) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

fn require_u16(buf: &mut Bytes) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u16())
}

fn require_u32(buf: &mut Bytes) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u32())
}
