//! Session state and MQTT context.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::codec::connect::Will;
use crate::codec::properties::Properties;
use crate::error::DisconnectReasonCode;

/// Whether the broker preserved state from a previous session of this client id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session_present: bool,
    pub subscriptions_present: bool,
}

impl SessionState {
    /// Reset to a fresh, empty session.
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }
}

/// Credentials, will, negotiated properties and the authenticator handle.
pub struct MqttContext {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will: Option<Will>,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub requested_properties: Properties,
    pub received_properties: Properties,
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

impl MqttContext {
    /// CONNACK `maximum_qos`, or `None` if the broker did not restrict it.
    #[must_use]
    pub fn maximum_qos(&self) -> Option<u8> {
        self.received_properties.maximum_qos
    }

    /// Whether the broker accepts retained messages (default true, absent property means yes).
    #[must_use]
    pub fn retain_available(&self) -> bool {
        self.received_properties.retain_available.unwrap_or(true)
    }

    /// Negotiated `topic_alias_maximum` (default 0: topic aliasing unavailable).
    #[must_use]
    pub fn topic_alias_maximum(&self) -> u16 {
        self.received_properties.topic_alias_maximum.unwrap_or(0)
    }

    /// Negotiated Receive Maximum (default 65535).
    #[must_use]
    pub fn receive_maximum(&self) -> u16 {
        self.received_properties.receive_maximum.unwrap_or(65_535)
    }

    /// CONNACK `maximum_packet_size`, if the broker restricted it.
    #[must_use]
    pub fn maximum_packet_size(&self) -> Option<u32> {
        self.received_properties.maximum_packet_size
    }

    #[must_use]
    pub fn wildcard_subscription_available(&self) -> bool {
        self.received_properties
            .wildcard_subscription_available
            .unwrap_or(true)
    }

    #[must_use]
    pub fn shared_subscription_available(&self) -> bool {
        self.received_properties
            .shared_subscription_available
            .unwrap_or(true)
    }

    #[must_use]
    pub fn subscription_identifier_available(&self) -> bool {
        self.received_properties
            .subscription_identifier_available
            .unwrap_or(true)
    }
}

/// A request to send a DISCONNECT, raised by a per-op state machine that
/// detected a malformed reply or a protocol violation.
#[derive(Debug, Clone)]
pub struct DisconnectRequest {
    pub reason_code: DisconnectReasonCode,
    pub reason_string: Option<String>,
}
