//! Error taxonomies for the MQTT client core.
//!
//! Three tiers:
//! - [`ConnectionError`]: fatal-or-retryable outcomes of the connect handshake.
//! - [`ClientError`]: local precondition failures, surfaced without network I/O.
//! - [`Internal`]: the transient tri-state used at the sender/matcher boundary,
//!   never visible to user handlers.

use std::fmt;

use thiserror::Error;

/// Outcome of a CONNECT attempt, mirroring the MQTT v5 CONNACK reason code
/// space plus the two handshake failures that precede it on the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// TLS handshake failed (surfaced by the transport layer).
    #[error("TLS handshake failed")]
    TlsHandshakeError,
    /// WebSocket handshake failed (surfaced by the transport layer).
    #[error("WebSocket handshake failed")]
    WebSocketHandshakeError,
    /// The Server does not wish to reveal the reason for the failure.
    #[error("the server did not accept the connection and declined to give a reason")]
    UnspecifiedError,
    /// Data within the CONNECT packet could not be correctly parsed.
    #[error("the server reported the CONNECT packet as malformed")]
    MalformedPacket,
    /// Data in the CONNECT packet does not conform to the specification.
    #[error("the server reported a CONNECT protocol error")]
    ProtocolError,
    /// The CONNECT is valid but is not accepted by this Server.
    #[error("the server implementation rejected a valid CONNECT")]
    ImplementationSpecificError,
    /// The Server does not support the requested protocol version.
    #[error("the server does not support MQTT v5")]
    UnsupportedProtocolVersion,
    /// The Client Identifier is a valid string but is not allowed by the Server.
    #[error("the client identifier was rejected by the server")]
    ClientIdentifierNotValid,
    /// The Server does not accept the supplied username/password.
    #[error("the server rejected the username or password")]
    BadUsernameOrPassword,
    /// The Client is not authorized to connect.
    #[error("the client is not authorized to connect")]
    NotAuthorized,
    /// The MQTT Server is not available.
    #[error("the server is unavailable")]
    ServerUnavailable,
    /// The Server is busy, try again later.
    #[error("the server is busy")]
    ServerBusy,
    /// This Client has been banned by administrative action.
    #[error("the client has been banned")]
    Banned,
    /// The authentication method is not supported or does not match.
    #[error("the authentication method is not supported")]
    BadAuthenticationMethod,
    /// The Will Topic Name is not accepted by this Server.
    #[error("the will topic name was rejected")]
    TopicNameInvalid,
    /// The CONNECT packet exceeded the maximum permissible size.
    #[error("the CONNECT packet was too large")]
    PacketTooLarge,
    /// An implementation or administrative imposed limit has been exceeded.
    #[error("a quota was exceeded")]
    QuotaExceeded,
    /// The Will Payload does not match the specified Payload Format Indicator.
    #[error("the will payload format was invalid")]
    PayloadFormatInvalid,
    /// Will Retain was set but the Server does not support retained messages.
    #[error("the server does not support retained messages")]
    RetainNotSupported,
    /// The Server does not support the QoS set in Will QoS.
    #[error("the server does not support the requested QoS")]
    QosNotSupported,
    /// The Client should temporarily use another server.
    #[error("the client should temporarily use another server")]
    UseAnotherServer,
    /// The Client should permanently use another server.
    #[error("the client should permanently use another server")]
    ServerMoved,
    /// The connection rate limit has been exceeded.
    #[error("the connection rate limit was exceeded")]
    ConnectionRateExceeded,
}

impl ConnectionError {
    /// True for the subset of failures that must never be retried: a fresh
    /// reconnect attempt cannot succeed without application intervention.
    #[must_use]
    pub fn is_not_recoverable(self) -> bool {
        matches!(
            self,
            ConnectionError::TlsHandshakeError
                | ConnectionError::WebSocketHandshakeError
                | ConnectionError::MalformedPacket
                | ConnectionError::UnsupportedProtocolVersion
                | ConnectionError::ClientIdentifierNotValid
                | ConnectionError::BadUsernameOrPassword
                | ConnectionError::NotAuthorized
                | ConnectionError::Banned
                | ConnectionError::BadAuthenticationMethod
                | ConnectionError::TopicNameInvalid
                | ConnectionError::PacketTooLarge
                | ConnectionError::QuotaExceeded
                | ConnectionError::PayloadFormatInvalid
                | ConnectionError::RetainNotSupported
                | ConnectionError::QosNotSupported
                | ConnectionError::UseAnotherServer
                | ConnectionError::ServerMoved
        )
    }

    /// Map a CONNACK reason code byte to a [`ConnectionError`].
    ///
    /// # Errors
    /// Returns `None` if the byte is not a member of the CONNACK reason
    /// code category.
    #[must_use]
    pub fn from_connack_reason_code(code: u8) -> Option<Self> {
        use ConnectionError::*;
        Some(match code {
            0x80 => UnspecifiedError,
            0x81 => MalformedPacket,
            0x82 => ProtocolError,
            0x83 => ImplementationSpecificError,
            0x84 => UnsupportedProtocolVersion,
            0x85 => ClientIdentifierNotValid,
            0x86 => BadUsernameOrPassword,
            0x87 => NotAuthorized,
            0x88 => ServerUnavailable,
            0x89 => ServerBusy,
            0x8A => Banned,
            0x8C => BadAuthenticationMethod,
            0x90 => TopicNameInvalid,
            0x95 => PacketTooLarge,
            0x97 => QuotaExceeded,
            0x99 => PayloadFormatInvalid,
            0x9A => RetainNotSupported,
            0x9B => QosNotSupported,
            0x9C => UseAnotherServer,
            0x9D => ServerMoved,
            0x9F => ConnectionRateExceeded,
            _ => return None,
        })
    }
}

/// Local precondition failures that are surfaced immediately, without
/// network I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A received packet violated the wire format.
    #[error("the packet is malformed: {0}")]
    MalformedPacket(String),
    /// The encoded packet exceeds the server's `maximum_packet_size`.
    #[error("the packet exceeds the maximum packet size the server will accept")]
    PacketTooLarge,
    /// The session does not exist or has expired.
    #[error("the client's session does not exist or has expired")]
    SessionExpired,
    /// No packet identifiers remain available.
    #[error("there are no more available packet identifiers to use")]
    PidOverrun,
    /// The topic name or filter does not conform to the specification.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    /// The server does not support the requested QoS.
    #[error("the server does not support the requested QoS")]
    QosNotSupported,
    /// The server does not support retained messages.
    #[error("the server does not support retained messages")]
    RetainNotAvailable,
    /// The topic alias exceeds the negotiated maximum.
    #[error("the topic alias exceeds the negotiated topic alias maximum")]
    TopicAliasMaximumReached,
    /// The server does not support wildcard subscriptions.
    #[error("the server does not support wildcard subscriptions")]
    WildcardSubscriptionNotAvailable,
    /// The server does not support subscription identifiers.
    #[error("the server does not support subscription identifiers")]
    SubscriptionIdentifierNotAvailable,
    /// The server does not support shared subscriptions.
    #[error("the server does not support shared subscriptions")]
    SharedSubscriptionNotAvailable,
}

/// Transient tri-state (`{Ok, Retry, Fatal(err)}`) used internally at the
/// sender/matcher boundary. Never returned to a user
/// handler directly; operation boundaries widen it into a public error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Internal<T> {
    /// The operation completed successfully with `T`.
    Ok(T),
    /// A reconnect happened mid-flight; the caller should reissue the request.
    Retry,
    /// Cancellation severed the operation; no reissue is possible.
    Aborted,
    /// A fatal, non-recoverable connection error.
    Fatal(ConnectionError),
}

impl<T> Internal<T> {
    /// True if this is [`Internal::Retry`].
    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Internal::Retry)
    }

    /// True if this is [`Internal::Aborted`].
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Internal::Aborted)
    }
}

/// Fatal top-level error returned from the session's `run` future.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Cancellation (`cancel()`) ended the run.
    #[error("the session was cancelled")]
    Aborted,
    /// A non-recoverable connection error ended the run.
    #[error("connection failed permanently: {0}")]
    Connection(#[from] ConnectionError),
    /// The endpoint resolver could not resolve any configured host.
    #[error("no configured broker host could be resolved")]
    HostNotFound,
    /// The reconnect policy declined to schedule another attempt.
    #[error("reconnection halted by policy")]
    ReconnectHalted,
}

/// Reason code the client attaches to an outbound DISCONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReasonCode {
    /// Normal, graceful disconnection. Will message is not published.
    NormalDisconnection,
    /// Disconnect but request the server publish the Will message.
    DisconnectWithWillMessage,
    /// The client does not wish to reveal the reason for disconnecting.
    UnspecifiedError,
    /// A received packet violated the wire format.
    MalformedPacket,
    /// A received packet violated protocol semantics.
    ProtocolError,
    /// Re-authentication requested by the application.
    Reauthenticate,
}

impl DisconnectReasonCode {
    /// The wire value of this reason code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DisconnectReasonCode::NormalDisconnection => 0x00,
            DisconnectReasonCode::DisconnectWithWillMessage => 0x04,
            DisconnectReasonCode::Reauthenticate => 0x19,
            DisconnectReasonCode::UnspecifiedError => 0x80,
            DisconnectReasonCode::MalformedPacket => 0x81,
            DisconnectReasonCode::ProtocolError => 0x82,
        }
    }
}

impl fmt::Display for DisconnectReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.code())
    }
}
