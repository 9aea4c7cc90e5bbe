//! Connection lifecycle: endpoint failover, backoff, and the
//! CONNECT/CONNACK (optionally AUTH) handshake.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time;

use crate::auth::AuthStep;
use crate::codec::auth_packet::Auth;
use crate::codec::connack::ConnAck;
use crate::codec::connect::Connect;
use crate::codec::packet_type::ControlPacketType;
use crate::codec::varint;
use crate::codec::PacketDecodeError;
use crate::connection_settings::MqttConnectionSettings;
use crate::error::ConnectionError;
use crate::logger::ConnectionLogger;
use crate::session::backoff::Backoff;
use crate::session::state::MqttContext;
use crate::sync::AsyncMutex;
use crate::topic::Endpoint;
use crate::transport::Transport;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const HANDSHAKE_SCRATCH: usize = 8192;

/// Outcome of a single reconnect attempt.
pub enum ConnectError {
    /// This endpoint, or this attempt, failed but another attempt may succeed.
    Retry,
    /// The handshake failed in a way no retry can fix.
    Fatal(ConnectionError),
}

/// Result of a completed handshake: the live transport plus the negotiated CONNACK.
pub struct Handshake<T> {
    pub transport: T,
    pub connack: ConnAck,
}

/// Drives endpoint failover, backoff, and the CONNECT handshake. Generic
/// over the transport so the session never needs a trait object.
pub struct ConnectionManager<T: Transport + Default> {
    endpoints: Vec<Endpoint>,
    cursor: usize,
    backoff: Backoff,
    reconnect_lock: AsyncMutex<()>,
    logger: Arc<dyn ConnectionLogger>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Transport + Default> ConnectionManager<T> {
    #[must_use]
    pub fn new(endpoints: Vec<Endpoint>, logger: Arc<dyn ConnectionLogger>) -> Self {
        Self {
            endpoints,
            cursor: 0,
            backoff: Backoff::new(),
            reconnect_lock: AsyncMutex::new(()),
            logger,
            _marker: std::marker::PhantomData,
        }
    }

    /// Attempt endpoints in round-robin order, with a 5s timeout per attempt
    /// and exponential backoff between rounds, until one succeeds or a fatal
    /// CONNACK reason code is received.
    pub async fn reconnect(&mut self, ctx: &MqttContext, settings: &MqttConnectionSettings) -> Result<Handshake<T>, ConnectError> {
        let _guard = self.reconnect_lock.lock().await;
        if self.endpoints.is_empty() {
            return Err(ConnectError::Fatal(ConnectionError::ServerUnavailable));
        }

        loop {
            let endpoint = self.endpoints[self.cursor].clone();
            self.cursor = (self.cursor + 1) % self.endpoints.len();
            self.logger.on_resolve(&endpoint.host);

            let mut transport = T::default();
            let attempt = time::timeout(
                HANDSHAKE_TIMEOUT,
                connect_and_handshake(&mut transport, &endpoint, ctx, settings, self.logger.as_ref()),
            )
            .await;

            match attempt {
                Ok(Ok(connack)) => {
                    self.backoff.reset();
                    return Ok(Handshake { transport, connack });
                }
                Ok(Err(ConnectError::Fatal(e))) => return Err(ConnectError::Fatal(e)),
                Ok(Err(ConnectError::Retry)) | Err(_) => {
                    time::sleep(self.backoff.next_delay()).await;
                }
            }
        }
    }
}

async fn connect_and_handshake<T: Transport>(
    transport: &mut T,
    endpoint: &Endpoint,
    ctx: &MqttContext,
    settings: &MqttConnectionSettings,
    logger: &dyn ConnectionLogger,
) -> Result<ConnAck, ConnectError> {
    transport.connect(endpoint).await.map_err(|e| {
        logger.on_tcp_connect(endpoint, Some(&e.to_string()));
        ConnectError::Retry
    })?;
    logger.on_tcp_connect(endpoint, None);

    if transport.is_tls() {
        transport.set_sni_hostname(&endpoint.host);
        transport.tls_handshake().await.map_err(|e| {
            logger.on_tls_handshake(Some(&e.to_string()));
            ConnectError::Fatal(ConnectionError::TlsHandshakeError)
        })?;
        logger.on_tls_handshake(None);
    }

    if transport.is_ws() {
        let path = endpoint.path.as_deref().unwrap_or("/mqtt");
        transport.ws_handshake(&endpoint.host, path).await.map_err(|e| {
            logger.on_ws_handshake(Some(&e.to_string()));
            ConnectError::Fatal(ConnectionError::WebSocketHandshakeError)
        })?;
        logger.on_ws_handshake(None);
    }

    let mut auth_method = None;
    let mut auth_data = Bytes::new();
    if let Some(authenticator) = &ctx.authenticator {
        auth_method = Some(authenticator.method().to_string());
        auth_data = authenticator
            .auth(AuthStep::ClientInitial, Bytes::new())
            .await
            .map_err(|_| ConnectError::Fatal(ConnectionError::BadAuthenticationMethod))?;
    }

    let connect = build_connect(ctx, settings, auth_method.as_deref(), auth_data);
    let bytes = connect.encode();
    transport.write_all(&[&bytes]).await.map_err(|_| ConnectError::Retry)?;

    let mut reader = HandshakeReader::new();
    loop {
        let (packet_type, body) = reader.read_packet(transport).await?;
        match packet_type {
            ControlPacketType::Auth => {
                let auth = Auth::decode(body).map_err(|_| ConnectError::Fatal(ConnectionError::MalformedPacket))?;
                let authenticator = ctx
                    .authenticator
                    .as_ref()
                    .ok_or(ConnectError::Fatal(ConnectionError::ProtocolError))?;
                let challenge_data = auth.properties.authentication_data.unwrap_or_default();
                let reply = authenticator
                    .auth(AuthStep::ServerChallenge, challenge_data)
                    .await
                    .map_err(|_| ConnectError::Fatal(ConnectionError::NotAuthorized))?;
                let reply_packet = Auth {
                    reason_code: 0x18,
                    properties: crate::codec::properties::Properties {
                        authentication_method: auth_method.clone(),
                        authentication_data: Some(reply),
                        ..Default::default()
                    },
                };
                transport
                    .write_all(&[&reply_packet.encode()])
                    .await
                    .map_err(|_| ConnectError::Retry)?;
            }
            ControlPacketType::ConnAck => {
                let connack = ConnAck::decode(body).map_err(|e| {
                    logger.on_connack(0x81, false);
                    match e {
                        PacketDecodeError::InvalidReasonCode(code) => ConnectError::Fatal(
                            ConnectionError::from_connack_reason_code(code).unwrap_or(ConnectionError::UnspecifiedError),
                        ),
                        _ => ConnectError::Fatal(ConnectionError::MalformedPacket),
                    }
                })?;
                logger.on_connack(connack.reason_code, connack.session_present);
                if connack.reason_code >= 0x80 {
                    let err = ConnectionError::from_connack_reason_code(connack.reason_code)
                        .unwrap_or(ConnectionError::UnspecifiedError);
                    return Err(if err.is_not_recoverable() {
                        ConnectError::Fatal(err)
                    } else {
                        ConnectError::Retry
                    });
                }
                if let (Some(authenticator), Some(data)) =
                    (&ctx.authenticator, connack.properties.authentication_data.clone())
                {
                    authenticator
                        .auth(AuthStep::ServerFinal, data)
                        .await
                        .map_err(|_| ConnectError::Fatal(ConnectionError::NotAuthorized))?;
                }
                return Ok(connack);
            }
            _ => return Err(ConnectError::Fatal(ConnectionError::ProtocolError)),
        }
    }
}

fn build_connect(ctx: &MqttContext, settings: &MqttConnectionSettings, auth_method: Option<&str>, auth_data: Bytes) -> Connect {
    let mut properties = ctx.requested_properties.clone();
    properties.session_expiry_interval = settings.session_expiry_interval;
    properties.receive_maximum = settings.receive_maximum;
    properties.topic_alias_maximum = settings.topic_alias_maximum;
    properties.maximum_packet_size = settings.maximum_packet_size;
    if let Some(method) = auth_method {
        properties.authentication_method = Some(method.to_string());
        if !auth_data.is_empty() {
            properties.authentication_data = Some(auth_data);
        }
    }

    Connect {
        client_id: ctx.client_id.clone(),
        clean_start: ctx.clean_start,
        keep_alive: ctx.keep_alive,
        properties,
        will: ctx.will.clone(),
        username: ctx.username.clone(),
        password: ctx.password.clone(),
    }
}

/// A tiny framer used only during the handshake, before the full
/// [`super::assembler::Assembler`]/[`super::reply_matcher::ReplyMatcher`]
/// pipeline is running (CONNACK is not a packet type the post-handshake read
/// path ever sees again).
struct HandshakeReader {
    buf: BytesMut,
}

impl HandshakeReader {
    fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(HANDSHAKE_SCRATCH),
        }
    }

    async fn read_packet<T: Transport>(&mut self, transport: &mut T) -> Result<(ControlPacketType, Bytes), ConnectError> {
        loop {
            if let Some(parsed) = self.try_parse()? {
                return Ok(parsed);
            }
            let mut scratch = [0u8; 4096];
            let n = transport.read_some(&mut scratch).await.map_err(|_| ConnectError::Retry)?;
            if n == 0 {
                return Err(ConnectError::Retry);
            }
            self.buf.extend_from_slice(&scratch[..n]);
        }
    }

    fn try_parse(&mut self) -> Result<Option<(ControlPacketType, Bytes)>, ConnectError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let first = self.buf[0];
        let packet_type = ControlPacketType::from_code(first >> 4).ok_or(ConnectError::Fatal(ConnectionError::MalformedPacket))?;
        let (remaining_len, consumed) = match varint::decode(&self.buf[1..]) {
            Ok(v) => v,
            Err(varint::DecodeError::Incomplete) => return Ok(None),
            Err(varint::DecodeError::Malformed) => return Err(ConnectError::Fatal(ConnectionError::MalformedPacket)),
        };
        let total = 1 + consumed + remaining_len as usize;
        if total > HANDSHAKE_SCRATCH {
            return Err(ConnectError::Fatal(ConnectionError::PacketTooLarge));
        }
        if self.buf.len() < total {
            return Ok(None);
        }
        let mut packet = self.buf.split_to(total);
        let body = packet.split_off(1 + consumed).freeze();
        Ok(Some((packet_type, body)))
    }
}
