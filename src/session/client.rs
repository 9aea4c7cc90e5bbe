//! The top-level session façade: owns the shared handles,
//! drives the reconnect loop, and exposes the public operation surface.

use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex as TokioMutex, RwLock as TokioRwLock};
use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::codec::auth_packet::Auth;
use crate::codec::connect::Will;
use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::connection_settings::MqttConnectionSettings;
use crate::error::{DisconnectReasonCode, RunError};
use crate::logger::ConnectionLogger;
use crate::pid::PidAllocator;
use crate::transport::Transport;

use super::assembler::{AssembledPacket, Assembler};
use super::connection_manager::{ConnectError, ConnectionManager};
use super::ops::{self, OpError};
use super::receiver::{ReceivedMessage, Receiver};
use super::reply_matcher::ReplyMatcher;
use super::sender::Sender;
use super::state::{DisconnectRequest, MqttContext, SessionState};
use super::SessionHandles;

/// Everything [`Client::configure`] needs to build a session.
pub struct ClientConfig {
    pub settings: MqttConnectionSettings,
    pub will: Option<Will>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub requested_properties: Properties,
    pub logger: Arc<dyn ConnectionLogger>,
}

/// A running (or not-yet-started) MQTT v5 session, generic over its
/// transport so the core never depends on a concrete socket implementation.
pub struct Client<T: Transport + Default> {
    handles: SessionHandles,
    ctx: TokioRwLock<MqttContext>,
    state: StdMutex<SessionState>,
    settings: MqttConnectionSettings,
    manager: TokioMutex<ConnectionManager<T>>,
    disconnect_rx: TokioMutex<mpsc::UnboundedReceiver<DisconnectRequest>>,
    cancel: CancellationToken,
    logger: Arc<dyn ConnectionLogger>,
}

impl<T: Transport + Default + 'static> Client<T> {
    /// Build a session from `config`. The returned
    /// handle is not yet connected; call [`Client::run`] to drive it.
    #[must_use]
    pub fn configure(config: ClientConfig) -> Arc<Self> {
        let ClientConfig {
            settings,
            will,
            authenticator,
            requested_properties,
            logger,
        } = config;

        let ctx = MqttContext {
            client_id: settings.client_id.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            will,
            clean_start: settings.clean_start,
            keep_alive: keep_alive_secs(&settings),
            requested_properties,
            received_properties: Properties::default(),
            authenticator,
        };

        let endpoints = settings.endpoints();
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        let handles = SessionHandles {
            sender: Arc::new(Sender::new()),
            matcher: Arc::new(ReplyMatcher::new()),
            pids: Arc::new(PidAllocator::new()),
            receiver: Arc::new(Receiver::new()),
            disconnect_tx,
        };

        Arc::new(Self {
            handles,
            ctx: TokioRwLock::new(ctx),
            state: StdMutex::new(SessionState::default()),
            manager: TokioMutex::new(ConnectionManager::new(endpoints, logger.clone())),
            disconnect_rx: TokioMutex::new(disconnect_rx),
            cancel: CancellationToken::new(),
            settings,
            logger,
        })
    }

    /// Drive the session until a fatal error, cancellation, or a graceful
    /// application-requested disconnect ends it.
    pub async fn run(self: &Arc<Self>) -> Result<(), RunError> {
        let keep_alive = self.ctx.read().await.keep_alive;
        let ping = tokio::spawn(ops::ping::run(keep_alive, self.handles.clone()));
        let sentry = tokio::spawn(ops::sentry::run(self.handles.clone()));
        let disconnects = tokio::spawn(self.clone().drive_disconnect_requests());

        let result = self.reconnect_loop().await;

        ping.abort();
        sentry.abort();
        disconnects.abort();
        self.handles.matcher.cancel_unanswered();
        result
    }

    /// Sever every outstanding operation and stop [`Client::run`]. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handles.matcher.cancel_unanswered();
    }

    /// Publish a message.
    pub async fn publish(&self, req: ops::publish::PublishRequest) -> Result<ops::publish::PublishOutcome, OpError> {
        let ctx = self.ctx.read().await;
        ops::publish::publish(req, &ctx, &self.handles).await
    }

    /// Subscribe to one or more topic filters.
    pub async fn subscribe(&self, req: ops::subscribe::SubscribeRequest) -> Result<ops::subscribe::SubscribeOutcome, OpError> {
        let ctx = self.ctx.read().await;
        ops::subscribe::subscribe(req, &ctx, &self.handles).await
    }

    /// Unsubscribe from one or more topic filters.
    pub async fn unsubscribe(&self, req: ops::unsubscribe::UnsubscribeRequest) -> Result<ops::unsubscribe::UnsubscribeOutcome, OpError> {
        let ctx = self.ctx.read().await;
        ops::unsubscribe::unsubscribe(req, &ctx, &self.handles).await
    }

    /// Await the next inbound application message.
    pub async fn receive(&self) -> Option<ReceivedMessage> {
        self.handles.receiver.receive().await
    }

    /// Gracefully end the session with a normal DISCONNECT. Returns once
    /// the DISCONNECT has been written; `run` then unwinds and returns
    /// `Ok(())`.
    pub async fn disconnect(&self) -> Result<(), OpError> {
        let ctx = self.ctx.read().await;
        let req = DisconnectRequest {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            reason_string: None,
        };
        ops::disconnect::disconnect(req, &ctx, &self.handles).await
    }

    /// Re-run the configured [`Authenticator`] against a fresh AUTH exchange.
    pub async fn re_authenticate(&self) -> Result<(), OpError> {
        let ctx = self.ctx.read().await;
        ops::reauth::reauthenticate(&ctx, &self.handles).await
    }

    /// Read-only snapshot of the most recent CONNACK properties.
    pub async fn connack_properties(&self) -> Properties {
        self.ctx.read().await.received_properties.clone()
    }

    /// Whether the broker reported a pre-existing session on the most recent CONNACK.
    #[must_use]
    pub fn session_present(&self) -> bool {
        self.state.lock().unwrap().session_present
    }

    async fn drive_disconnect_requests(self: Arc<Self>) {
        let mut rx = self.disconnect_rx.lock().await;
        while let Some(req) = rx.recv().await {
            let ctx = self.ctx.read().await;
            if let Err(e) = ops::disconnect::disconnect(req, &ctx, &self.handles).await {
                log::warn!("failed to issue requested DISCONNECT: {e:?}");
            }
        }
    }

    async fn reconnect_loop(self: &Arc<Self>) -> Result<(), RunError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(RunError::Aborted);
            }

            let handshake = {
                let ctx = self.ctx.read().await;
                let mut manager = self.manager.lock().await;
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(RunError::Aborted),
                    result = manager.reconnect(&ctx, &self.settings) => result,
                }
            };

            let handshake = match handshake {
                Ok(h) => h,
                Err(ConnectError::Fatal(e)) => return Err(RunError::Connection(e)),
                Err(ConnectError::Retry) => continue,
            };

            let mut transport = handshake.transport;
            let connack = handshake.connack;

            {
                let mut ctx = self.ctx.write().await;
                ctx.received_properties = connack.properties.clone();
            }
            {
                let mut state = self.state.lock().unwrap();
                if !connack.session_present {
                    state.reset();
                    self.handles.receiver.push_session_expired();
                }
                state.session_present = connack.session_present;
            }

            let mut assembler = Assembler::new();
            assembler.set_maximum_packet_size(connack.properties.maximum_packet_size);

            let new_limit = connack.properties.receive_maximum.unwrap_or(u16::MAX);
            let requeued = self.handles.sender.reconnect_reset(new_limit, &self.handles.matcher).await;
            for req in requeued {
                self.handles.sender.enqueue(req).await;
            }
            self.handles.matcher.clear_fast_replies();

            let outcome = run_connection(&mut transport, &self.handles, &mut assembler, &self.cancel, self.logger.as_ref()).await;
            transport.close();

            match outcome {
                ConnectionOutcome::Cancelled => {
                    self.handles.matcher.cancel_unanswered();
                    return Err(RunError::Aborted);
                }
                ConnectionOutcome::SentTerminalDisconnect => {
                    self.handles.matcher.cancel_unanswered();
                    self.cancel.cancel();
                    return Ok(());
                }
                ConnectionOutcome::ServerDisconnect(_) | ConnectionOutcome::Closed | ConnectionOutcome::TransportError | ConnectionOutcome::Malformed => {}
            }
        }
    }
}

fn keep_alive_secs(settings: &MqttConnectionSettings) -> u16 {
    u16::try_from(settings.keep_alive.as_secs()).unwrap_or(u16::MAX)
}

/// Sentinel packet id waiters for AUTH replies key on: AUTH carries no
/// packet identifier of its own.
const AUTH_REPLY_PID: u16 = 0;

enum ConnectionOutcome {
    Cancelled,
    SentTerminalDisconnect,
    ServerDisconnect(u8),
    Closed,
    TransportError,
    Malformed,
}

/// Drives one connection's worth of I/O: reads frame the inbound stream and
/// route it, writes drain whatever the sender currently has
/// eligible. Returns once the transport fails, the server
/// disconnects, a terminal (application-requested) DISCONNECT is written, or
/// cancellation fires.
async fn run_connection<T: Transport>(
    transport: &mut T,
    handles: &SessionHandles,
    assembler: &mut Assembler,
    cancel: &CancellationToken,
    logger: &dyn ConnectionLogger,
) -> ConnectionOutcome {
    let mut read_buf = [0u8; 4096];
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return ConnectionOutcome::Cancelled,
            read = transport.read_some(&mut read_buf) => {
                match read {
                    Ok(0) => return ConnectionOutcome::Closed,
                    Ok(n) => {
                        assembler.feed(&read_buf[..n]);
                        loop {
                            match assembler.drain_routed(&handles.matcher) {
                                Ok(Some(AssembledPacket::Publish(p))) => {
                                    handles.receiver.publish(p.topic, p.payload, p.properties);
                                }
                                Ok(Some(AssembledPacket::Auth(auth))) => {
                                    handles.matcher.dispatch(ControlPacketType::Auth, AUTH_REPLY_PID, auth_reply_body(&auth));
                                }
                                Ok(Some(AssembledPacket::Disconnect(d))) => {
                                    logger.on_disconnect(d.reason_code);
                                    return ConnectionOutcome::ServerDisconnect(d.reason_code);
                                }
                                Ok(None) => break,
                                Err(_) => {
                                    assembler.clear();
                                    return ConnectionOutcome::Malformed;
                                }
                            }
                        }
                    }
                    Err(_) => return ConnectionOutcome::TransportError,
                }
            }
            () = handles.sender.notified() => {}
        }

        let batch = handles.sender.take_batch().await;
        if batch.is_empty() {
            continue;
        }
        let terminal_write = batch.iter().any(|r| r.terminal);
        let refs: Vec<&[u8]> = batch.iter().map(|r| r.packet.bytes()).collect();
        let result = transport.write_all(&refs).await;
        handles.sender.write_done().await;

        match result {
            Ok(()) => {
                for req in batch {
                    let _ = req.completion.send(crate::error::Internal::Ok(()));
                }
                if terminal_write {
                    return ConnectionOutcome::SentTerminalDisconnect;
                }
            }
            Err(_) => {
                for req in batch {
                    let _ = req.completion.send(crate::error::Internal::Retry);
                }
                return ConnectionOutcome::TransportError;
            }
        }
    }
}

/// Re-derive the decoded-body bytes [`super::reply_matcher::ReplyMatcher`]
/// expects from an already-decoded [`Auth`] packet. The assembler surfaces
/// AUTH directly rather than dispatching it (it carries no packet id to key
/// on), so the run loop bridges it into the matcher itself, keyed on the
/// sentinel packet id `0` that [`super::ops::reauth`] waits on.
fn auth_reply_body(auth: &Auth) -> Bytes {
    let full = auth.encode();
    match crate::codec::varint::decode(&full[1..]) {
        Ok((_, consumed)) => Bytes::copy_from_slice(&full[1 + consumed..]),
        Err(_) => Bytes::new(),
    }
}
