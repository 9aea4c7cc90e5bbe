//! User-initiated re-authentication: drives the same
//! `Authenticator` used at CONNECT time through a fresh AUTH/AUTH exchange.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::auth::AuthStep;
use crate::codec::auth_packet::Auth;
use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::control_packet::ControlPacket;
use crate::error::{ClientError, DisconnectReasonCode, Internal};
use crate::session::sender::SendRequest;
use crate::session::state::{DisconnectRequest, MqttContext};
use crate::session::SessionHandles;

use super::OpError;

const CONTINUE_AUTHENTICATION: u8 = 0x18;
const REAUTHENTICATE: u8 = 0x19;

fn encode_auth(reason_code: u8, method: &str, data: Bytes) -> ControlPacket {
    let auth = Auth {
        reason_code,
        properties: Properties {
            authentication_method: Some(method.to_string()),
            authentication_data: if data.is_empty() { None } else { Some(data) },
            ..Default::default()
        },
    };
    ControlPacket::new(ControlPacketType::Auth, 0, auth.encode())
}

async fn send_and_await(handles: &SessionHandles, packet: ControlPacket) -> Internal<()> {
    let (tx, rx) = oneshot::channel();
    let serial = handles.sender.next_serial();
    handles
        .sender
        .enqueue(SendRequest {
            packet,
            serial,
            throttled: false,
            prioritized: false,
            terminal: false,
            completion: tx,
        })
        .await;
    rx.await.unwrap_or(Internal::Aborted)
}

/// Request re-authentication. The caller is expected to feed subsequent
/// broker-initiated AUTH packets to [`MqttContext::authenticator`] via
/// whatever channel the connection manager's read loop uses; here we drive
/// the exchange to completion and return once the broker confirms success
/// or the exchange fails; failure triggers a protocol-error DISCONNECT.
pub async fn reauthenticate(ctx: &MqttContext, handles: &SessionHandles) -> Result<(), OpError> {
    let authenticator = ctx
        .authenticator
        .clone()
        .ok_or_else(|| OpError::Client(ClientError::MalformedPacket("no authenticator configured for reauthentication".into())))?;
    let method = authenticator.method().to_string();

    let initial = authenticator
        .auth(AuthStep::ClientInitial, Bytes::new())
        .await
        .map_err(|e| OpError::Client(ClientError::MalformedPacket(e.to_string())))?;

    match send_and_await(handles, encode_auth(REAUTHENTICATE, &method, initial)).await {
        Internal::Ok(()) | Internal::Retry => {}
        Internal::Aborted => return Err(OpError::Aborted),
        Internal::Fatal(e) => return Err(e.into()),
    }

    loop {
        match handles.matcher.async_wait_reply(ControlPacketType::Auth, 0).await {
            Internal::Aborted => return Err(OpError::Aborted),
            Internal::Fatal(e) => return Err(e.into()),
            Internal::Retry => continue,
            Internal::Ok(body) => {
                let auth = Auth::decode(body).map_err(|e| {
                    let _ = handles.disconnect_tx.send(DisconnectRequest {
                        reason_code: DisconnectReasonCode::ProtocolError,
                        reason_string: Some(format!("Malformed AUTH: {e}")),
                    });
                    OpError::Client(ClientError::MalformedPacket(e.to_string()))
                })?;

                if auth.reason_code == 0x00 {
                    let verified = authenticator
                        .auth(AuthStep::ServerFinal, auth.properties.authentication_data.unwrap_or_default())
                        .await;
                    return match verified {
                        Ok(_) => Ok(()),
                        Err(e) => {
                            let _ = handles.disconnect_tx.send(DisconnectRequest {
                                reason_code: DisconnectReasonCode::ProtocolError,
                                reason_string: Some(e.to_string()),
                            });
                            Err(OpError::Client(ClientError::MalformedPacket(e.to_string())))
                        }
                    };
                }

                if auth.reason_code != CONTINUE_AUTHENTICATION {
                    let _ = handles.disconnect_tx.send(DisconnectRequest {
                        reason_code: DisconnectReasonCode::ProtocolError,
                        reason_string: Some("unexpected AUTH reason code during reauthentication".into()),
                    });
                    return Err(OpError::Client(ClientError::MalformedPacket(
                        "unexpected AUTH reason code".into(),
                    )));
                }

                let challenge_data = auth.properties.authentication_data.unwrap_or_default();
                let reply = authenticator.auth(AuthStep::ServerChallenge, challenge_data).await;
                let reply = match reply {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = handles.disconnect_tx.send(DisconnectRequest {
                            reason_code: DisconnectReasonCode::ProtocolError,
                            reason_string: Some(e.to_string()),
                        });
                        return Err(OpError::Client(ClientError::MalformedPacket(e.to_string())));
                    }
                };

                match send_and_await(handles, encode_auth(CONTINUE_AUTHENTICATION, &method, reply)).await {
                    Internal::Ok(()) | Internal::Retry => continue,
                    Internal::Aborted => return Err(OpError::Aborted),
                    Internal::Fatal(e) => return Err(e.into()),
                }
            }
        }
    }
}
