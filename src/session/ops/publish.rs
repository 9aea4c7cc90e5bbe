//! PUBLISH state machine for QoS 0/1/2.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::codec::ack::Ack;
use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::codec::publish::Publish;
use crate::control_packet::{ControlPacket, QoS};
use crate::error::{ClientError, Internal};
use crate::session::sender::SendRequest;
use crate::session::state::{DisconnectRequest, MqttContext};
use crate::session::SessionHandles;

use super::OpError;

/// A PUBLISH the caller wants delivered.
pub struct PublishRequest {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
}

/// Result of a successful PUBLISH (QoS 0 always reports reason 0).
pub struct PublishOutcome {
    pub reason_code: u8,
    pub properties: Properties,
}

fn encode(pid: u16, dup: bool, req: &PublishRequest) -> ControlPacket {
    let publish = Publish {
        topic: req.topic.clone(),
        pkid: pid,
        qos: req.qos,
        dup,
        retain: req.retain,
        properties: req.properties.clone(),
        payload: req.payload.clone(),
    };
    ControlPacket::new(ControlPacketType::Publish, pid, publish.encode())
}

fn check_preconditions(req: &PublishRequest, ctx: &MqttContext) -> Result<(), OpError> {
    if let Some(max_qos) = ctx.maximum_qos() {
        if (req.qos as u8) > max_qos {
            return Err(ClientError::QosNotSupported.into());
        }
    }
    if req.retain && !ctx.retain_available() {
        return Err(ClientError::RetainNotAvailable.into());
    }
    if let Some(alias) = req.properties.topic_alias {
        if alias == 0 || alias > ctx.topic_alias_maximum() {
            return Err(ClientError::TopicAliasMaximumReached.into());
        }
    }
    crate::topic::validate_topic_name(&req.topic)
        .map_err(|e| OpError::Client(ClientError::InvalidTopic(e.to_string())))?;
    Ok(())
}

async fn send_and_await_write(handles: &SessionHandles, packet: ControlPacket, serial: u32, throttled: bool) -> Internal<()> {
    let (tx, rx) = oneshot::channel();
    handles
        .sender
        .enqueue(SendRequest {
            packet,
            serial,
            throttled,
            prioritized: false,
            terminal: false,
            completion: tx,
        })
        .await;
    rx.await.unwrap_or(Internal::Aborted)
}

fn request_malformed_disconnect(handles: &SessionHandles, what: &str) {
    let _ = handles.disconnect_tx.send(DisconnectRequest {
        reason_code: crate::error::DisconnectReasonCode::MalformedPacket,
        reason_string: Some(format!("Malformed {what}: invalid Reason Code")),
    });
}

/// Publish `req`, blocking until the outcome is known.
pub async fn publish(req: PublishRequest, ctx: &MqttContext, handles: &SessionHandles) -> Result<PublishOutcome, OpError> {
    check_preconditions(&req, ctx)?;

    match req.qos {
        QoS::AtMostOnce => {
            let serial = handles.sender.next_serial();
            let packet = encode(0, false, &req);
            match send_and_await_write(handles, packet, serial, false).await {
                Internal::Ok(()) | Internal::Retry => Ok(PublishOutcome {
                    reason_code: 0,
                    properties: Properties::default(),
                }),
                Internal::Aborted => Err(OpError::Aborted),
                Internal::Fatal(e) => Err(e.into()),
            }
        }
        QoS::AtLeastOnce => publish_qos1(req, handles).await,
        QoS::ExactlyOnce => publish_qos2(req, handles).await,
    }
}

async fn publish_qos1(req: PublishRequest, handles: &SessionHandles) -> Result<PublishOutcome, OpError> {
    let pid = handles.pids.allocate();
    if pid == 0 {
        return Err(ClientError::PidOverrun.into());
    }
    let serial = handles.sender.next_serial();
    let mut dup = false;
    let outcome = loop {
        let packet = encode(pid, dup, &req);
        match send_and_await_write(handles, packet, serial, true).await {
            Internal::Retry => {
                dup = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(()) => {}
        }

        match handles.matcher.async_wait_reply(ControlPacketType::PubAck, pid).await {
            Internal::Retry => {
                dup = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(body) => match Ack::decode(ControlPacketType::PubAck, body) {
                Ok(ack) => {
                    break PublishOutcome {
                        reason_code: ack.reason_code,
                        properties: ack.properties,
                    }
                }
                Err(_) => {
                    request_malformed_disconnect(handles, "PUBACK");
                    dup = true;
                    continue;
                }
            },
        }
    };
    handles.sender.throttled_op_done().await;
    handles.pids.free(pid);
    Ok(outcome)
}

async fn publish_qos2(req: PublishRequest, handles: &SessionHandles) -> Result<PublishOutcome, OpError> {
    let pid = handles.pids.allocate();
    if pid == 0 {
        return Err(ClientError::PidOverrun.into());
    }
    let serial = handles.sender.next_serial();
    let mut dup = false;

    // Phase 1: PUBLISH -> PUBREC.
    let pubrec = loop {
        let packet = encode(pid, dup, &req);
        match send_and_await_write(handles, packet, serial, true).await {
            Internal::Retry => {
                dup = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(()) => {}
        }

        match handles.matcher.async_wait_reply(ControlPacketType::PubRec, pid).await {
            Internal::Retry => {
                dup = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(body) => match Ack::decode(ControlPacketType::PubRec, body) {
                Ok(ack) => break ack,
                Err(_) => {
                    request_malformed_disconnect(handles, "PUBREC");
                    dup = true;
                    continue;
                }
            },
        }
    };

    if pubrec.reason_code >= 0x80 {
        handles.sender.throttled_op_done().await;
        handles.pids.free(pid);
        return Ok(PublishOutcome {
            reason_code: pubrec.reason_code,
            properties: pubrec.properties,
        });
    }

    // Phase 2: PUBREL -> PUBCOMP, prioritized.
    let mut rel_dup_attempt = false;
    let pubcomp = loop {
        let rel = Ack {
            pkid: pid,
            reason_code: 0,
            properties: Properties::default(),
        };
        let packet = ControlPacket::new(ControlPacketType::PubRel, pid, rel.encode(ControlPacketType::PubRel));
        let (tx, rx) = oneshot::channel();
        handles
            .sender
            .enqueue(SendRequest {
                packet,
                serial,
                throttled: rel_dup_attempt,
                prioritized: true,
                terminal: false,
                completion: tx,
            })
            .await;
        match rx.await.unwrap_or(Internal::Aborted) {
            Internal::Retry => {
                rel_dup_attempt = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(()) => {}
        }

        match handles.matcher.async_wait_reply(ControlPacketType::PubComp, pid).await {
            Internal::Retry => {
                rel_dup_attempt = true;
                continue;
            }
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(body) => match Ack::decode(ControlPacketType::PubComp, body) {
                Ok(ack) => break ack,
                Err(_) => {
                    request_malformed_disconnect(handles, "PUBCOMP");
                    rel_dup_attempt = true;
                    continue;
                }
            },
        }
    };

    handles.sender.throttled_op_done().await;
    handles.pids.free(pid);
    Ok(PublishOutcome {
        reason_code: pubcomp.reason_code,
        properties: pubcomp.properties,
    })
}
