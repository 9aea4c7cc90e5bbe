//! UNSUBSCRIBE state machine.

use tokio::sync::oneshot;

use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::codec::unsuback::UnsubAck;
use crate::codec::unsubscribe::Unsubscribe;
use crate::control_packet::ControlPacket;
use crate::error::{ClientError, Internal};
use crate::session::sender::SendRequest;
use crate::session::state::{DisconnectRequest, MqttContext};
use crate::session::SessionHandles;
use crate::topic;

use super::OpError;

/// An UNSUBSCRIBE the caller wants issued, one or more filters at once.
pub struct UnsubscribeRequest {
    pub filters: Vec<String>,
    pub properties: Properties,
}

/// Per-filter outcome plus any broker-returned properties.
pub struct UnsubscribeOutcome {
    pub reason_codes: Vec<u8>,
    pub properties: Properties,
}

fn check_preconditions(req: &UnsubscribeRequest) -> Result<(), OpError> {
    for filter in &req.filters {
        topic::validate_topic_filter(filter)
            .map_err(|e| OpError::Client(ClientError::InvalidTopic(e.to_string())))?;
    }
    Ok(())
}

/// Issue `req`, returning once UNSUBACK has been matched.
pub async fn unsubscribe(req: UnsubscribeRequest, _ctx: &MqttContext, handles: &SessionHandles) -> Result<UnsubscribeOutcome, OpError> {
    check_preconditions(&req)?;

    let pid = handles.pids.allocate();
    if pid == 0 {
        return Err(ClientError::PidOverrun.into());
    }

    let unsuback = loop {
        let packet = Unsubscribe {
            pkid: pid,
            properties: req.properties.clone(),
            filters: req.filters.clone(),
        };
        let control = ControlPacket::new(ControlPacketType::Unsubscribe, pid, packet.encode());

        let (tx, rx) = oneshot::channel();
        let serial = handles.sender.next_serial();
        handles
            .sender
            .enqueue(SendRequest {
                packet: control,
                serial,
                throttled: true,
                prioritized: false,
                terminal: false,
                completion: tx,
            })
            .await;
        match rx.await.unwrap_or(Internal::Aborted) {
            Internal::Retry => continue,
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

        match handles.matcher.async_wait_reply(ControlPacketType::UnsubAck, pid).await {
            Internal::Retry => continue,
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(body) => match UnsubAck::decode(body) {
                Ok(ack) => break ack,
                Err(_) => {
                    let _ = handles.disconnect_tx.send(DisconnectRequest {
                        reason_code: crate::error::DisconnectReasonCode::MalformedPacket,
                        reason_string: Some("Malformed UNSUBACK: invalid Reason Code".into()),
                    });
                    continue;
                }
            },
        }
    };

    handles.sender.throttled_op_done().await;
    handles.pids.free(pid);
    Ok(UnsubscribeOutcome {
        reason_codes: unsuback.reason_codes,
        properties: unsuback.properties,
    })
}
