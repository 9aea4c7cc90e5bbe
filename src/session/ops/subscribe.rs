//! SUBSCRIBE state machine.

use tokio::sync::oneshot;

use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::codec::subscribe::{Subscribe, Subscription};
use crate::codec::suback::SubAck;
use crate::control_packet::ControlPacket;
use crate::error::{ClientError, Internal};
use crate::session::sender::SendRequest;
use crate::session::state::{DisconnectRequest, MqttContext};
use crate::session::SessionHandles;
use crate::topic;

use super::OpError;

/// A SUBSCRIBE the caller wants issued, one or more topic filters at once.
pub struct SubscribeRequest {
    pub subscriptions: Vec<Subscription>,
    pub properties: Properties,
}

/// Per-filter outcome plus any broker-returned properties.
pub struct SubscribeOutcome {
    pub reason_codes: Vec<u8>,
    pub properties: Properties,
}

fn check_preconditions(req: &SubscribeRequest, ctx: &MqttContext) -> Result<(), OpError> {
    if !req.properties.subscription_identifiers.is_empty() && !ctx.subscription_identifier_available() {
        return Err(ClientError::SubscriptionIdentifierNotAvailable.into());
    }
    for sub in &req.subscriptions {
        topic::validate_topic_filter(&sub.filter)
            .map_err(|e| OpError::Client(ClientError::InvalidTopic(e.to_string())))?;
        if topic::has_wildcard(&sub.filter) && !ctx.wildcard_subscription_available() {
            return Err(ClientError::WildcardSubscriptionNotAvailable.into());
        }
        if topic::is_shared_subscription(&sub.filter) && !ctx.shared_subscription_available() {
            return Err(ClientError::SharedSubscriptionNotAvailable.into());
        }
    }
    Ok(())
}

/// Issue `req`, returning once SUBACK has been matched.
pub async fn subscribe(req: SubscribeRequest, ctx: &MqttContext, handles: &SessionHandles) -> Result<SubscribeOutcome, OpError> {
    check_preconditions(&req, ctx)?;

    let pid = handles.pids.allocate();
    if pid == 0 {
        return Err(ClientError::PidOverrun.into());
    }

    let suback = loop {
        let packet = Subscribe {
            pkid: pid,
            properties: req.properties.clone(),
            subscriptions: req.subscriptions.clone(),
        };
        let control = ControlPacket::new(ControlPacketType::Subscribe, pid, packet.encode());

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

        match handles.matcher.async_wait_reply(ControlPacketType::SubAck, pid).await {
            Internal::Retry => continue,
            Internal::Aborted => {
                handles.pids.free(pid);
                return Err(OpError::Aborted);
            }
            Internal::Fatal(e) => {
                handles.pids.free(pid);
                return Err(e.into());
            }
            Internal::Ok(body) => match SubAck::decode(body) {
                Ok(ack) => break ack,
                Err(_) => {
                    let _ = handles.disconnect_tx.send(DisconnectRequest {
                        reason_code: crate::error::DisconnectReasonCode::MalformedPacket,
                        reason_string: Some("Malformed SUBACK: invalid Reason Code".into()),
                    });
                    continue;
                }
            },
        }
    };

    handles.sender.throttled_op_done().await;
    handles.pids.free(pid);
    Ok(SubscribeOutcome {
        reason_codes: suback.reason_codes,
        properties: suback.properties,
    })
}
