//! DISCONNECT issuance: encodes the outbound reason,
//! shrinks it if it would exceed the broker's `maximum_packet_size`, and
//! enqueues it as the terminal send ahead of any queued work.

use tokio::sync::oneshot;

use crate::codec::disconnect::Disconnect;
use crate::codec::packet_type::ControlPacketType;
use crate::codec::properties::Properties;
use crate::codec::strtypes::validate_mqtt_utf8;
use crate::control_packet::ControlPacket;
use crate::error::{ClientError, Internal};
use crate::session::sender::SendRequest;
use crate::session::state::{DisconnectRequest, MqttContext};
use crate::session::SessionHandles;

use super::OpError;

fn build_properties(req: &DisconnectRequest) -> Result<Properties, OpError> {
    if let Some(reason) = &req.reason_string {
        validate_mqtt_utf8(reason)
            .map_err(|_| ClientError::MalformedPacket("DISCONNECT reason string is not valid MQTT UTF-8".into()))?;
    }
    Ok(Properties {
        reason_string: req.reason_string.clone(),
        ..Default::default()
    })
}

/// Encode and enqueue `req` as the terminal outbound send.
/// Returns once the write completes, is cancelled, or a
/// reconnect interrupted it.
pub async fn disconnect(req: DisconnectRequest, ctx: &MqttContext, handles: &SessionHandles) -> Result<(), OpError> {
    let properties = build_properties(&req)?;
    let packet = Disconnect {
        reason_code: req.reason_code.code(),
        properties,
    };

    let mut bytes = packet.encode();
    if let Some(max) = ctx.maximum_packet_size() {
        if bytes.len() as u32 > max {
            bytes = packet.encode_without_properties();
        }
    }

    let control = ControlPacket::new(ControlPacketType::Disconnect, 0, bytes);
    let (tx, rx) = oneshot::channel();
    let serial = handles.sender.next_serial();
    handles
        .sender
        .enqueue(SendRequest {
            packet: control,
            serial,
            throttled: false,
            prioritized: false,
            terminal: true,
            completion: tx,
        })
        .await;

    match rx.await.unwrap_or(Internal::Aborted) {
        Internal::Ok(()) | Internal::Retry => Ok(()),
        Internal::Aborted => Err(OpError::Aborted),
        Internal::Fatal(e) => Err(e.into()),
    }
}
