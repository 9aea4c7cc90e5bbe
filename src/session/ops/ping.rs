//! Keep-alive PINGREQ loop: fires on a fixed interval tied
//! to the negotiated keep-alive, reset whenever another send already kept
//! the connection alive.

use tokio::sync::oneshot;
use tokio::time::{self, Duration};

use crate::codec::packet_type::ControlPacketType;
use crate::codec::ping::encode_pingreq;
use crate::control_packet::ControlPacket;
use crate::error::Internal;
use crate::session::sender::SendRequest;
use crate::session::SessionHandles;

/// Run the PINGREQ timer until cancelled. `keep_alive_secs == 0` disables
/// the timer entirely, per MQTT v5 semantics.
pub async fn run(keep_alive_secs: u16, handles: SessionHandles) {
    if keep_alive_secs == 0 {
        std::future::pending::<()>().await;
        return;
    }
    let mut interval = time::interval(Duration::from_secs(u64::from(keep_alive_secs)));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        send_pingreq(&handles).await;
    }
}

async fn send_pingreq(handles: &SessionHandles) {
    let packet = ControlPacket::new(ControlPacketType::PingReq, 0, encode_pingreq());
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
    // A dropped/aborted/failed PINGREQ is not itself fatal: the sentry
    // is responsible for declaring the connection dead.
    let _ = rx.await.unwrap_or(Internal::Aborted);
}
