//! Reply-expiry sentry: polls the reply matcher every 3s
//! and raises a DISCONNECT once any waiter has gone unanswered too long.

use tokio::time::{self, Duration};

use crate::error::DisconnectReasonCode;
use crate::session::state::DisconnectRequest;
use crate::session::SessionHandles;

const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Run the sentry loop until cancelled or the disconnect channel is dropped.
pub async fn run(handles: SessionHandles) {
    let mut interval = time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        if handles.matcher.any_expired() {
            let _ = handles.disconnect_tx.send(DisconnectRequest {
                reason_code: DisconnectReasonCode::UnspecifiedError,
                reason_string: Some("no reply within 20 s".into()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::codec::packet_type::ControlPacketType;
    use crate::pid::PidAllocator;
    use crate::session::receiver::Receiver;
    use crate::session::reply_matcher::ReplyMatcher;
    use crate::session::sender::Sender;

    /// S4: a waiter outstanding past the reply expiry makes the sentry raise
    /// a DISCONNECT on its very next poll.
    #[tokio::test(start_paused = true)]
    async fn expired_waiter_triggers_disconnect_request() {
        let matcher = Arc::new(ReplyMatcher::new());
        matcher.test_insert_expired_waiter(ControlPacketType::PubAck, 1);

        let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
        let handles = SessionHandles {
            sender: Arc::new(Sender::new()),
            matcher: matcher.clone(),
            pids: Arc::new(PidAllocator::new()),
            receiver: Arc::new(Receiver::new()),
            disconnect_tx,
        };

        let task = tokio::spawn(run(handles));
        time::advance(POLL_INTERVAL).await;

        let req = disconnect_rx.recv().await.expect("sentry raised a disconnect request");
        assert_eq!(req.reason_code, DisconnectReasonCode::UnspecifiedError);
        assert_eq!(req.reason_string.as_deref(), Some("no reply within 20 s"));
        task.abort();
    }

    /// A fresh waiter does not trip the sentry on the first poll.
    #[tokio::test(start_paused = true)]
    async fn fresh_waiter_does_not_trigger_disconnect() {
        let matcher = Arc::new(ReplyMatcher::new());
        let m2 = matcher.clone();
        let _waiting = tokio::spawn(async move { m2.async_wait_reply(ControlPacketType::PubAck, 9).await });

        let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
        let handles = SessionHandles {
            sender: Arc::new(Sender::new()),
            matcher,
            pids: Arc::new(PidAllocator::new()),
            receiver: Arc::new(Receiver::new()),
            disconnect_tx,
        };

        let task = tokio::spawn(run(handles));
        time::advance(POLL_INTERVAL).await;
        time::advance(POLL_INTERVAL).await;

        assert!(disconnect_rx.try_recv().is_err(), "no disconnect expected for a fresh waiter");
        task.abort();
    }
}
