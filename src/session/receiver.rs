//! Receive channel: an unbounded FIFO of inbound application
//! messages.

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::codec::properties::Properties;
use crate::error::ClientError;

/// A message delivered to the application, or a synthetic `session_expired`
/// error tuple.
pub struct ReceivedMessage {
    pub error: Option<ClientError>,
    pub topic: String,
    pub payload: Bytes,
    pub properties: Properties,
}

/// Unbounded FIFO bridging the assembler's PUBLISH delivery to the
/// application's `receive` calls.
pub struct Receiver {
    tx: mpsc::UnboundedSender<ReceivedMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<ReceivedMessage>>,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Deliver a server-originated PUBLISH.
    pub fn publish(&self, topic: String, payload: Bytes, properties: Properties) {
        let _ = self.tx.send(ReceivedMessage {
            error: None,
            topic,
            payload,
            properties,
        });
    }

    /// Push the synthetic `session_expired` tuple so an outstanding
    /// `async_receive` learns its prior subscriptions are gone.
    pub fn push_session_expired(&self) {
        let _ = self.tx.send(ReceivedMessage {
            error: Some(ClientError::SessionExpired),
            topic: String::new(),
            payload: Bytes::new(),
            properties: Properties::default(),
        });
    }

    /// Await the next message. Returns `None` only if every sender half has
    /// been dropped (the session has been torn down entirely).
    pub async fn receive(&self) -> Option<ReceivedMessage> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let receiver = Receiver::new();
        receiver.publish("a".into(), Bytes::from_static(b"1"), Properties::default());
        receiver.publish("b".into(), Bytes::from_static(b"2"), Properties::default());
        assert_eq!(receiver.receive().await.unwrap().topic, "a");
        assert_eq!(receiver.receive().await.unwrap().topic, "b");
    }

    #[tokio::test]
    async fn session_expired_is_a_synthetic_error_tuple() {
        let receiver = Receiver::new();
        receiver.push_session_expired();
        let msg = receiver.receive().await.unwrap();
        assert_eq!(msg.error, Some(ClientError::SessionExpired));
        assert_eq!(msg.topic, "");
    }
}
