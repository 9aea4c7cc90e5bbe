//! QoS/reply matcher, grounded in the original `replies.hpp`:
//! maps `(control code, packet id)` to a waiter, buffers replies that arrive
//! before a waiter registers, and drives bulk resend/cancel/expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::codec::packet_type::ControlPacketType;
use crate::error::{ConnectionError, Internal};

/// Maximum age of a waiter before the sentry disconnects.
pub const REPLY_EXPIRY: Duration = Duration::from_secs(20);

type Key = (ControlPacketType, u16);

struct Waiter {
    registered_at: Instant,
    tx: oneshot::Sender<Internal<Bytes>>,
}

struct Inner {
    waiters: HashMap<Key, Waiter>,
    fast_replies: HashMap<Key, Bytes>,
}

/// Tracks in-flight packets awaiting acknowledgement.
pub struct ReplyMatcher {
    inner: std::sync::Mutex<Inner>,
}

impl Default for ReplyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(Inner {
                waiters: HashMap::new(),
                fast_replies: HashMap::new(),
            }),
        }
    }

    /// Register a waiter for `(code, pid)`, or resolve immediately from a
    /// fast reply if one is already queued.
    pub async fn async_wait_reply(&self, code: ControlPacketType, pid: u16) -> Internal<Bytes> {
        let rx = {
            let mut inner = self.inner.lock().unwrap();
            let key = (code, pid);

            if let Some(prev) = inner.waiters.remove(&key) {
                let _ = prev.tx.send(Internal::Aborted);
            }
            if let Some(bytes) = inner.fast_replies.remove(&key) {
                return Internal::Ok(bytes);
            }

            let (tx, rx) = oneshot::channel();
            inner.waiters.insert(
                key,
                Waiter {
                    registered_at: Instant::now(),
                    tx,
                },
            );
            rx
        };
        rx.await.unwrap_or(Internal::Aborted)
    }

    /// Deliver a decoded reply to its waiter, or buffer it as a fast reply
    /// if none is registered yet.
    pub fn dispatch(&self, code: ControlPacketType, pid: u16, bytes: Bytes) {
        let mut inner = self.inner.lock().unwrap();
        let key = (code, pid);
        match inner.waiters.remove(&key) {
            Some(waiter) => {
                let _ = waiter.tx.send(Internal::Ok(bytes));
            }
            None => {
                inner.fast_replies.insert(key, bytes);
            }
        }
    }

    /// Complete every waiter with [`Internal::Retry`] so its owner reissues,
    /// called from the sender's resend path.
    pub fn resend_unanswered(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, waiter) in inner.waiters.drain() {
            let _ = waiter.tx.send(Internal::Retry);
        }
    }

    /// Complete every waiter with [`Internal::Aborted`], used by top-level
    /// `cancel()`.
    pub fn cancel_unanswered(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, waiter) in inner.waiters.drain() {
            let _ = waiter.tx.send(Internal::Aborted);
        }
    }

    /// Complete every waiter with a fatal connection error.
    pub fn fail_unanswered(&self, err: ConnectionError) {
        let mut inner = self.inner.lock().unwrap();
        for (_, waiter) in inner.waiters.drain() {
            let _ = waiter.tx.send(Internal::Fatal(err));
        }
    }

    /// True iff any waiter has been outstanding longer than [`REPLY_EXPIRY`].
    /// Drives the sentry.
    #[must_use]
    pub fn any_expired(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .waiters
            .values()
            .any(|w| w.registered_at.elapsed() >= REPLY_EXPIRY)
    }

    /// Drop all buffered fast replies, called at the start of each new
    /// outbound send round.
    pub fn clear_fast_replies(&self) {
        self.inner.lock().unwrap().fast_replies.clear();
    }

    /// Insert a waiter already past [`REPLY_EXPIRY`], for exercising the
    /// sentry without waiting out a real 20s.
    #[cfg(test)]
    pub(crate) fn test_insert_expired_waiter(&self, code: ControlPacketType, pid: u16) {
        let (tx, _rx) = oneshot::channel();
        self.inner.lock().unwrap().waiters.insert(
            (code, pid),
            Waiter {
                registered_at: Instant::now() - REPLY_EXPIRY - Duration::from_secs(1),
                tx,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_reply_resolves_a_later_wait_immediately() {
        let matcher = ReplyMatcher::new();
        matcher.dispatch(ControlPacketType::PubAck, 1, Bytes::from_static(b"x"));
        let result = matcher.async_wait_reply(ControlPacketType::PubAck, 1).await;
        assert_eq!(result, Internal::Ok(Bytes::from_static(b"x")));
    }

    #[tokio::test]
    async fn registering_twice_for_the_same_key_aborts_the_first() {
        let matcher = std::sync::Arc::new(ReplyMatcher::new());
        let m2 = matcher.clone();
        let first = tokio::spawn(async move { m2.async_wait_reply(ControlPacketType::PubAck, 7).await });
        tokio::task::yield_now().await;
        let m3 = matcher.clone();
        let second = async move { m3.async_wait_reply(ControlPacketType::PubAck, 7).await };
        let second_handle = tokio::spawn(second);
        tokio::task::yield_now().await;
        matcher.dispatch(ControlPacketType::PubAck, 7, Bytes::from_static(b"y"));

        assert_eq!(first.await.unwrap(), Internal::Aborted);
        assert_eq!(second_handle.await.unwrap(), Internal::Ok(Bytes::from_static(b"y")));
    }

    #[tokio::test]
    async fn resend_unanswered_signals_retry() {
        let matcher = std::sync::Arc::new(ReplyMatcher::new());
        let m2 = matcher.clone();
        let waiting = tokio::spawn(async move { m2.async_wait_reply(ControlPacketType::SubAck, 3).await });
        tokio::task::yield_now().await;
        matcher.resend_unanswered();
        assert_eq!(waiting.await.unwrap(), Internal::Retry);
    }

    #[test]
    fn any_expired_is_false_for_a_fresh_waiter() {
        let matcher = ReplyMatcher::new();
        let (tx, _rx) = oneshot::channel();
        matcher.inner.lock().unwrap().waiters.insert(
            (ControlPacketType::PubAck, 1),
            Waiter {
                registered_at: Instant::now(),
                tx,
            },
        );
        assert!(!matcher.any_expired());
    }
}
