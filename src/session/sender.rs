//! Outbound sender: an ordered, flow-controlled write queue
//! with in-flight serial numbers and resend support.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{oneshot, Notify};

use crate::control_packet::ControlPacket;
use crate::error::Internal;
use crate::sync::AsyncMutex;

use super::reply_matcher::ReplyMatcher;

/// A queued outbound packet awaiting its turn on the wire.
pub struct SendRequest {
    pub packet: ControlPacket,
    pub serial: u32,
    /// Counts against the negotiated Receive Maximum quota.
    pub throttled: bool,
    /// Bypasses throttling and sorts ahead of non-prioritized requests (PUBREL).
    pub prioritized: bool,
    /// No further sends may be enqueued ahead of this one (DISCONNECT).
    pub terminal: bool,
    pub completion: oneshot::Sender<Internal<()>>,
}

struct SenderState {
    queue: VecDeque<SendRequest>,
    in_progress: bool,
    limit: u16,
    quota: u16,
}

/// Ordered, flow-controlled outbound queue. Transport I/O is driven by the
/// connection manager; `Sender` only decides what is eligible to write next.
pub struct Sender {
    state: AsyncMutex<SenderState>,
    last_serial: AtomicU32,
    notify: Notify,
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AsyncMutex::new(SenderState {
                queue: VecDeque::new(),
                in_progress: false,
                limit: u16::MAX,
                quota: u16::MAX,
            }),
            last_serial: AtomicU32::new(0),
            notify: Notify::new(),
        }
    }

    /// Resolves once something may have become eligible to write: a fresh
    /// enqueue, a freed throttle slot, or a reconnect reset. The run loop
    /// calls this alongside its transport read to learn when to retry
    /// [`Sender::take_batch`] without busy-polling.
    pub fn notified(&self) -> impl std::future::Future<Output = ()> + '_ {
        self.notify.notified()
    }

    /// Assign the next monotone serial number, assigned strictly before a
    /// request enters the queue.
    pub fn next_serial(&self) -> u32 {
        self.last_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Append `req` to the queue.
    pub async fn enqueue(&self, req: SendRequest) {
        self.state.lock().await.queue.push_back(req);
        self.notify.notify_one();
    }

    /// Take the next batch of requests eligible to be written now. Returns
    /// an empty batch if a write is already in progress or nothing is
    /// eligible.
    pub async fn take_batch(&self) -> Vec<SendRequest> {
        let mut state = self.state.lock().await;
        if state.in_progress || state.queue.is_empty() {
            return Vec::new();
        }

        if let Some(pos) = state.queue.iter().position(|r| r.terminal) {
            let req = state.queue.remove(pos).expect("position just found");
            state.in_progress = true;
            return vec![req];
        }

        if state.limit == u16::MAX {
            let batch: Vec<_> = state.queue.drain(..).collect();
            if !batch.is_empty() {
                state.in_progress = true;
            }
            return batch;
        }

        let mut eligible = Vec::new();
        let mut remaining = VecDeque::new();
        let mut quota = state.quota;
        for req in state.queue.drain(..) {
            if !req.throttled || req.prioritized {
                eligible.push(req);
            } else if quota > 0 {
                quota -= 1;
                eligible.push(req);
            } else {
                remaining.push_back(req);
            }
        }
        state.quota = quota;
        state.queue = remaining;
        if !eligible.is_empty() {
            state.in_progress = true;
        }
        eligible
    }

    /// Mark the in-progress write as finished and attempt the next batch.
    pub async fn write_done(&self) {
        self.state.lock().await.in_progress = false;
        self.notify.notify_one();
    }

    /// Free one throttled slot, e.g. when a PUBACK/PUBCOMP/SUBACK/UNSUBACK
    /// arrives.
    pub async fn throttled_op_done(&self) {
        let mut state = self.state.lock().await;
        state.quota = state.quota.saturating_add(1).min(state.limit);
        drop(state);
        self.notify.notify_one();
    }

    /// Reset flow control to `new_limit` (the negotiated Receive Maximum
    /// from the fresh CONNACK) and drain everything still queued, in the
    /// order a re-send should place it on the wire. The caller completes
    /// each with [`Internal::Retry`] so its
    /// owning state machine reissues, then invokes `replies.resend_unanswered()`
    /// for packets that had already reached the wire.
    pub async fn reconnect_reset(&self, new_limit: u16, replies: &ReplyMatcher) -> Vec<SendRequest> {
        let mut state = self.state.lock().await;
        state.in_progress = false;
        state.limit = new_limit;
        state.quota = new_limit;
        replies.resend_unanswered();

        let mut drained: Vec<_> = state.queue.drain(..).collect();
        drained.sort_by(send_order);
        drained
    }
}

fn serial_precedes(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) < (1u32 << 31)
}

fn send_order(a: &SendRequest, b: &SendRequest) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.prioritized, b.prioritized) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => {
            if a.serial == b.serial {
                Ordering::Equal
            } else if serial_precedes(a.serial, b.serial) {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet_type::ControlPacketType;

    fn dummy_request(serial: u32, throttled: bool, prioritized: bool) -> (SendRequest, oneshot::Receiver<Internal<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            SendRequest {
                packet: ControlPacket::new(ControlPacketType::Publish, 0, vec![0x30, 0x00]),
                serial,
                throttled,
                prioritized,
                terminal: false,
                completion: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn take_batch_returns_nothing_while_in_progress() {
        let sender = Sender::new();
        let (req, _rx) = dummy_request(0, false, false);
        sender.enqueue(req).await;
        let first = sender.take_batch().await;
        assert_eq!(first.len(), 1);
        let second = sender.take_batch().await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn terminal_request_is_extracted_alone() {
        let sender = Sender::new();
        let (normal, _rx1) = dummy_request(0, false, false);
        let (mut terminal, _rx2) = dummy_request(1, false, false);
        terminal.terminal = true;
        sender.enqueue(normal).await;
        sender.enqueue(terminal).await;
        let batch = sender.take_batch().await;
        assert_eq!(batch.len(), 1);
        assert!(batch[0].terminal);
    }

    #[tokio::test]
    async fn throttling_limits_in_flight_count() {
        let sender = Sender::new();
        {
            let mut state = sender.state.lock().await;
            state.limit = 1;
            state.quota = 1;
        }
        let (a, _ra) = dummy_request(0, true, false);
        let (b, _rb) = dummy_request(1, true, false);
        sender.enqueue(a).await;
        sender.enqueue(b).await;
        let batch = sender.take_batch().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].serial, 0);
    }

    #[tokio::test]
    async fn reconnect_reset_sorts_prioritized_before_later_serials() {
        let sender = Sender::new();
        let replies = ReplyMatcher::new();
        let (publish_b, _rb) = dummy_request(2, true, false);
        let (pubrel_a, _ra) = dummy_request(1, true, true);
        sender.enqueue(publish_b).await;
        sender.enqueue(pubrel_a).await;

        let drained = sender.reconnect_reset(65535, &replies).await;
        assert_eq!(drained.len(), 2);
        assert!(drained[0].prioritized);
        assert_eq!(drained[0].serial, 1);
    }
}
