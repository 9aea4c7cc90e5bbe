//! The session layer: connection lifecycle, QoS delivery, and the
//! per-operation state machines built on top of the packet codec.

pub mod assembler;
pub mod backoff;
pub mod client;
pub mod connection_manager;
pub mod ops;
pub mod receiver;
pub mod reply_matcher;
pub mod sender;
pub mod state;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::pid::PidAllocator;
use receiver::Receiver;
use reply_matcher::ReplyMatcher;
use sender::Sender;
use state::DisconnectRequest;

/// Shared handles every per-operation state machine needs: the client
/// service owns these, reference-counted across outstanding ops.
#[derive(Clone)]
pub struct SessionHandles {
    pub sender: Arc<Sender>,
    pub matcher: Arc<ReplyMatcher>,
    pub pids: Arc<PidAllocator>,
    pub receiver: Arc<Receiver>,
    pub disconnect_tx: mpsc::UnboundedSender<DisconnectRequest>,
}
