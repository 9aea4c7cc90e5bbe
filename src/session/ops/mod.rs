//! Per-operation state machines: PUBLISH, SUBSCRIBE,
//! UNSUBSCRIBE, PING, the expiry sentry, DISCONNECT, and re-authentication.
//! Each shares the structure *issue → await reply → on error retry or
//! surface*.

pub mod disconnect;
pub mod ping;
pub mod publish;
pub mod reauth;
pub mod sentry;
pub mod subscribe;
pub mod unsubscribe;

use crate::error::{ClientError, ConnectionError};

/// The error surfaced to a user-facing operation call, widened at the op
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// A local precondition failure; no network I/O occurred.
    Client(ClientError),
    /// A fatal, non-recoverable connection error ended the session.
    Connection(ConnectionError),
    /// Cancellation severed the operation.
    Aborted,
}

impl From<ConnectionError> for OpError {
    fn from(e: ConnectionError) -> Self {
        OpError::Connection(e)
    }
}

impl From<ClientError> for OpError {
    fn from(e: ClientError) -> Self {
        OpError::Client(e)
    }
}
