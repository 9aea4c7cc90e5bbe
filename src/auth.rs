//! Enhanced-authentication authenticator interface.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// The step of an enhanced-authentication exchange the client is asking the
/// authenticator to produce data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// Data to attach to the outbound CONNECT.
    ClientInitial,
    /// The server sent an AUTH challenge; produce the reply.
    ServerChallenge,
    /// The server accepted with CONNACK carrying authentication data; verify it.
    ServerFinal,
}

/// An authenticator round-trip failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("authentication failed: {0}")]
pub struct AuthError(pub String);

/// A user-supplied enhanced-authentication handler.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Produce the data to send for `step`, given the server's `data` (empty
    /// for [`AuthStep::ClientInitial`]).
    async fn auth(&self, step: AuthStep, data: Bytes) -> Result<Bytes, AuthError>;

    /// The authentication method name sent in the `authentication_method` property.
    fn method(&self) -> &str;
}
