//! Abstract byte-stream the session drives. Concrete transports
//! (TCP, TLS, WebSocket) are external collaborators; only the contract lives
//! here.

use async_trait::async_trait;
use thiserror::Error;

use crate::topic::Endpoint;

/// An I/O failure at the transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The lowest-layer connect failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// A read failed.
    #[error("read failed: {0}")]
    Read(String),
    /// A write failed.
    #[error("write failed: {0}")]
    Write(String),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// Minimum contract the session needs from a byte stream.
/// TLS and WebSocket layers are optional capabilities with no-op defaults;
/// a concrete transport overrides `is_tls`/`is_ws` plus the matching
/// handshake method when it wraps those layers.
#[async_trait]
pub trait Transport: Send {
    /// Connect the lowest layer to `endpoint`.
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Read at least one byte into `buf`, returning the number read, or an
    /// error. A read of `Ok(0)` means the peer closed the connection.
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `bufs` in order (scatter-gather preferred by implementations
    /// that support it).
    async fn write_all(&mut self, bufs: &[&[u8]]) -> Result<(), TransportError>;

    /// Tear down the stream immediately; no further calls are made.
    fn close(&mut self);

    /// True if this stream carries a TLS layer.
    fn is_tls(&self) -> bool {
        false
    }

    /// Assign the SNI hostname for the next TLS handshake.
    fn set_sni_hostname(&mut self, _host: &str) {}

    /// Perform the TLS handshake, if `is_tls()`.
    async fn tls_handshake(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// True if this stream carries a WebSocket layer.
    fn is_ws(&self) -> bool {
        false
    }

    /// Perform the WebSocket upgrade handshake, if `is_ws()`.
    async fn ws_handshake(&mut self, _host: &str, _path: &str) -> Result<(), TransportError> {
        Ok(())
    }
}
