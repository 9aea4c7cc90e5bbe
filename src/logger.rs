//! Optional connection-lifecycle logger hooks, supplemented from
//! the original `logger.hpp`.

use crate::topic::Endpoint;

/// Hooks invoked at the major edges of a connection attempt. All methods have
/// no-op defaults; implement only the ones of interest.
pub trait ConnectionLogger: Send + Sync {
    /// A broker host was about to be attempted.
    fn on_resolve(&self, _host: &str) {}
    /// The transport-level connect to `endpoint` finished.
    fn on_tcp_connect(&self, _endpoint: &Endpoint, _error: Option<&str>) {}
    /// A TLS handshake finished.
    fn on_tls_handshake(&self, _error: Option<&str>) {}
    /// A WebSocket handshake finished.
    fn on_ws_handshake(&self, _error: Option<&str>) {}
    /// A CONNACK was received.
    fn on_connack(&self, _reason_code: u8, _session_present: bool) {}
    /// A DISCONNECT was sent or received.
    fn on_disconnect(&self, _reason_code: u8) {}
}

/// Default logger backed by the `log` facade, matching the teacher's
/// logging-at-lifecycle-edges convention.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateLogger;

impl ConnectionLogger for LogCrateLogger {
    fn on_resolve(&self, host: &str) {
        log::debug!("resolving broker host {host}");
    }

    fn on_tcp_connect(&self, endpoint: &Endpoint, error: Option<&str>) {
        match error {
            None => log::debug!("connected to {}:{}", endpoint.host, endpoint.port),
            Some(e) => log::warn!("connect to {}:{} failed: {e}", endpoint.host, endpoint.port),
        }
    }

    fn on_tls_handshake(&self, error: Option<&str>) {
        match error {
            None => log::debug!("TLS handshake complete"),
            Some(e) => log::warn!("TLS handshake failed: {e}"),
        }
    }

    fn on_ws_handshake(&self, error: Option<&str>) {
        match error {
            None => log::debug!("WebSocket handshake complete"),
            Some(e) => log::warn!("WebSocket handshake failed: {e}"),
        }
    }

    fn on_connack(&self, reason_code: u8, session_present: bool) {
        log::info!("CONNACK reason=0x{reason_code:02x} session_present={session_present}");
    }

    fn on_disconnect(&self, reason_code: u8) {
        log::warn!("DISCONNECT reason=0x{reason_code:02x}");
    }
}
