//! Connection configuration, following the teacher's `derive_builder`
//! owned-setter pattern.

use std::env;
use std::time::Duration;

use derive_builder::Builder;

use crate::topic::{parse_broker_string, Endpoint};

const DEFAULT_TCP_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// Validated configuration for a single logical session.
/// Construct via [`MqttConnectionSettingsBuilder`].
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct MqttConnectionSettings {
    /// Comma-separated `host[:port][/path]` broker spec.
    pub hostname: String,
    /// Client identifier sent in CONNECT.
    pub client_id: String,
    /// Port used when an entry in `hostname` omits one.
    #[builder(default = "DEFAULT_TCP_PORT")]
    pub default_port: u16,
    /// Keep-alive interval requested in CONNECT; 0 disables PINGREQ.
    #[builder(default = "Duration::from_secs(60)")]
    pub keep_alive: Duration,
    #[builder(default)]
    pub clean_start: bool,
    #[builder(default)]
    pub username: Option<String>,
    #[builder(default)]
    pub password: Option<String>,
    #[builder(default)]
    pub session_expiry_interval: Option<u32>,
    #[builder(default)]
    pub receive_maximum: Option<u16>,
    #[builder(default)]
    pub topic_alias_maximum: Option<u16>,
    #[builder(default)]
    pub maximum_packet_size: Option<u32>,
}

impl MqttConnectionSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.client_id.as_ref().map_or(true, |id| id.is_empty()) {
            return Err("client_id must not be empty".to_string());
        }
        if self.hostname.as_ref().map_or(true, |h| h.trim().is_empty()) {
            return Err("hostname must not be empty".to_string());
        }
        Ok(())
    }
}

impl MqttConnectionSettings {
    /// Resolve [`Self::hostname`] into an ordered endpoint list per the
    /// broker-string grammar.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        parse_broker_string(&self.hostname, self.default_port)
    }

    /// Build settings from `MQTT5_*` environment variables, following the
    /// teacher's `from_environment()` convenience constructor.
    pub fn from_environment() -> Result<Self, String> {
        let hostname = env::var("MQTT5_HOSTNAME").map_err(|_| "MQTT5_HOSTNAME not set".to_string())?;
        let client_id = env::var("MQTT5_CLIENT_ID").map_err(|_| "MQTT5_CLIENT_ID not set".to_string())?;
        let mut builder = MqttConnectionSettingsBuilder::default();
        builder.hostname(hostname).client_id(client_id);

        if let Ok(v) = env::var("MQTT5_TLS") {
            if v == "1" || v.eq_ignore_ascii_case("true") {
                builder.default_port(DEFAULT_TLS_PORT);
            }
        }
        if let Ok(v) = env::var("MQTT5_USERNAME") {
            builder.username(Some(v));
        }
        if let Ok(v) = env::var("MQTT5_PASSWORD") {
            builder.password(Some(v));
        }
        if let Ok(v) = env::var("MQTT5_KEEP_ALIVE_SECONDS") {
            let secs: u64 = v.parse().map_err(|_| "MQTT5_KEEP_ALIVE_SECONDS must be an integer".to_string())?;
            builder.keep_alive(Duration::from_secs(secs));
        }
        builder.build().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_empty_client_id() {
        let result = MqttConnectionSettingsBuilder::default()
            .hostname("broker.example.com")
            .client_id("")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_resolves_endpoints_from_hostname() {
        let settings = MqttConnectionSettingsBuilder::default()
            .hostname("a.example.com,b.example.com:8884")
            .client_id("client-1")
            .build()
            .unwrap();
        let endpoints = settings.endpoints();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].port, DEFAULT_TCP_PORT);
        assert_eq!(endpoints[1].port, 8884);
    }
}
