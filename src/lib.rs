#![warn(missing_docs)]

//! Asynchronous MQTT v5 protocol-state engine: a reconnecting session, QoS
//! 0/1/2 delivery, and a complete packet codec, decoupled from any concrete
//! transport.

pub use crate::connection_settings::{
    MqttConnectionSettings, MqttConnectionSettingsBuilder, MqttConnectionSettingsBuilderError,
};
pub use crate::control_packet::{ControlPacket, QoS};
pub use crate::error::{ClientError, ConnectionError, RunError};
pub use crate::session::client::{Client, ClientConfig};

pub mod auth;
pub mod codec;
pub mod connection_settings;
pub mod control_packet;
pub mod error;
pub mod logger;
pub mod pid;
pub mod session;
pub mod sync;
pub mod topic;
pub mod transport;
