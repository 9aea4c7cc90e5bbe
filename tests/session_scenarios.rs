//! End-to-end session scenarios driven over a scripted transport, covering
//! the testable properties named for the session layer.

mod support;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use mqtt5_core::codec::ack::Ack;
use mqtt5_core::codec::connack::ConnAck;
use mqtt5_core::codec::packet_type::ControlPacketType;
use mqtt5_core::codec::properties::Properties;
use mqtt5_core::codec::publish::Publish;
use mqtt5_core::codec::varint;
use mqtt5_core::connection_settings::MqttConnectionSettingsBuilder;
use mqtt5_core::control_packet::QoS;
use mqtt5_core::logger::LogCrateLogger;
use mqtt5_core::session::client::{Client, ClientConfig};
use mqtt5_core::session::ops::publish::PublishRequest;

use support::mock_transport::{Exhausted, MockTransport, ReadStep, Script, Shared};

fn settings(client_id: &str) -> mqtt5_core::connection_settings::MqttConnectionSettings {
    MqttConnectionSettingsBuilder::default()
        .hostname("broker.example.com")
        .client_id(client_id)
        .keep_alive(Duration::from_secs(3600))
        .build()
        .unwrap()
}

fn connack(session_present: bool, properties: Properties) -> Vec<u8> {
    ConnAck {
        session_present,
        reason_code: 0x00,
        properties,
    }
    .encode()
}

fn puback(pid: u16, reason_code: u8) -> Vec<u8> {
    Ack {
        pkid: pid,
        reason_code,
        properties: Properties::default(),
    }
    .encode(ControlPacketType::PubAck)
}

/// Split a raw byte buffer into `(type, flags, body)` frames, the way the
/// assembler would, for asserting on the exact wire trace a test produced.
fn split_frames(mut bytes: &[u8]) -> Vec<(ControlPacketType, u8, Bytes)> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let first = bytes[0];
        let packet_type = ControlPacketType::from_code(first >> 4).unwrap();
        let flags = first & 0x0F;
        let (remaining_len, consumed) = varint::decode(&bytes[1..]).unwrap();
        let header_len = 1 + consumed;
        let total = header_len + remaining_len as usize;
        let body = Bytes::copy_from_slice(&bytes[header_len..total]);
        out.push((packet_type, flags, body));
        bytes = &bytes[total..];
    }
    out
}

fn spawn_client(config: ClientConfig) -> Arc<Client<MockTransport>> {
    let client = Client::<MockTransport>::configure(config);
    tokio::spawn({
        let client = client.clone();
        async move {
            let _ = client.run().await;
        }
    });
    client
}

/// S1: a QoS 1 publish whose connection drops before PUBACK is resent with
/// dup=1 on the next connection and completes once the broker finally acks.
#[tokio::test(flavor = "current_thread")]
async fn qos1_publish_survives_one_reconnect_with_dup_set() {
    let shared = Shared::new(vec![
        Script::new(Exhausted::Hang)
            .then_frame(connack(false, Properties::default()))
            .then(ReadStep::Hang)
            .then(ReadStep::Fail),
        Script::new(Exhausted::Hang)
            .then_frame(connack(false, Properties::default()))
            .then_frame(puback(1, 0x00)),
    ]);
    support::mock_transport::install(&shared);

    let client = spawn_client(ClientConfig {
        settings: settings("s1"),
        will: None,
        authenticator: None,
        requested_properties: Properties::default(),
        logger: Arc::new(LogCrateLogger),
    });

    let outcome = client
        .publish(PublishRequest {
            topic: "t".into(),
            payload: Bytes::from_static(b"p"),
            qos: QoS::AtLeastOnce,
            retain: false,
            properties: Properties::default(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.reason_code, 0x00);

    assert_eq!(shared.attempts(), 2);
    let first_attempt = split_frames(&shared.written(0));
    let (ty, _, _) = first_attempt.iter().find(|(t, ..)| *t == ControlPacketType::Publish).unwrap();
    assert_eq!(*ty, ControlPacketType::Publish);

    let second_attempt = split_frames(&shared.written(1));
    let (_, flags, body) = second_attempt
        .iter()
        .find(|(t, ..)| *t == ControlPacketType::Publish)
        .expect("resent PUBLISH");
    let resent = Publish::decode(*flags, body.clone()).unwrap();
    assert!(resent.dup, "resent PUBLISH must carry dup=1");
    assert_eq!(resent.pkid, 1);
}

/// S3: Receive Maximum = 1 keeps only one QoS 1 publish in flight at a time.
#[tokio::test(flavor = "current_thread")]
async fn receive_maximum_one_serializes_qos1_publishes() {
    let props = Properties {
        receive_maximum: Some(1),
        ..Default::default()
    };
    let shared = Shared::new(vec![Script::new(Exhausted::Hang)
        .then_frame(connack(false, props))
        .then_frame(puback(1, 0x00))
        .then_frame(puback(2, 0x00))
        .then_frame(puback(3, 0x00))]);
    support::mock_transport::install(&shared);

    let client = spawn_client(ClientConfig {
        settings: settings("s3"),
        will: None,
        authenticator: None,
        requested_properties: Properties::default(),
        logger: Arc::new(LogCrateLogger),
    });

    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .publish(PublishRequest {
                    topic: "t".into(),
                    payload: Bytes::from_static(b"p"),
                    qos: QoS::AtLeastOnce,
                    retain: false,
                    properties: Properties::default(),
                })
                .await
                .unwrap()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap().reason_code, 0x00);
    }

    let frames = split_frames(&shared.written(0));
    let publishes: Vec<_> = frames.iter().filter(|(t, ..)| *t == ControlPacketType::Publish).collect();
    assert_eq!(publishes.len(), 3, "all three publishes eventually went out");
    // With Receive Maximum = 1 the wire trace alternates PUBLISH, PUBACK,
    // PUBLISH, PUBACK, ... never two PUBLISHes back to back on the wire.
    let mut last_was_publish = false;
    for (ty, ..) in &frames {
        if *ty == ControlPacketType::Publish {
            assert!(!last_was_publish, "two PUBLISHes in flight at once");
            last_was_publish = true;
        } else {
            last_was_publish = false;
        }
    }
}

/// S6: a reconnect with `session_present = false` pushes a synthetic
/// `session_expired` message to the receive channel.
#[tokio::test(flavor = "current_thread")]
async fn session_reset_pushes_synthetic_expiry_message() {
    let shared = Shared::new(vec![Script::new(Exhausted::Hang).then_frame(connack(false, Properties::default()))]);
    support::mock_transport::install(&shared);

    let client = spawn_client(ClientConfig {
        settings: settings("s6"),
        will: None,
        authenticator: None,
        requested_properties: Properties::default(),
        logger: Arc::new(LogCrateLogger),
    });

    let msg = client.receive().await.expect("receiver still open");
    assert_eq!(msg.error, Some(mqtt5_core::error::ClientError::SessionExpired));
    assert!(!client.session_present());
}
