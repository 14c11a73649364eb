//! Relay fan-out integration tests over localhost TCP.

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    sync::mpsc,
    time::timeout,
};
use veil_channel::{ChannelClient, ObfuscationConfig};
use veil_crypto::{CipherEngine, KeyMaterial};
use veil_relay::{Relay, RelayConfig};

/// Pacing off, cover traffic effectively off.
fn quiet_config() -> ObfuscationConfig {
    ObfuscationConfig {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        dummy_interval: Duration::from_secs(3600),
        dummy_jitter: Duration::ZERO,
    }
}

/// Bind a relay on an ephemeral port and run it in the background.
async fn spawn_relay(obfuscation: ObfuscationConfig) -> (String, KeyMaterial) {
    let material = KeyMaterial::generate();
    let config = RelayConfig { bind_address: "127.0.0.1:0".to_string(), obfuscation };

    let relay = Relay::bind(config, material.clone()).await.unwrap();
    let addr = relay.local_addr().unwrap().to_string();
    tokio::spawn(relay.run());

    (addr, material)
}

async fn connect_client(
    addr: &str,
    material: &KeyMaterial,
) -> (ChannelClient, mpsc::Receiver<String>) {
    ChannelClient::connect(addr, material.clone(), quiet_config()).await.unwrap()
}

#[tokio::test]
async fn fanout_reaches_all_other_peers() {
    let (addr, _relay_material) = spawn_relay(quiet_config()).await;
    let material = KeyMaterial::generate();

    let (mut a, mut a_rx) = connect_client(&addr, &material).await;
    let (_b, mut b_rx) = connect_client(&addr, &material).await;
    let (_c, mut c_rx) = connect_client(&addr, &material).await;

    a.send("hello").await.unwrap();

    assert_eq!(b_rx.recv().await.unwrap(), "hello");
    assert_eq!(c_rx.recv().await.unwrap(), "hello");

    // The sender never hears its own message back
    assert!(timeout(Duration::from_millis(100), a_rx.recv()).await.is_err());
}

#[tokio::test]
async fn fanout_preserves_order_across_5000_messages() {
    let (addr, _relay_material) = spawn_relay(quiet_config()).await;
    let material = KeyMaterial::generate();

    let (mut a, _a_rx) = connect_client(&addr, &material).await;
    let (_b, b_rx) = connect_client(&addr, &material).await;
    let (_c, c_rx) = connect_client(&addr, &material).await;

    const COUNT: usize = 5000;

    let collect = |mut rx: mpsc::Receiver<String>| async move {
        let mut received = Vec::with_capacity(COUNT);
        while received.len() < COUNT {
            match rx.recv().await {
                Some(message) => received.push(message),
                None => break,
            }
        }
        received
    };

    let b_task = tokio::spawn(collect(b_rx));
    let c_task = tokio::spawn(collect(c_rx));

    for i in 0..COUNT {
        a.send(&format!("msg {i}")).await.unwrap();
    }

    let expected: Vec<String> = (0..COUNT).map(|i| format!("msg {i}")).collect();

    let b_received = timeout(Duration::from_secs(60), b_task).await.unwrap().unwrap();
    let c_received = timeout(Duration::from_secs(60), c_task).await.unwrap().unwrap();

    assert_eq!(b_received, expected);
    assert_eq!(c_received, expected);
}

#[tokio::test]
async fn failed_peer_is_removed_without_breaking_broadcast() {
    let (addr, _relay_material) = spawn_relay(quiet_config()).await;
    let material = KeyMaterial::generate();

    let (mut a, _a_rx) = connect_client(&addr, &material).await;
    let (_b, mut b_rx) = connect_client(&addr, &material).await;
    let (mut c, _c_rx) = connect_client(&addr, &material).await;

    c.close().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Broadcast with the dead peer possibly still registered; delivery to
    // the healthy peer must not be affected
    a.send("first after close").await.unwrap();
    a.send("second after close").await.unwrap();

    assert_eq!(b_rx.recv().await.unwrap(), "first after close");
    assert_eq!(b_rx.recv().await.unwrap(), "second after close");
}

#[tokio::test]
async fn cover_traffic_is_emitted_and_looks_like_a_message() {
    let obfuscation = ObfuscationConfig {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        dummy_interval: Duration::from_millis(5),
        dummy_jitter: Duration::ZERO,
    };
    let (addr, relay_material) = spawn_relay(obfuscation).await;

    // Raw peer: sees exactly the wire bytes
    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut lines = BufReader::new(stream).lines();

    let line = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // The envelope decrypts under the channel key and carries the marker
    let engine = CipherEngine::with_material(relay_material);
    let plaintext = engine.decrypt(&line).unwrap();
    assert!(CipherEngine::is_dummy(&plaintext));
}

#[tokio::test]
async fn cover_traffic_is_discarded_by_clients() {
    let obfuscation = ObfuscationConfig {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        dummy_interval: Duration::from_millis(5),
        dummy_jitter: Duration::ZERO,
    };
    // Clients share the relay's material, so dummies decrypt and must be
    // filtered by the marker rather than delivered
    let (addr, relay_material) = spawn_relay(obfuscation).await;

    let (mut a, _a_rx) = connect_client(&addr, &relay_material).await;
    let (_b, mut b_rx) = connect_client(&addr, &relay_material).await;

    // Let several dummy intervals elapse, then send one real message
    tokio::time::sleep(Duration::from_millis(50)).await;
    a.send("the only real one").await.unwrap();

    // The first thing the sink ever yields is the real message
    assert_eq!(b_rx.recv().await.unwrap(), "the only real one");
}
