//! End-to-end tests over real loopback UDP sockets
//!
//! Each test starts a relay on ephemeral ports with a private metrics
//! instance, talks to it with the client, then cancels it.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use secure_datagram::config::{ListenerAction, ListenerConfig, RelayConfig};
use secure_datagram::service::{Relay, SecureDatagramClient};
use secure_datagram::utils::Metrics;
use secure_datagram::{ProtocolError, SymmetricKey};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const KEY_HEX: &str = "d38a3b96a26d0b1139bd30c174884f5dbc8eaaf492493725633ecebfa4ab19e9";

const CAPTURED_FRAME: &str = "40a7a1ef284e36e65cdb87abdb9aaea7ba4df5ae527b7311ba79a7d7f73729268d5b136c0c701fe366d775315f33e9ef893214fbf26a6ec281c8eadf46663b9d90";

const CAPTURED_PLAINTEXT: &[u8] = b"UCFLF2YG#EV=1,TS=13604,ID=UCFLF2YG*B4";

struct RunningRelay {
    addrs: Vec<SocketAddr>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    task: JoinHandle<secure_datagram::Result<()>>,
}

impl RunningRelay {
    async fn start(listeners: Vec<ListenerConfig>) -> Self {
        let config = RelayConfig::default_with_overrides(|c| {
            c.server.chacha_key = KEY_HEX.to_string();
            c.server.shutdown_timeout = Duration::from_secs(1);
            c.listeners = listeners;
        });
        let metrics = Arc::new(Metrics::new());
        let bound = Relay::from_config(&config)
            .expect("valid config")
            .with_metrics(metrics.clone())
            .bind()
            .await
            .expect("listeners bind");
        let addrs = bound.local_addrs().unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(bound.run(shutdown.clone()));

        Self {
            addrs,
            metrics,
            shutdown,
            task,
        }
    }

    async fn echo() -> Self {
        Self::start(vec![listener(ListenerAction::Echo)]).await
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let result = timeout(Duration::from_secs(5), self.task)
            .await
            .expect("relay stops after cancellation")
            .expect("relay task does not panic");
        assert!(result.is_ok(), "relay stopped with {result:?}");
    }

    /// Poll until `check` holds, since datagrams are handled on spawned tasks.
    async fn wait_for(&self, check: impl Fn(&Metrics) -> bool) {
        timeout(Duration::from_secs(5), async {
            while !check(&self.metrics) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("metrics condition reached");
    }
}

fn listener(action: ListenerAction) -> ListenerConfig {
    ListenerConfig {
        bind: "127.0.0.1:0".to_string(),
        action,
    }
}

fn key() -> SymmetricKey {
    SymmetricKey::from_hex(KEY_HEX).unwrap()
}

async fn client(server: SocketAddr) -> SecureDatagramClient {
    SecureDatagramClient::connect(server, &key())
        .await
        .unwrap()
        .with_response_timeout(Duration::from_millis(500))
}

fn captured_frame() -> Vec<u8> {
    hex::decode(CAPTURED_FRAME).unwrap()
}

#[tokio::test]
async fn test_echo_round_trip() {
    let relay = RunningRelay::echo().await;
    let client = client(relay.addrs[0]).await;

    let reply = client.request(b"Hello, Server!").await.unwrap();
    assert_eq!(&reply[..], b"Hello, Server!");

    let snapshot = relay.metrics.snapshot();
    assert_eq!(snapshot.authenticated, 1);
    assert_eq!(snapshot.replies_sent, 1);
    relay.stop().await;
}

#[tokio::test]
async fn test_bad_message_gets_no_reply() {
    let relay = RunningRelay::echo().await;
    let client = client(relay.addrs[0]).await;

    client.send_raw(b"this should fail").await.unwrap();
    let result = client.recv().await;
    assert!(matches!(result, Err(ProtocolError::Timeout)), "{result:?}");

    relay.wait_for(|m| m.rejections() == 1).await;
    let snapshot = relay.metrics.snapshot();
    assert_eq!(snapshot.rejected_too_short, 1);
    assert_eq!(snapshot.rejected_auth, 0);
    assert_eq!(snapshot.replies_sent, 0);

    // the listener is still serving
    let reply = client.request(b"after rejection").await.unwrap();
    assert_eq!(&reply[..], b"after rejection");
    relay.stop().await;
}

#[tokio::test]
async fn test_captured_frame_replayed_twice() {
    let relay = RunningRelay::echo().await;
    let client = client(relay.addrs[0]).await;
    let frame = captured_frame();

    client.send_raw(&frame).await.unwrap();
    let first = client.recv().await.unwrap();
    client.send_raw(&frame).await.unwrap();
    let second = client.recv().await.unwrap();

    assert_eq!(&first[..], CAPTURED_PLAINTEXT);
    assert_eq!(&second[..], CAPTURED_PLAINTEXT);
    assert_eq!(relay.metrics.snapshot().authenticated, 2);
    relay.stop().await;
}

#[tokio::test]
async fn test_forged_frame_gets_no_reply() {
    let relay = RunningRelay::echo().await;
    let client = client(relay.addrs[0]).await;

    let mut frame = captured_frame();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    client.send_raw(&frame).await.unwrap();

    assert!(matches!(client.recv().await, Err(ProtocolError::Timeout)));
    relay.wait_for(|m| m.snapshot().rejected_auth == 1).await;
    relay.stop().await;
}

#[tokio::test]
async fn test_wrong_key_client_is_ignored() {
    let relay = RunningRelay::echo().await;
    let stranger = SecureDatagramClient::connect(relay.addrs[0], &SymmetricKey::from_bytes([1; 32]))
        .await
        .unwrap()
        .with_response_timeout(Duration::from_millis(300));

    assert!(matches!(
        stranger.request(b"let me in").await,
        Err(ProtocolError::Timeout)
    ));
    relay.wait_for(|m| m.snapshot().rejected_auth == 1).await;
    relay.stop().await;
}

#[tokio::test]
async fn test_forward_listener_delivers_plaintext() {
    let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay = RunningRelay::start(vec![listener(ListenerAction::Forward {
        address: destination.local_addr().unwrap().to_string(),
    })])
    .await;
    let client = client(relay.addrs[0]).await;

    client.send(CAPTURED_PLAINTEXT).await.unwrap();

    let mut buf = [0u8; 1500];
    let (len, _) = timeout(Duration::from_secs(5), destination.recv_from(&mut buf))
        .await
        .expect("forwarded datagram arrives")
        .unwrap();
    assert_eq!(&buf[..len], CAPTURED_PLAINTEXT);

    // forwarding never replies to the sender
    assert!(matches!(client.recv().await, Err(ProtocolError::Timeout)));
    let snapshot = relay.metrics.snapshot();
    assert_eq!(snapshot.forwarded, 1);
    assert_eq!(snapshot.no_reply, 1);
    relay.stop().await;
}

#[tokio::test]
async fn test_forward_listener_resolves_host_name() {
    let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = destination.local_addr().unwrap().port();
    let relay = RunningRelay::start(vec![listener(ListenerAction::Forward {
        address: format!("localhost:{port}"),
    })])
    .await;
    let client = client(relay.addrs[0]).await;

    client.send(b"via localhost").await.unwrap();

    let mut buf = [0u8; 1500];
    let (len, _) = timeout(Duration::from_secs(5), destination.recv_from(&mut buf))
        .await
        .expect("forwarded datagram arrives")
        .unwrap();
    assert_eq!(&buf[..len], b"via localhost");

    relay.wait_for(|m| m.snapshot().forwarded == 1).await;
    relay.stop().await;
}

#[tokio::test]
async fn test_multiple_listeners_share_key() {
    let relay = RunningRelay::start(vec![
        listener(ListenerAction::Echo),
        listener(ListenerAction::Echo),
        listener(ListenerAction::Discard),
    ])
    .await;
    assert_eq!(relay.addrs.len(), 3);

    for addr in &relay.addrs[..2] {
        let reply = client(*addr).await.request(b"ping").await.unwrap();
        assert_eq!(&reply[..], b"ping");
    }

    let discard = client(relay.addrs[2]).await;
    assert!(matches!(
        discard.request(b"ping").await,
        Err(ProtocolError::Timeout)
    ));

    relay.wait_for(|m| m.snapshot().authenticated == 3).await;
    assert_eq!(relay.metrics.snapshot().replies_sent, 2);
    relay.stop().await;
}

#[tokio::test]
async fn test_many_clients_concurrently() {
    let relay = RunningRelay::echo().await;
    let server = relay.addrs[0];

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20u32 {
        tasks.spawn(async move {
            let client = client(server).await;
            let message = format!("client {i}");
            let reply = client.request(message.as_bytes()).await.unwrap();
            assert_eq!(&reply[..], message.as_bytes());
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    assert_eq!(relay.metrics.snapshot().replies_sent, 20);
    relay.stop().await;
}
