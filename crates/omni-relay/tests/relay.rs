//! End-to-end tests: real HTTP/WebSocket server, scripted broker, real
//! WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use prost::Message as _;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use omni_relay::broker::{BrokerConnector, BrokerLink, InboundMessage};
use omni_relay::{
    BackoffPolicy, BrokerConsumer, ConnectionRegistry, RelayPipeline, RelayServer, ServerConfig,
    ShutdownCoordinator, Topology, TransportError,
};
use omni_settings::BrokerSettings;
use omni_wire::event_frame::Payload;
use omni_wire::{EventFrame, GatewayState, GatewayStatus, MarketData, OrderUpdate};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ── Scripted broker ──

/// Link fed by a channel; every ack is recorded.
struct ChannelLink {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    next_tag: u64,
    acks: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl BrokerLink for ChannelLink {
    async fn subscribe(&mut self, _topology: &Topology) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        let Some(body) = self.rx.recv().await else {
            return Ok(None);
        };
        self.next_tag += 1;
        Ok(Some(InboundMessage {
            delivery_tag: self.next_tag,
            routing_key: "trade.test".into(),
            body,
            redelivered: false,
        }))
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError> {
        self.acks.lock().push(delivery_tag);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Hands out a single channel-fed link, then refuses.
struct ChannelConnector {
    link: Mutex<Option<ChannelLink>>,
}

#[async_trait]
impl BrokerConnector for ChannelConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerLink>, TransportError> {
        match self.link.lock().take() {
            Some(link) => Ok(Box::new(link)),
            None => Err(TransportError::StreamClosed),
        }
    }
}

struct Relay {
    ws_url: String,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    publish: mpsc::UnboundedSender<Vec<u8>>,
    acks: Arc<Mutex<Vec<u64>>>,
    server_task: tokio::task::JoinHandle<()>,
    consumer_task: tokio::task::JoinHandle<()>,
}

async fn boot_relay(max_connections: usize) -> Relay {
    let registry = Arc::new(ConnectionRegistry::new());
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        max_connections,
        ..ServerConfig::default()
    };
    let server = RelayServer::new(config, Arc::clone(&registry), Arc::clone(&shutdown));
    let (addr, server_task) = server.listen().await.unwrap();

    let (publish, rx) = mpsc::unbounded_channel();
    let acks = Arc::new(Mutex::new(Vec::new()));
    let connector = ChannelConnector {
        link: Mutex::new(Some(ChannelLink {
            rx,
            next_tag: 0,
            acks: Arc::clone(&acks),
        })),
    };
    let consumer_task = BrokerConsumer::new(
        Arc::new(connector),
        Topology::from(&BrokerSettings::default()),
        BackoffPolicy::Constant(Duration::from_millis(100)),
        RelayPipeline::new(Arc::clone(&registry)),
    )
    .spawn(shutdown.ingest_token());

    Relay {
        ws_url: format!("ws://{addr}/ws"),
        registry,
        shutdown,
        publish,
        acks,
        server_task,
        consumer_task,
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn wait_for_clients(registry: &ConnectionRegistry, n: usize) {
    timeout(TIMEOUT, async {
        while registry.len().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut WsStream) -> Value {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .unwrap()
}

fn frame(payload: Payload) -> Vec<u8> {
    EventFrame {
        timestamp_ns: 1_718_000_000_123_456_789,
        source_id: "ctp_sim_01".into(),
        payload: Some(payload),
    }
    .encode_to_vec()
}

fn tick(symbol: &str, price: f64) -> Vec<u8> {
    frame(Payload::Tick(MarketData {
        symbol: symbol.into(),
        exchange: "SHFE".into(),
        last_price: price,
        volume: 7,
        open_interest: 1_000.0,
    }))
}

// ── Tests ──

#[tokio::test]
async fn event_is_fanned_out_to_every_client() {
    let relay = boot_relay(10).await;
    let mut a = connect(&relay.ws_url).await;
    let mut b = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 2).await;

    relay.publish.send(tick("rb2501", 3_550.5)).unwrap();

    for ws in [&mut a, &mut b] {
        let json = next_json(ws).await;
        assert_eq!(json["source_id"], "ctp_sim_01");
        assert_eq!(json["timestamp_ns"], "1718000000123456789");
        assert_eq!(json["tick"]["symbol"], "rb2501");
        assert_eq!(json["tick"]["exchange"], "SHFE");
        assert_eq!(json["tick"]["last_price"], 3_550.5);
        assert_eq!(json["tick"]["volume"], 7);
    }

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn malformed_message_is_skipped_and_acked() {
    let relay = boot_relay(10).await;
    let mut ws = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 1).await;

    relay
        .publish
        .send(frame(Payload::Order(OrderUpdate {
            order_id: "ref:1-2-3".into(),
            symbol: "rb2501".into(),
            direction: "Buy".into(),
            offset: "Open".into(),
            price: 3_500.0,
            volume: 2,
            status: "a".into(),
        })))
        .unwrap();
    relay.publish.send(b"definitely not protobuf".to_vec()).unwrap();
    relay
        .publish
        .send(frame(Payload::Status(GatewayStatus {
            gateway_id: "ctp".into(),
            state: GatewayState::Disconnected as i32,
            message: "front lost".into(),
        })))
        .unwrap();

    let first = next_json(&mut ws).await;
    let second = next_json(&mut ws).await;
    assert_eq!(first["order"]["order_id"], "ref:1-2-3");
    assert_eq!(second["status"]["state"], "GATEWAY_STATE_DISCONNECTED");

    timeout(TIMEOUT, async {
        while relay.acks.lock().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(*relay.acks.lock(), vec![1, 2, 3]);

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn disconnected_client_is_unregistered() {
    let relay = boot_relay(10).await;
    let mut stays = connect(&relay.ws_url).await;
    let mut leaves = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 2).await;

    leaves.close(None).await.unwrap();
    wait_for_clients(&relay.registry, 1).await;

    relay.publish.send(tick("hc2501", 3_300.0)).unwrap();
    let json = next_json(&mut stays).await;
    assert_eq!(json["tick"]["symbol"], "hc2501");

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn upgrade_beyond_capacity_is_refused() {
    let relay = boot_relay(1).await;
    let _first = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 1).await;

    let err = timeout(TIMEOUT, connect_async(relay.ws_url.as_str()))
        .await
        .unwrap()
        .unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(resp) => {
            assert_eq!(resp.status(), 503);
        }
        other => panic!("expected HTTP 503, got {other:?}"),
    }
    assert_eq!(relay.registry.len().await, 1);

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn shutdown_closes_client_sessions() {
    let relay = boot_relay(10).await;
    let mut ws = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 1).await;

    relay.shutdown.shutdown();

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
    wait_for_clients(&relay.registry, 0).await;
}

#[tokio::test]
async fn concurrent_upgrades_never_exceed_capacity() {
    let relay = boot_relay(1).await;

    let attempts: Vec<_> = (0..10)
        .map(|_| {
            let url = relay.ws_url.clone();
            tokio::spawn(async move { timeout(TIMEOUT, connect_async(url)).await.unwrap() })
        })
        .collect();

    let mut accepted = Vec::new();
    let mut refused = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok((ws, _)) => accepted.push(ws),
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                assert_eq!(resp.status(), 503);
                refused += 1;
            }
            Err(other) => panic!("unexpected handshake error: {other:?}"),
        }
    }

    assert_eq!(accepted.len(), 1);
    assert_eq!(refused, 9);
    wait_for_clients(&relay.registry, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.registry.len().await, 1);

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn slot_is_released_when_client_leaves() {
    let relay = boot_relay(1).await;
    let mut first = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 1).await;

    first.close(None).await.unwrap();
    wait_for_clients(&relay.registry, 0).await;

    // The slot frees once the session finishes its cleanup.
    let mut second = timeout(TIMEOUT, async {
        loop {
            if let Ok((ws, _)) = connect_async(relay.ws_url.as_str()).await {
                return ws;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    wait_for_clients(&relay.registry, 1).await;

    relay.publish.send(tick("ag2506", 7_800.0)).unwrap();
    let json = next_json(&mut second).await;
    assert_eq!(json["tick"]["symbol"], "ag2506");

    relay.shutdown.shutdown();
}

#[tokio::test]
async fn graceful_shutdown_stops_consumer_then_sessions() {
    let relay = boot_relay(10).await;
    let mut ws = connect(&relay.ws_url).await;
    wait_for_clients(&relay.registry, 1).await;

    relay.publish.send(tick("rb2501", 3_551.0)).unwrap();
    assert_eq!(next_json(&mut ws).await["tick"]["symbol"], "rb2501");

    let report = relay
        .shutdown
        .graceful_shutdown(relay.consumer_task, relay.server_task, Some(TIMEOUT))
        .await;
    assert!(report.consumer_drained);
    assert!(report.server_drained);
    assert_eq!(*relay.acks.lock(), vec![1]);

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
}
