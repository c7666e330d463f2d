//! End-to-end tests over real WebSocket connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use signal_relay::{RelayServer, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    server: Arc<RelayServer>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        let server = Arc::new(RelayServer::new(config));
        let (tx, rx) = oneshot::channel();

        let running = Arc::clone(&server);
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            running.serve_until(listener, shutdown).await
        });

        Self {
            addr,
            server,
            shutdown: Some(tx),
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connect and consume the greeting; returns the assigned ID
    async fn connect(&self) -> (Client, String) {
        let (mut ws, _) = assert_ok!(connect_async(self.url()).await);

        let hello = recv(&mut ws).await;
        assert_eq!(hello["event"], "connect-success");
        let id = hello["data"]["id"].as_str().unwrap().to_string();

        let peers = recv(&mut ws).await;
        assert_eq!(peers, json!({"event": "update-peers", "data": [summary(&id, "", false, false)]}));

        (ws, id)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn summary(id: &str, name: &str, cam_on: bool, mic_on: bool) -> Value {
    json!({"id": id, "name": name, "camOn": cam_on, "micOn": mic_on})
}

async fn send(ws: &mut Client, event: Value) {
    assert_ok!(ws.send(Message::Text(event.to_string())).await);
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for an event");
        match next {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(Message::Close(_))) | None => panic!("connection closed"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("websocket error: {}", e),
        }
    }
}

async fn expect_close(ws: &mut Client) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(Message::Text(text))) => panic!("unexpected event before close: {}", text),
            Some(Ok(_)) => continue,
        }
    }
}

fn ids(event: &Value) -> Vec<String> {
    let mut ids: Vec<String> = event["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|peer| peer["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_group_signaling_flow() {
    let server = TestServer::start(ServerConfig::default()).await;
    let (mut x, x_id) = server.connect().await;
    let (mut y, y_id) = server.connect().await;
    assert_ne!(x_id, y_id);

    send(&mut x, json!({"event": "connect-peer", "data": {"targetId": y_id}})).await;
    let mut both = vec![x_id.clone(), y_id.clone()];
    both.sort();
    assert_eq!(ids(&recv(&mut x).await), both);
    assert_eq!(ids(&recv(&mut y).await), both);

    send(
        &mut x,
        json!({"event": "update-status", "data": {"camOn": true, "micOn": false}}),
    )
    .await;
    let update = json!({"event": "peer-updated", "data": summary(&x_id, "", true, false)});
    assert_eq!(recv(&mut y).await, update);
    assert_eq!(recv(&mut x).await, update);

    // Malformed frames are dropped without closing the connection
    send(&mut x, json!({"event": "self-destruct"})).await;
    assert_ok!(x.send(Message::Text("{not json".into())).await);

    let signal = json!({"type": "offer", "sdp": "v=0"});
    send(
        &mut x,
        json!({"event": "offer", "data": {"to": y_id, "signal": signal}}),
    )
    .await;
    assert_eq!(
        recv(&mut y).await,
        json!({"event": "offer", "data": {"from": x_id, "signal": signal}})
    );

    send(
        &mut y,
        json!({"event": "send-message", "data": {"to": x_id, "msg": "hi", "name": "yan"}}),
    )
    .await;
    assert_eq!(
        recv(&mut x).await,
        json!({"event": "receive-message", "data": {"from": y_id, "fromName": "yan", "msg": "hi"}})
    );

    send(&mut y, json!({"event": "leave"})).await;
    expect_close(&mut y).await;

    assert_eq!(
        recv(&mut x).await,
        json!({"event": "peer-left", "data": {"id": y_id}})
    );
    assert_eq!(ids(&recv(&mut x).await), vec![x_id.clone()]);

    let stats = server.server.stats().snapshot();
    assert_eq!(stats.connections_accepted, 2);
    assert_eq!(stats.malformed_frames, 2);
}

#[tokio::test]
async fn test_ungrouped_offer_is_not_delivered() {
    let server = TestServer::start(ServerConfig::default()).await;
    let (mut x, x_id) = server.connect().await;
    let (mut z, _z_id) = server.connect().await;

    send(
        &mut z,
        json!({"event": "offer", "data": {"to": x_id, "signal": {}}}),
    )
    .await;
    send(&mut x, json!({"event": "set-name", "data": {"name": "xena"}})).await;

    // The first thing X sees is its own rename, not Z's offer
    assert_eq!(
        recv(&mut x).await,
        json!({"event": "peer-updated", "data": summary(&x_id, "xena", false, false)})
    );
    assert_eq!(
        recv(&mut x).await,
        json!({"event": "update-peers", "data": [summary(&x_id, "xena", false, false)]})
    );
}

#[tokio::test]
async fn test_remove_peer_closes_removed_connection() {
    let config = ServerConfig::default().removal_grace(Duration::from_millis(50));
    let server = TestServer::start(config).await;
    let (mut x, x_id) = server.connect().await;
    let (mut y, y_id) = server.connect().await;

    send(&mut y, json!({"event": "connect-peer", "data": x_id})).await;
    recv(&mut x).await;
    recv(&mut y).await;

    send(&mut x, json!({"event": "remove-peer", "data": {"id": y_id}})).await;
    assert_eq!(ids(&recv(&mut x).await), vec![x_id.clone()]);
    assert_eq!(ids(&recv(&mut y).await), vec![y_id.clone()]);
    assert_eq!(
        recv(&mut y).await,
        json!({"event": "remove-peer", "data": {"id": y_id}})
    );
    expect_close(&mut y).await;

    // Y was no longer grouped with X, so its disconnect is silent for X
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.server.router().peer_count().await, 1);
}

#[tokio::test]
async fn test_connection_limit() {
    let server = TestServer::start(ServerConfig::default().max_connections(1)).await;
    let (_x, _x_id) = server.connect().await;

    assert!(connect_async(server.url()).await.is_err());
    assert_eq!(server.server.stats().snapshot().connections_rejected, 1);
}

#[tokio::test]
async fn test_client_that_stops_reading_is_dropped() {
    let config = ServerConfig::default()
        .outbound_capacity(4)
        .write_timeout(Duration::from_secs(1));
    let server = TestServer::start(config).await;
    let (mut x, x_id) = server.connect().await;
    let (_y, y_id) = server.connect().await;

    send(&mut x, json!({"event": "connect-peer", "data": y_id})).await;
    recv(&mut x).await;

    // Y never reads again; flood it until its socket buffers are full
    let msg = "x".repeat(256 * 1024);
    for _ in 0..200 {
        send(
            &mut x,
            json!({"event": "send-message", "data": {"to": y_id, "msg": msg}}),
        )
        .await;
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "stalled peer was never dropped"
        );
        let event = recv(&mut x).await;
        if event["event"] == "peer-left" {
            assert_eq!(event["data"]["id"], y_id.as_str());
            break;
        }
    }

    assert_eq!(ids(&recv(&mut x).await), vec![x_id.clone()]);
    assert_eq!(server.server.router().peer_count().await, 1);
    assert!(server.server.stats().snapshot().events_dropped > 0);
}
