//! Streaming sessions over a real socket.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use power_grid_router::api;
use power_grid_router::backend::AppState;
use power_grid_router::config::Config;

use common::{backend_with, small_generator};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> SocketAddr {
    let (backend, _) = backend_with(&small_generator(9));
    let mut cfg = Config::default();
    cfg.simulation.stream_tick_ms = 20;
    let state = AppState::new(cfg.clone(), backend);
    let app = api::router(state, &cfg);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn open(addr: SocketAddr, opening: Value) -> Client {
    let (mut ws, _) = connect_async(format!("ws://{addr}/simulation")).await.unwrap();
    ws.send(Message::Text(opening.to_string())).await.unwrap();
    ws
}

/// Next text frame as JSON, or `None` once the server closed the stream.
async fn next_frame(ws: &mut Client) -> Option<Value> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within timeout")?;
        match message.ok()? {
            Message::Text(text) => return Some(serde_json::from_str(&text).unwrap()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_node_failure_stream_keeps_ticking() {
    let addr = serve().await;
    let mut ws = open(addr, json!({"id": "DS_0", "simulation_type": "node-failure"})).await;

    for _ in 0..3 {
        let frame = next_frame(&mut ws).await.unwrap();
        let tree = frame["tree"].as_array().unwrap();
        assert!(tree.iter().all(|entry| entry["id"] != "DS_0"));
    }
    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_unknown_type_reports_every_tick() {
    let addr = serve().await;
    let mut ws = open(addr, json!({"id": "DS_0", "simulation_type": "meteor"})).await;

    for _ in 0..2 {
        let frame = next_frame(&mut ws).await.unwrap();
        assert_eq!(frame["error"], "BadRequest");
    }
    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_incomplete_opening_ends_session() {
    let addr = serve().await;
    let mut ws = open(addr, json!({"id": "DS_0"})).await;

    let frame = next_frame(&mut ws).await.unwrap();
    assert_eq!(frame["error"], "BadRequest");
    assert!(next_frame(&mut ws).await.is_none());
}
