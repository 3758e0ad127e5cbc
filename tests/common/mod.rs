#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use obs_launcherd::{
    config::Config,
    registry::SessionRegistry,
    server::{self, AppState},
};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a server on an ephemeral port, returning its address and a handle
/// on the session registry for assertions.
pub async fn start_server(config: Config) -> (SocketAddr, SessionRegistry) {
    let state = AppState::new(config);
    let registry = state.sessions.clone();
    let app = server::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, registry)
}

/// Open a WebSocket connection to a running test server.
pub async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Receive the next text message and parse it as JSON.
pub async fn recv_json(ws: &mut WsStream) -> serde_json::Value {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("invalid JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text message, got {other:?}"),
        }
    }
}

/// Poll until the registry is empty or the deadline passes.
pub async fn wait_for_empty_registry(registry: &SessionRegistry) {
    for _ in 0..100 {
        if registry.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("registry still has {} session(s)", registry.len());
}
