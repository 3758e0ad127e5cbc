//! Integration tests for the WebSocket command protocol and session
//! lifecycle, driving a real server over a real socket.

mod common;

use futures::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use common::{connect, recv_json, start_server, wait_for_empty_registry};
use obs_launcherd::config::Config;

fn test_config() -> Config {
    Config {
        ip_address: "127.0.0.1".into(),
        port: 8765,
        ..Config::default()
    }
}

#[tokio::test]
async fn connect_server_round_trip() {
    let (addr, registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;
    assert_eq!(registry.len(), 1);

    ws.send(Message::Text(
        json!({"command": "CONNECT_SERVER", "command_uid": "c1"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["command_uid"], "c1");
    assert_eq!(resp["data"]["ip_address"], "127.0.0.1");
    assert_eq!(resp["data"]["port"], 8765);
    assert!(resp["data"]["pid"].is_string());
}

#[tokio::test]
async fn responses_arrive_in_request_order() {
    let (addr, _registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;

    // Mix of command types, all sent before reading any response.
    let uids = ["r1", "r2", "r3", "r4", "r5"];
    for uid in uids {
        let command = if uid == "r3" { "NO_SUCH_COMMAND" } else { "CONNECT_SERVER" };
        ws.send(Message::Text(
            json!({"command": command, "command_uid": uid})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    }

    for uid in uids {
        let resp = recv_json(&mut ws).await;
        assert_eq!(resp["command_uid"], uid);
    }
}

#[tokio::test]
async fn malformed_message_yields_unknown_sentinel() {
    let (addr, _registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();
    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["command_uid"], "unknown");

    // The connection survives a malformed request.
    ws.send(Message::Text(
        json!({"command": "CONNECT_SERVER", "command_uid": "after"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["command_uid"], "after");
}

#[tokio::test]
async fn commandless_message_yields_error_not_disconnect() {
    let (addr, _registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text(
        json!({"command_uid": "only-uid"}).to_string().into(),
    ))
    .await
    .unwrap();
    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["command_uid"], "only-uid");
}

#[tokio::test]
async fn unknown_command_is_reported_with_uid() {
    let (addr, _registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text(
        json!({"command": "LAUNCH_MISSILES", "command_uid": "u9"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["command_uid"], "u9");
    assert_eq!(resp["message"], "Unknown command: LAUNCH_MISSILES");
}

#[tokio::test]
async fn disconnect_server_closes_the_connection() {
    let (addr, registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text(
        json!({"command": "DISCONNECT_SERVER", "command_uid": "bye"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["command_uid"], "bye");

    // Server closes the socket and removes the session.
    wait_for_empty_registry(&registry).await;
}

#[tokio::test]
async fn graceful_client_close_removes_the_session() {
    let (addr, registry) = start_server(test_config()).await;
    let mut ws = connect(addr).await;
    assert_eq!(registry.len(), 1);

    ws.close(None).await.unwrap();
    wait_for_empty_registry(&registry).await;
}

#[tokio::test]
async fn abrupt_disconnect_still_cleans_up() {
    let (addr, registry) = start_server(test_config()).await;
    let ws = connect(addr).await;
    assert_eq!(registry.len(), 1);

    // Drop without a close handshake; the server sees a broken stream.
    drop(ws);
    wait_for_empty_registry(&registry).await;
}

#[tokio::test]
async fn each_connection_gets_its_own_session() {
    let (addr, registry) = start_server(test_config()).await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    assert_eq!(registry.len(), 2);

    for ws in [&mut first, &mut second] {
        ws.send(Message::Text(
            json!({"command": "CONNECT_SERVER", "command_uid": "id"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    }
    let a = recv_json(&mut first).await;
    let b = recv_json(&mut second).await;
    assert_ne!(a["data"]["pid"], b["data"]["pid"]);

    drop(first);
    drop(second);
    wait_for_empty_registry(&registry).await;
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (addr, _registry) = start_server(test_config()).await;
    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = stream;
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let text = String::from_utf8_lossy(&buf);
    assert!(text.starts_with("HTTP/1.1 200"));
    assert!(text.contains("\"status\":\"ok\""));
}
