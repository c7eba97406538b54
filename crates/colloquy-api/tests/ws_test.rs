mod common;

use std::sync::Arc;

use common::{start_server, ScriptedClient};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: &str) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    ws
}

async fn connect_with_model(addr: &str, model: &str) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?model={}", addr, model))
        .await
        .unwrap();
    ws
}

/// Collect text frames for one turn, up to and including the end marker
async fn collect_turn(ws: &mut WsStream) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(msg) = ws.next().await {
        match msg.unwrap() {
            Message::Text(text) => {
                let done = text == "[END_OF_STREAM]";
                frames.push(text);
                if done {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => continue,
        }
    }
    frames
}

#[tokio::test]
async fn test_turn_streams_tokens_usage_then_marker() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text(
        serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "thread_id": "t1",
        })
        .to_string(),
    ))
    .await
    .unwrap();

    let frames = collect_turn(&mut ws).await;

    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0], "Hello");
    assert_eq!(frames[1], ", ");
    assert_eq!(frames[2], "world");

    let usage: serde_json::Value = serde_json::from_str(&frames[3]).unwrap();
    assert_eq!(usage["type"], "usage");
    assert_eq!(usage["usage"]["total_tokens"], 2000);

    assert_eq!(frames[4], "[END_OF_STREAM]");
}

#[tokio::test]
async fn test_missing_thread_id_closes_with_policy_code() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text(
        serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
        })
        .to_string(),
    ))
    .await
    .unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    match msg {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert!(frame.reason.contains("thread_id"));
        }
        other => panic!("expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_frame_closes_with_unsupported_code() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("this is not json".to_string()))
        .await
        .unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    match msg {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Unsupported);
        }
        other => panic!("expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upstream_failure_keeps_session_alive() {
    let addr = start_server(Arc::new(ScriptedClient::failing())).await;
    let mut ws = connect(&addr).await;

    let request = serde_json::json!({
        "messages": [{"role": "user", "content": "hi"}],
        "thread_id": "t1",
    })
    .to_string();

    // First turn fails upstream: error chunk, no usage, end marker
    ws.send(Message::Text(request.clone())).await.unwrap();
    let frames = collect_turn(&mut ws).await;

    assert!(frames.iter().any(|f| f.starts_with("Error: ")));
    assert!(!frames.iter().any(|f| f.contains(r#""type":"usage""#)));
    assert_eq!(frames.last().unwrap(), "[END_OF_STREAM]");

    // The session survives: the next request is still served
    ws.send(Message::Text(request)).await.unwrap();
    let frames = collect_turn(&mut ws).await;
    assert!(!frames.is_empty());
    assert_eq!(frames.last().unwrap(), "[END_OF_STREAM]");
}

#[tokio::test]
async fn test_model_override_precedence() {
    let client = Arc::new(ScriptedClient::default());
    let addr = start_server(Arc::clone(&client)).await;
    let mut ws = connect_with_model(&addr, "transport-model").await;

    // No request-level model: the transport override wins over the default
    ws.send(Message::Text(
        serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "thread_id": "t1",
        })
        .to_string(),
    ))
    .await
    .unwrap();
    collect_turn(&mut ws).await;

    // Request-level model beats the transport override
    ws.send(Message::Text(
        serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "thread_id": "t1",
            "model": "request-model",
        })
        .to_string(),
    ))
    .await
    .unwrap();
    collect_turn(&mut ws).await;

    let seen = client.seen_models.lock().unwrap();
    assert!(seen.starts_with(&["transport-model".to_string(), "transport-model".to_string()]));
    assert!(seen[2..].iter().all(|m| m == "request-model"), "{:?}", seen);
}
