mod common;

use std::sync::Arc;

use common::{start_server, ScriptedClient};

#[tokio::test]
async fn test_health_check() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;

    let response = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_chat_streams_tokens_then_usage() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": "gpt-4o-mini",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();

    // Reply text first, one usage JSON object at the end
    assert!(body.starts_with("Hello, world"));
    let usage_start = body.find(r#"{"type":"usage""#).expect("usage object present");
    let usage: serde_json::Value = serde_json::from_str(&body[usage_start..]).unwrap();
    assert_eq!(usage["usage"]["prompt_tokens"], 1000);
    assert_eq!(usage["usage"]["completion_tokens"], 1000);
    assert_eq!(usage["usage"]["total_tokens"], 2000);
    let cost = usage["usage"]["cost"].as_f64().unwrap();
    assert!((cost - 0.00075).abs() < 1e-12);
}

#[tokio::test]
async fn test_chat_upstream_failure_degrades_to_error_chunk() {
    let addr = start_server(Arc::new(ScriptedClient::failing())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();

    assert!(body.contains("Error: stream reset by peer"));
    assert!(!body.contains(r#""type":"usage""#));
}

#[tokio::test]
async fn test_chat_rejects_empty_messages() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&serde_json::json!({ "messages": [] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_chat_rejects_malformed_message_role() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&serde_json::json!({
            "messages": [{"role": "robot", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    // Rejected at the boundary by the closed Message type
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_chat_falls_back_to_default_model() {
    let client = Arc::new(ScriptedClient::default());
    let addr = start_server(Arc::clone(&client)).await;

    reqwest::Client::new()
        .post(format!("http://{}/chat", addr))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let seen = client.seen_models.lock().unwrap();
    assert!(seen.iter().all(|m| m == "default-model"), "{:?}", seen);
}

#[tokio::test]
async fn test_toggle_memory_roundtrip() {
    let addr = start_server(Arc::new(ScriptedClient::default())).await;
    let http = reqwest::Client::new();

    let first: serde_json::Value = http
        .patch(format!("http://{}/threads/t1/memory", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["thread_id"], "t1");
    assert_eq!(first["memory_enabled"], true);

    let second: serde_json::Value = http
        .patch(format!("http://{}/threads/t1/memory", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["memory_enabled"], false);
}
