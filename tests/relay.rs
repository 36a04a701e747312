mod common;

use common::{create_test_config, notify_url, sample_notification, spawn_server, Upstream, TEST_KEY};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tvlp::notify::{RelayClient, WalletNotification};

#[test_log::test(tokio::test)]
async fn test_notification_is_forwarded_with_key() {
    let upstream = Upstream::start(json!({ "ok": true, "delivered": 1 })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));

    let response = Client::new()
        .post(notify_url(addr))
        .json(&sample_notification())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["relay"], json!({ "ok": true, "delivered": 1 }));

    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].key.as_deref(), Some(TEST_KEY));
    assert_eq!(received[0].body, sample_notification());
}

#[test_log::test(tokio::test)]
async fn test_empty_body_is_sent_as_empty_object() {
    let upstream = Upstream::start(json!({ "ok": true })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));

    let response = Client::new().post(notify_url(addr)).body("").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(upstream.received()[0].body, json!({}));
}

#[test_log::test(tokio::test)]
async fn test_upstream_without_ok_is_reported() {
    let upstream = Upstream::start(json!({ "status": "queued" })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));

    let response = Client::new()
        .post(notify_url(addr))
        .json(&sample_notification())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["relay"]["status"], "queued");
}

#[test_log::test(tokio::test)]
async fn test_rejected_requests_never_reach_upstream() {
    let upstream = Upstream::start(json!({ "ok": true })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));
    let client = Client::new();

    let invalid = client.post(notify_url(addr)).body("{").send().await.unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body, json!({ "ok": false, "error": "Invalid JSON" }));

    let blank = client.post(notify_url(addr)).body("   ").send().await.unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let get = client.get(notify_url(addr)).send().await.unwrap();
    assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);

    let oversized = client
        .post(notify_url(addr))
        .body(format!("{{\"pad\":\"{}\"}}", "x".repeat(2048)))
        .send()
        .await
        .unwrap();
    assert_eq!(oversized.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert!(upstream.received().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_preflight() {
    let upstream = Upstream::start(json!({ "ok": true })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));

    let response = Client::new()
        .request(reqwest::Method::OPTIONS, notify_url(addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-headers"], "Content-Type");
}

#[test_log::test(tokio::test)]
async fn test_upstream_down_gives_500() {
    let addr = spawn_server(&create_test_config("http://127.0.0.1:9/broadcast"));

    let response = Client::new()
        .post(notify_url(addr))
        .json(&sample_notification())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_relay_client_round_trip() {
    let upstream = Upstream::start(json!({ "ok": true })).await;
    let addr = spawn_server(&create_test_config(&upstream.url));

    let client = RelayClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let notification = WalletNotification::new(
        "TBXSw8fM4jpQkGc6zZjsVABFpVN7UvXPdV",
        Some("tron-mainnet".to_string()),
        "integration",
    );
    let answer = tokio_test::assert_ok!(client.send(&notification).await);
    assert_eq!(answer["ok"], true);

    let received = upstream.received();
    assert_eq!(received[0].body["address"], notification.address);
    assert_eq!(received[0].body["walletType"], "unknown");
    assert!(received[0].body.get("ts").is_some());
}
