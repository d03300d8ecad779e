#![allow(clippy::unwrap_used, clippy::panic)]
use missive_server::domain::message::MessageStatus;
use missive_server::services::message_store::MessageStore;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::HashSet;

mod common;

#[tokio::test]
async fn test_send_persists_message_with_sent_status() {
    let app = common::TestApp::spawn().await;

    let resp = app.send_text("Hello World").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.text().await.unwrap().is_empty());

    app.wait_for_message_count(1).await;

    let stored = app.store.list_by_status(None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text(), "Hello World");
    assert_eq!(stored[0].status(), MessageStatus::Sent);
}

#[tokio::test]
async fn test_send_accepts_zero_text() {
    let app = common::TestApp::spawn().await;

    let resp = app.send_text("0").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
    let stored = app.store.list_by_status(None).await.unwrap();
    assert_eq!(stored[0].text(), "0");
}

#[tokio::test]
async fn test_send_rejects_missing_and_blank_text() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.post(format!("{}/messages/send", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Text is required");

    for blank in ["", "   ", "\t\n"] {
        let resp = app.send_text(blank).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "blank text {blank:?} must be rejected");
    }

    // Nothing is queued for rejected submissions.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_send_rejects_overlong_text() {
    let app = common::TestApp::spawn().await;
    let max = app.config.messages.max_text_length;

    let resp = app.send_text(&"a".repeat(max + 1)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.send_text(&"a".repeat(max)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
}

#[tokio::test]
async fn test_send_accepts_json_body() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/messages/send", app.server_url))
        .json(&json!({ "text": "From a JSON body" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
    let stored = app.store.list_by_status(None).await.unwrap();
    assert_eq!(stored[0].text(), "From a JSON body");
}

#[tokio::test]
async fn test_send_rejects_malformed_json_body() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/messages/send", app.server_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_legacy_get_send_route() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/messages/send", app.server_url))
        .query(&[("text", "Sent over GET")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
}

#[tokio::test]
async fn test_identical_texts_get_distinct_uuids() {
    let app = common::TestApp::spawn().await;

    for _ in 0..5 {
        assert_eq!(app.send_text("same text").await.status(), StatusCode::NO_CONTENT);
    }
    app.wait_for_message_count(5).await;

    let stored = app.store.list_by_status(None).await.unwrap();
    let uuids: HashSet<_> = stored.iter().map(|m| m.uuid()).collect();
    assert_eq!(uuids.len(), 5);
}

#[tokio::test]
async fn test_text_with_sql_metacharacters_is_stored_verbatim() {
    let app = common::TestApp::spawn().await;
    let text = "'); DROP TABLE messages; --";

    assert_eq!(app.send_text(text).await.status(), StatusCode::NO_CONTENT);
    app.wait_for_message_count(1).await;

    let body = app.list_json(None).await;
    assert_eq!(body["messages"][0]["text"], text);
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let app = common::TestApp::spawn().await;
    app.store.fail_next_creates(2);

    assert_eq!(app.send_text("eventually stored").await.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
}

#[tokio::test]
async fn test_full_queue_reports_send_failure() {
    let mut config = common::get_test_config();
    config.dispatch.queue_capacity = 1;
    config.dispatch.min_backoff_ms = 500;
    config.dispatch.max_backoff_ms = 1000;
    let app = common::TestApp::spawn_with_config(config).await;

    // Keep the worker stuck retrying so the queue stays occupied.
    app.store.fail_next_creates(usize::MAX);

    let mut statuses = Vec::new();
    for i in 0..10 {
        statuses.push(app.send_text(&format!("message {i}")).await.status());
    }

    assert!(statuses.contains(&StatusCode::NO_CONTENT));
    assert!(statuses.contains(&StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn test_malformed_query_gets_json_error() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.post(format!("{}/messages/send?text=a&text=b", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = app.client.get(format!("{}/messages?status=sent&status=read", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_send_accepts_form_body() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/messages/send", app.server_url))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("text=From+a+form")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.wait_for_message_count(1).await;
    let stored = app.store.list_by_status(None).await.unwrap();
    assert_eq!(stored[0].text(), "From a form");
}

#[tokio::test]
async fn test_send_rejects_unsupported_body_type() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/messages/send", app.server_url))
        .header("content-type", "text/plain")
        .body("plain text")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("form"));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(app.store.is_empty());
}
