//! Integration tests for notification forwarding.
//!
//! Verifies the per-provider wire payloads, the single-attempt delivery
//! semantics, and that failures carry the upstream status code.

use serde_json::Value;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TestApp, authed, test_config};

async fn forward(
    app: &TestApp,
    user_id: &Uuid,
    service: &str,
    body: serde_json::Value,
) -> (u16, Value) {
    let client = reqwest::Client::new();
    let response = authed(
        client.post(format!("{}/notifications/{}", app.base_url, service)),
        user_id,
    )
    .json(&body)
    .send()
    .await
    .expect("forward request");

    let status = response.status().as_u16();
    let body: Value = response.json().await.expect("json body");
    (status, body)
}

#[tokio::test]
async fn home_assistant_forward_delivers_title_and_message() {
    let target = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/webhook/routinely"))
        .and(body_json(serde_json::json!({
            "title": "Morning routine",
            "message": "Time to stretch",
        })))
        .and(header("authorization", "Bearer ha-long-lived-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&target)
        .await;

    let app = TestApp::spawn(test_config()).await;
    let user_id = Uuid::new_v4();
    app.seed_webhook_credential(
        &user_id,
        "home_assistant",
        Some(&format!("{}/api/webhook/routinely", target.uri())),
        Some("ha-long-lived-token"),
    )
    .await;

    let (status, body) = forward(
        &app,
        &user_id,
        "home_assistant",
        serde_json::json!({"title": "Morning routine", "body": "Time to stretch"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn failed_delivery_reports_status_code_and_does_not_retry() {
    let target = MockServer::start().await;

    // expect(1) also proves no second attempt is made
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&target)
        .await;

    let app = TestApp::spawn(test_config()).await;
    let user_id = Uuid::new_v4();
    app.seed_webhook_credential(
        &user_id,
        "n8n",
        Some(&format!("{}/hook", target.uri())),
        None,
    )
    .await;

    let (status, body) = forward(
        &app,
        &user_id,
        "n8n",
        serde_json::json!({"title": "Routine", "body": "reminder"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("500"));
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn ifttt_payload_uses_value_slots() {
    let target = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trigger/routinely/with/key/abc"))
        .and(body_json(serde_json::json!({
            "value1": "Routine",
            "value2": "Drink water",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&target)
        .await;

    let app = TestApp::spawn(test_config()).await;
    let user_id = Uuid::new_v4();
    app.seed_webhook_credential(
        &user_id,
        "ifttt",
        Some(&format!("{}/trigger/routinely/with/key/abc", target.uri())),
        None,
    )
    .await;

    let (_, body) = forward(
        &app,
        &user_id,
        "ifttt",
        serde_json::json!({"title": "Routine", "body": "Drink water"}),
    )
    .await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn notify_me_uses_fixed_endpoint_and_access_code_override() {
    let target = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/SetNotification"))
        .and(body_json(serde_json::json!({
            "notification": "Evening wind-down",
            "accessCode": "override-code",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&target)
        .await;

    let mut config = test_config();
    config.notify_me_endpoint = format!("{}/v1/SetNotification", target.uri());
    let app = TestApp::spawn(config).await;

    // No stored credential at all: the per-request access code suffices
    let user_id = Uuid::new_v4();
    let (_, body) = forward(
        &app,
        &user_id,
        "notify_me",
        serde_json::json!({
            "title": "Routine",
            "body": "Evening wind-down",
            "access_code": "override-code",
        }),
    )
    .await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn missing_webhook_configuration_is_a_validation_error() {
    let app = TestApp::spawn(test_config()).await;

    let (status, body) = forward(
        &app,
        &Uuid::new_v4(),
        "home_assistant",
        serde_json::json!({"title": "Routine", "body": "hello"}),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn unknown_relay_service_is_404() {
    let app = TestApp::spawn(test_config()).await;

    let (status, _) = forward(
        &app,
        &Uuid::new_v4(),
        "fitbit",
        serde_json::json!({"title": "Routine", "body": "hello"}),
    )
    .await;

    assert_eq!(status, 404);
}
