use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use sg_webhook::AppState;
use sg_webhook::config::Config;
use sg_webhook::models::TaskRef;
use sg_webhook::router::build_router;
use sg_webhook::services::{PayloadDispatcher, ProcessError, TaskHandler, TaskOutcome};
use sg_webhook::utils::{SIGNATURE_HEADER, compute_signature};

const SECRET: &str = "integration-webhook-secret";

/// Forwards every processed task to the test.
struct ChannelHandler {
    tx: mpsc::UnboundedSender<TaskRef>,
}

#[async_trait]
impl TaskHandler for ChannelHandler {
    async fn process(&self, task: TaskRef) -> Result<TaskOutcome, ProcessError> {
        let _ = self.tx.send(task);
        Ok(TaskOutcome::TaskNotFound)
    }
}

fn test_config(environment: &str) -> Config {
    let environment = environment.to_string();
    Config::from_lookup(move |key| match key {
        "SHOTGUN_SITE" => Some("https://studio.shotgrid.autodesk.com".to_string()),
        "SHOTGUN_WEBHOOK_SCRIPT_USER" => Some("webhook_bot".to_string()),
        "SHOTGUN_WEBHOOK_SCRIPT_KEY" => Some("script-key".to_string()),
        "SHOTGUN_WEBHOOK_SECRET" => Some(SECRET.to_string()),
        "ENVIRONMENT" => Some(environment.clone()),
        _ => None,
    })
    .expect("test configuration is valid")
}

fn test_app(environment: &str) -> (Router, mpsc::UnboundedReceiver<TaskRef>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = PayloadDispatcher::new(Arc::new(ChannelHandler { tx }));
    let state = AppState::new(test_config(environment), dispatcher);
    (build_router(state), rx)
}

fn webhook_request(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/sg_task_webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn task_payload() -> Vec<u8> {
    json!({
        "data": {
            "event_type": "Shotgun_Task_Change",
            "entity": {"type": "Task", "id": 42},
            "project": {"type": "Project", "id": 7},
            "meta": {
                "type": "attribute_change",
                "attribute_name": "sg_status_list",
                "old_value": "wtg",
                "new_value": "ip"
            }
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (app, _rx) = test_app("development");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?, json!({"status": "healthy"}));
    Ok(())
}

#[tokio::test]
async fn test_missing_signature_is_rejected_before_parsing() -> Result<()> {
    let (app, mut rx) = test_app("development");

    // Not JSON: a 401 proves the body was never parsed
    let response = app.oneshot(webhook_request(b"not json at all", None)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["error"]["message"], "Missing signature");
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_invalid_signature_is_rejected() -> Result<()> {
    let (app, mut rx) = test_app("development");
    let body = task_payload();
    let signature = compute_signature(&body, b"some-other-secret");

    let response = app.oneshot(webhook_request(&body, Some(&signature))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await?["error"]["message"],
        "Invalid signature"
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_non_ascii_signature_is_invalid_not_missing() -> Result<()> {
    let (app, mut rx) = test_app("development");
    let body = task_payload();
    let request = Request::builder()
        .method("POST")
        .uri("/sg_task_webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, HeaderValue::from_bytes(b"sha1=\xff\xfe")?)
        .body(Body::from(body))?;

    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await?["error"]["message"],
        "Invalid signature"
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_uppercase_signature_is_rejected() -> Result<()> {
    let (app, _rx) = test_app("development");
    let body = task_payload();
    let signature = compute_signature(&body, SECRET.as_bytes());
    let upper = format!("sha1={}", signature["sha1=".len()..].to_uppercase());

    let response = app.oneshot(webhook_request(&body, Some(&upper))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_signed_task_event_is_accepted_and_processed() -> Result<()> {
    let (app, mut rx) = test_app("development");
    let body = task_payload();
    let signature = compute_signature(&body, SECRET.as_bytes());

    let response = app.oneshot(webhook_request(&body, Some(&signature))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await?, json!({"status": "accepted"}));

    let task = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("handler was invoked");
    assert_eq!(
        task,
        TaskRef {
            project_id: 7,
            task_id: 42
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_non_task_event_is_accepted_but_ignored() -> Result<()> {
    let (app, mut rx) = test_app("development");
    let body = json!({
        "data": {
            "event_type": "Shotgun_Version_Change",
            "entity": {"type": "Version", "id": 9},
            "project": {"id": 7}
        }
    })
    .to_string()
    .into_bytes();
    let signature = compute_signature(&body, SECRET.as_bytes());

    let response = app.oneshot(webhook_request(&body, Some(&signature))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_signed_malformed_json_is_a_server_error() -> Result<()> {
    let (app, _rx) = test_app("development");
    let body = b"{\"data\": ";
    let signature = compute_signature(body, SECRET.as_bytes());

    let response = app.oneshot(webhook_request(body, Some(&signature))).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn test_docs_served_outside_production() -> Result<()> {
    let (app, _rx) = test_app("development");

    let response = app
        .oneshot(Request::builder().uri("/docs/openapi.json").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await?;
    assert!(doc["paths"]["/sg_task_webhook"].is_object());
    Ok(())
}

#[tokio::test]
async fn test_docs_absent_in_production() -> Result<()> {
    let (app, _rx) = test_app("production");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/docs/openapi.json").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::builder().uri("/docs/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
