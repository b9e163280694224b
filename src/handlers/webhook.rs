//! ShotGrid webhook receiver.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ApiError, ErrorResponse, Result};
use crate::models::WebhookAck;
use crate::utils::{SIGNATURE_HEADER, verify_signature};

/// ShotGrid sends this with every delivery; it is only used to tag log lines.
const DELIVERY_ID_HEADER: &str = "x-sg-delivery-id";

/// Shape of a ShotGrid event delivery, for the API docs only.
///
/// The handler works on the raw bytes and reads fields by pointer, so unknown
/// fields never cause a rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookDelivery {
    /// `event_type`, `entity`, `project`, `meta` and more
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Receive a signed Task event
///
/// The body is verified against `x-sg-signature` before it is parsed.
/// Processing happens in the background; the response only acknowledges receipt.
#[utoipa::path(
    post,
    path = "/sg_task_webhook",
    tag = "webhooks",
    request_body(content = WebhookDelivery, description = "ShotGrid webhook delivery"),
    params(
        ("x-sg-signature" = String, Header, description = "sha1=<hex HMAC-SHA1 of the raw body>")
    ),
    responses(
        (status = 200, description = "Payload accepted for processing", body = WebhookAck),
        (status = 401, description = "Signature missing or invalid", body = ErrorResponse),
        (status = 500, description = "Body is not valid JSON", body = ErrorResponse)
    )
)]
pub async fn sg_task_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(ApiError::MissingSignature)?
        .to_str()
        .map_err(|_| ApiError::InvalidSignature)?;

    if !verify_signature(&body, signature, state.config.webhook_secret.as_bytes()) {
        return Err(ApiError::InvalidSignature);
    }
    debug!(bytes = body.len(), "Webhook signature verified");

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Internal(format!("webhook body is not valid JSON: {}", e)))?;

    let delivery_id = headers
        .get(DELIVERY_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!(delivery_id = %delivery_id, "Webhook accepted");

    // Detached: the outcome is logged by the dispatcher
    drop(state.dispatcher.spawn(payload, delivery_id));

    Ok(Json(WebhookAck::accepted()))
}
