//! Payment provider webhook
//!
//! `POST /api/payments/webhook` is unauthenticated; the `Stripe-Signature`
//! header over the raw body is the only credential accepted.

use axum::{Router, body::Bytes, extract::State, http::HeaderMap, routing::post};
use serde::Serialize;

use crate::core::ServerState;
use crate::orders::{DispatchError, PaymentOutcome};
use crate::security_log;
use crate::services::{parse_webhook_outcome, verify_webhook_signature};
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode};

const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/webhook", post(webhook))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
}

async fn webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<ApiResponse<WebhookAck>> {
    let Some(secret) = state.config().stripe_webhook_secret.as_deref() else {
        security_log!("WARN", "webhook_unconfigured", bytes = body.len());
        return Err(AppError::with_message(
            ErrorCode::PaymentUnavailable,
            "Payment webhook is not configured",
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            security_log!("WARN", "webhook_signature_missing", bytes = body.len());
            AppError::with_message(ErrorCode::WebhookSignatureInvalid, "Missing signature header")
        })?;

    if let Err(e) = verify_webhook_signature(&body, signature, secret) {
        security_log!("WARN", "webhook_signature_invalid", reason = e.to_string());
        return Err(DispatchError::from(e).into());
    }

    let event: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        AppError::with_message(ErrorCode::WebhookPayloadInvalid, format!("Invalid JSON: {}", e))
    })?;

    let Some((order_id, outcome)) = parse_webhook_outcome(&event).map_err(DispatchError::from)?
    else {
        tracing::debug!(event_type = ?event["type"].as_str(), "Webhook event ignored");
        return Ok(ApiResponse::success(WebhookAck {
            received: true,
            order_id: None,
        }));
    };

    match state.manager().confirm_payment_verified(&order_id, outcome).await {
        Ok(_) => {}
        // Redelivered failure for an order that is already gone
        Err(e) if outcome == PaymentOutcome::Failure && e.code() == ErrorCode::OrderNotFound => {
            tracing::info!(order_id = %order_id, "Payment failure for removed order acknowledged");
        }
        // The order settled or moved on; a retry would never apply
        Err(e) if outcome == PaymentOutcome::Failure && e.code() == ErrorCode::OrderNotPending => {
            tracing::warn!(order_id = %order_id, "Payment failure for order past payment acknowledged");
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(order_id = %order_id, outcome = ?outcome, "Payment webhook applied");
    Ok(ApiResponse::success(WebhookAck {
        received: true,
        order_id: Some(order_id),
    }))
}
