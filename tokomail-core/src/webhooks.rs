//! Payment gateway webhook ingress.
//!
//! Two callback shapes from the same gateway family feed the one
//! fulfillment engine. Both acknowledge uninteresting statuses with a 200 so
//! the gateway stops redelivering them; real processing errors return 5xx,
//! and the resulting gateway retries are made safe by the engine's
//! conditional claim.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::fulfillment::{FulfillmentOutcome, PaymentInfo};
use crate::orders;
use crate::AppState;

/// Status spellings the gateway family uses for a settled payment.
const COMPLETED_STATUSES: [&str; 3] = ["completed", "PAID", "SUCCESS"];

fn is_completed_status(status: &str) -> bool {
    COMPLETED_STATUSES.contains(&status)
}

fn describe(outcome: &FulfillmentOutcome) -> &'static str {
    match outcome {
        FulfillmentOutcome::Fulfilled { .. } => "order fulfilled",
        FulfillmentOutcome::AlreadyFulfilled => "order already fulfilled",
        FulfillmentOutcome::OutOfStock { .. } => "out of stock, order cancelled",
    }
}

/// Set the order to `cancelled` after a processing failure, swallowing any
/// secondary error: the 5xx we are about to return matters more than the
/// rollback bookkeeping.
async fn rollback_order(state: &AppState, order_id: Uuid) {
    match orders::cancel_if_unfulfilled(&state.db, order_id).await {
        Ok(true) => warn!("order {} cancelled after webhook failure", order_id),
        Ok(false) => {}
        Err(e) => error!("order {} rollback failed: {}", order_id, e),
    }
}

/// Variant A payload: `order_id` plus a loosely-spelled status.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhookPayload {
    pub order_id: Uuid,
    pub status: String,
}

/// `POST /webhooks/payment` (variant A).
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookPayload>,
) -> Result<Json<Value>, AppError> {
    info!(
        "payment webhook for order {} with status '{}'",
        payload.order_id, payload.status
    );

    if !is_completed_status(&payload.status) {
        // Not an error: unknown-but-valid statuses must be acknowledged or
        // the gateway redelivers them forever.
        return Ok(Json(json!({
            "success": true,
            "message": format!("status '{}' ignored", payload.status),
        })));
    }

    match state.engine.fulfill(payload.order_id, None).await {
        Ok(outcome) => Ok(Json(json!({
            "success": true,
            "message": describe(&outcome),
        }))),
        Err(e) => {
            error!("payment webhook failed for order {}: {}", payload.order_id, e);
            rollback_order(&state, payload.order_id).await;
            Err(e)
        }
    }
}

/// Variant B payload: project-scoped callback with payment metadata.
#[derive(Debug, Deserialize)]
pub struct TransactionWebhookPayload {
    pub order_id: Uuid,
    pub project: String,
    pub status: String,
    pub amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub completed_at: Option<String>,
}

/// `POST /webhooks/transaction` (variant B).
pub async fn transaction_webhook(
    State(state): State<AppState>,
    Json(payload): Json<TransactionWebhookPayload>,
) -> Response {
    info!(
        "transaction webhook for order {} (project '{}', status '{}')",
        payload.order_id, payload.project, payload.status
    );

    if payload.project != state.config.payment_project {
        warn!(
            "transaction webhook rejected: project '{}' does not match",
            payload.project
        );
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "error": "unknown project" })),
        )
            .into_response();
    }

    if payload.status != "completed" {
        return Json(json!({ "ok": true })).into_response();
    }

    let payment = PaymentInfo {
        payment_method: payload.payment_method.clone(),
        amount: payload.amount,
    };

    match state.engine.fulfill(payload.order_id, Some(payment)).await {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(e) => {
            error!(
                "transaction webhook failed for order {}: {}",
                payload.order_id, e
            );
            rollback_order(&state, payload.order_id).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
