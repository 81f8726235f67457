//! Admin surface: login, stock ledger management, order listing, and the
//! direct mark-paid fulfillment trigger.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::fulfillment::FulfillmentOutcome;
use crate::{auth, orders, stock, whatsapp, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// `POST /admin/login`: verify the admin password and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let valid = bcrypt::verify(&request.password, &state.config.admin_password_hash)
        .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))?;
    if !valid {
        return Err(AppError::Auth("invalid password".to_string()));
    }

    let token = auth::issue_token(&state.config.jwt_secret)?;
    info!("admin login succeeded");
    Ok(Json(json!({ "success": true, "token": token })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub order_id: Uuid,
}

/// `POST /admin/orders/mark-paid`: run fulfillment for an order whose
/// payment was confirmed out of band.
///
/// Admin-facing, so failures surface the raw error string for diagnosis
/// instead of a generic message.
pub async fn mark_paid(
    State(state): State<AppState>,
    Json(request): Json<MarkPaidRequest>,
) -> Json<Value> {
    match state.engine.fulfill(request.order_id, None).await {
        Ok(FulfillmentOutcome::OutOfStock {
            required,
            available,
        }) => Json(json!({
            "success": false,
            "orderId": request.order_id,
            "error": format!(
                "out of stock: order needs {} unit(s), only {} available; order cancelled and buyer notified",
                required, available
            ),
        })),
        Ok(_) => Json(json!({ "success": true, "orderId": request.order_id })),
        Err(e) => Json(json!({
            "success": false,
            "orderId": request.order_id,
            "error": e.to_string(),
        })),
    }
}

/// `GET /admin/orders`: recent orders, newest first.
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let orders = orders::list_orders(&state.db, 100).await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub username: String,
    pub password: String,
}

/// `POST /admin/stock`: insert one credential record.
pub async fn add_stock(
    State(state): State<AppState>,
    Json(request): Json<AddStockRequest>,
) -> Result<Json<Value>, AppError> {
    if request.username.trim().is_empty() || request.password.trim().is_empty() {
        return Err(AppError::Validation(
            "username and password are required".to_string(),
        ));
    }
    let account =
        stock::insert_account(&state.db, request.username.trim(), request.password.trim()).await?;
    Ok(Json(json!({ "success": true, "account": account })))
}

#[derive(Debug, Deserialize)]
pub struct BulkStockRequest {
    /// One `username:password` pair per line.
    pub accounts: String,
}

/// `POST /admin/stock/bulk`: insert many credential records at once.
pub async fn add_stock_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkStockRequest>,
) -> Result<Json<Value>, AppError> {
    let inserted = stock::insert_accounts_bulk(&state.db, &request.accounts).await?;
    Ok(Json(json!({ "success": true, "inserted": inserted })))
}

/// `DELETE /admin/stock/{id}`: remove an unused record; allocated records
/// are refused to preserve the audit trail.
pub async fn delete_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    stock::delete_if_unused(&state.db, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// `GET /admin/logs`: the WhatsApp delivery audit trail.
pub async fn list_logs(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let logs = whatsapp::list_logs(&state.db, 200).await?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}

/// `GET /admin/stock`: current ledger contents.
pub async fn list_stock(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let accounts = stock::list_accounts(&state.db, 200).await?;
    let available = stock::count_available(&state.db).await?;
    Ok(Json(json!({
        "success": true,
        "available": available,
        "accounts": accounts,
    })))
}
