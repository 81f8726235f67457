use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One allocatable credential pair in the stock ledger.
///
/// Rows flip from unused to used exactly once, at which point
/// `assigned_order_item_id` is stamped with the consuming line item and
/// never overwritten again; it is the audit trail for which order took the
/// account. Used rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountStock {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub is_used: bool,
    pub assigned_order_item_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
