use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Outcome of a WhatsApp send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum NotificationStatus {
    #[sqlx(rename = "sending")]
    Sending,

    #[sqlx(rename = "sent")]
    Sent,

    #[sqlx(rename = "failed")]
    Failed,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Sending => write!(f, "sending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Append-only audit record of one outbound WhatsApp message.
///
/// Inserted with status `sending` before the provider call and updated once
/// the attempt resolves; rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhatsappLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub to_number: String,
    pub message: String,
    pub status: NotificationStatus,
    pub response_raw: Option<String>,
    pub created_at: DateTime<Utc>,
}
