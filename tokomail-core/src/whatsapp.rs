//! WhatsApp messaging provider adapter and the `whatsapp_logs` audit trail.
//!
//! One outbound POST per send, no internal retry; whether and when to retry
//! is the caller's decision.

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::NotificationStatus;

/// Destination country code prepended to local numbers.
const COUNTRY_CODE: &str = "62";

/// Outcome of one send attempt. Transport failures are reported here rather
/// than as errors so the caller can log the attempt either way.
#[derive(Debug, Clone)]
pub struct SendReport {
    pub success: bool,
    pub raw_response: String,
}

/// Thin client over the messaging provider's HTTP API.
#[derive(Clone)]
pub struct WhatsappClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl WhatsappClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.whatsapp_api_url.clone(),
            api_key: config.whatsapp_api_key.clone(),
        }
    }

    /// Send one text message. The phone number is normalized before
    /// dispatch so every caller addresses the provider identically.
    pub async fn send(&self, phone: &str, message: &str) -> SendReport {
        let target = normalize_phone(phone);
        info!("Sending WhatsApp message to {}", target);

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .form(&[
                ("target", target.as_str()),
                ("message", message),
                ("countryCode", COUNTRY_CODE),
            ])
            .send()
            .await;

        match response {
            Ok(resp) => {
                let success = resp.status().is_success();
                let raw_response = resp.text().await.unwrap_or_default();
                if !success {
                    warn!("WhatsApp provider returned non-success: {}", raw_response);
                }
                SendReport {
                    success,
                    raw_response,
                }
            }
            Err(e) => {
                warn!("WhatsApp request failed: {}", e);
                SendReport {
                    success: false,
                    raw_response: e.to_string(),
                }
            }
        }
    }
}

/// Normalize a buyer phone number to `62`-prefixed international form.
///
/// A leading `+` is stripped, a leading `0` is rewritten to the country
/// code, and a bare local number gets the country code prepended.
pub fn normalize_phone(raw: &str) -> String {
    let digits = raw.trim().trim_start_matches('+');
    if let Some(rest) = digits.strip_prefix('0') {
        format!("{}{}", COUNTRY_CODE, rest)
    } else if digits.starts_with(COUNTRY_CODE) {
        digits.to_string()
    } else {
        format!("{}{}", COUNTRY_CODE, digits)
    }
}

/// Record a send attempt before it is made. Returns the log row id.
pub async fn insert_log(
    pool: &PgPool,
    order_id: Uuid,
    to_number: &str,
    message: &str,
) -> Result<Uuid, AppError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO whatsapp_logs (order_id, to_number, message, status)
        VALUES ($1, $2, $3, 'sending')
        RETURNING id
        "#,
    )
    .bind(order_id)
    .bind(to_number)
    .bind(message)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// List recent log entries, newest first (admin audit view).
pub async fn list_logs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<crate::models::WhatsappLog>, AppError> {
    let logs = sqlx::query_as::<_, crate::models::WhatsappLog>(
        r#"
        SELECT id, order_id, to_number, message, status, response_raw, created_at
        FROM whatsapp_logs
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}

/// Resolve a previously inserted log entry with the attempt's outcome.
pub async fn finish_log(
    pool: &PgPool,
    log_id: Uuid,
    status: NotificationStatus,
    response_raw: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE whatsapp_logs SET status = $2, response_raw = $3 WHERE id = $1")
        .bind(log_id)
        .bind(status)
        .bind(response_raw)
        .execute(pool)
        .await?;
    Ok(())
}
