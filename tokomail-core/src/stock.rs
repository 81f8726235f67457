//! Stock ledger for pre-provisioned credential records.
//!
//! Allocation is a single conditional UPDATE over the first-N unused rows so
//! two concurrent fulfillments can never claim the same record; `FOR UPDATE
//! SKIP LOCKED` keeps concurrent allocators from blocking on each other's
//! candidate rows.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::AccountStock;

/// Count of unused credential records.
///
/// Used for admission control at order-creation time and for the storefront
/// stock display.
pub async fn count_available(pool: &PgPool) -> Result<i64, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM accounts_stock WHERE is_used = FALSE")
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Atomically claim `count` unused records for one order item.
///
/// Marks the selected rows used and stamps `assigned_order_item_id` in the
/// same statement. Fails the whole allocation when fewer than `count` rows
/// matched; run inside a transaction so a shortfall on a later item rolls
/// back earlier items too.
pub async fn allocate_for_item(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    count: i64,
) -> Result<Vec<AccountStock>, AppError> {
    let allocated = sqlx::query_as::<_, AccountStock>(
        r#"
        UPDATE accounts_stock
        SET is_used = TRUE, assigned_order_item_id = $1
        WHERE id IN (
            SELECT id FROM accounts_stock
            WHERE is_used = FALSE
            ORDER BY created_at, id
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, username, password, is_used, assigned_order_item_id, created_at
        "#,
    )
    .bind(item_id)
    .bind(count)
    .fetch_all(&mut **tx)
    .await?;

    if (allocated.len() as i64) < count {
        return Err(AppError::InsufficientStock {
            required: count,
            available: allocated.len() as i64,
        });
    }

    info!(
        "Allocated {} stock record(s) to order item {}",
        allocated.len(),
        item_id
    );
    Ok(allocated)
}

/// Insert a single credential record (admin).
pub async fn insert_account(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<AccountStock, AppError> {
    let account = sqlx::query_as::<_, AccountStock>(
        r#"
        INSERT INTO accounts_stock (username, password)
        VALUES ($1, $2)
        RETURNING id, username, password, is_used, assigned_order_item_id, created_at
        "#,
    )
    .bind(username)
    .bind(password)
    .fetch_one(pool)
    .await?;
    Ok(account)
}

/// Parse a bulk upload: one `username:password` pair per line.
///
/// Blank lines are skipped; a line without a colon or with an empty side is
/// rejected so a malformed upload never half-imports.
pub fn parse_bulk_accounts(input: &str) -> Result<Vec<(String, String)>, AppError> {
    let mut pairs = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (username, password) = line.split_once(':').ok_or_else(|| {
            AppError::Validation(format!("line {}: expected 'username:password'", idx + 1))
        })?;
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation(format!(
                "line {}: username and password must be non-empty",
                idx + 1
            )));
        }
        pairs.push((username.to_string(), password.to_string()));
    }
    if pairs.is_empty() {
        return Err(AppError::Validation(
            "no credential pairs found in upload".to_string(),
        ));
    }
    Ok(pairs)
}

/// Insert many credential records in one transaction (admin bulk upload).
pub async fn insert_accounts_bulk(pool: &PgPool, input: &str) -> Result<usize, AppError> {
    let pairs = parse_bulk_accounts(input)?;

    let mut tx = pool.begin().await?;
    for (username, password) in &pairs {
        sqlx::query("INSERT INTO accounts_stock (username, password) VALUES ($1, $2)")
            .bind(username)
            .bind(password)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("Bulk-inserted {} stock record(s)", pairs.len());
    Ok(pairs.len())
}

/// Delete a credential record, refusing if it has ever been allocated.
///
/// Used records are the audit trail for past fulfillments and must survive.
pub async fn delete_if_unused(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM accounts_stock WHERE id = $1 AND is_used = FALSE")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        let exists: Option<bool> =
            sqlx::query_scalar("SELECT is_used FROM accounts_stock WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        return match exists {
            Some(_) => Err(AppError::Validation(
                "cannot delete a stock record that has been allocated".to_string(),
            )),
            None => Err(AppError::NotFound(format!("stock record {} not found", id))),
        };
    }
    Ok(())
}

/// List stock records, newest first (admin).
pub async fn list_accounts(pool: &PgPool, limit: i64) -> Result<Vec<AccountStock>, AppError> {
    let accounts = sqlx::query_as::<_, AccountStock>(
        r#"
        SELECT id, username, password, is_used, assigned_order_item_id, created_at
        FROM accounts_stock
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}
