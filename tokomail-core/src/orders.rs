//! Order store: transactional creation and the conditional status updates
//! the fulfillment engine relies on for idempotency.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Order, OrderItem, OrderItemWithProduct, OrderStatus};

/// One priced line ready to be persisted, snapshots already computed.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub effective_unit_count: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Insert an order and all of its items in one transaction.
///
/// All-or-nothing: a failed item insert rolls the order back too, so no
/// pending order is ever left orphaned without items.
pub async fn create_order_with_items(
    pool: &PgPool,
    buyer_email: &str,
    buyer_phone: &str,
    lines: &[NewOrderLine],
) -> Result<(Order, Vec<OrderItem>), AppError> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (buyer_email, buyer_phone, status)
        VALUES ($1, $2, 'pending')
        RETURNING id, buyer_email, buyer_phone, status, payment_reference, created_at, updated_at
        "#,
    )
    .bind(buyer_email)
    .bind(buyer_phone)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items
                (order_id, product_id, quantity, effective_unit_count, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, product_id, quantity, effective_unit_count,
                      unit_price, total_price, created_at
            "#,
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.effective_unit_count)
        .bind(line.unit_price)
        .bind(line.total_price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    tx.commit().await?;

    info!("Created order {} with {} item(s)", order.id, items.len());
    Ok((order, items))
}

/// Load one order.
pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, buyer_email, buyer_phone, status, payment_reference, created_at, updated_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))
}

/// Load an order's items joined with the product columns fulfillment
/// branches on.
pub async fn get_items_with_product(
    pool: &PgPool,
    order_id: Uuid,
) -> Result<Vec<OrderItemWithProduct>, AppError> {
    let items = sqlx::query_as::<_, OrderItemWithProduct>(
        r#"
        SELECT
            oi.id, oi.order_id, oi.product_id, oi.quantity, oi.effective_unit_count,
            oi.unit_price, oi.total_price,
            p.name AS product_name, p.product_type, p.file_url
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        ORDER BY oi.created_at, oi.id
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Status update guarded by the lifecycle rules, optionally stamping a
/// payment reference. An update whose current status cannot legally reach
/// `status` matches no row and is silently a no-op; callers that care check
/// the state separately.
pub async fn update_status(
    pool: &PgPool,
    order_id: Uuid,
    status: OrderStatus,
    payment_reference: Option<&str>,
) -> Result<(), AppError> {
    let allowed_from: Vec<String> = OrderStatus::sources_of(status)
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    sqlx::query(
        r#"
        UPDATE orders
        SET status = $2,
            payment_reference = COALESCE($3, payment_reference),
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($4)
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(payment_reference)
    .bind(allowed_from)
    .execute(pool)
    .await?;
    Ok(())
}

/// Compare-and-swap claim of a pending order for fulfillment.
///
/// Returns `true` when this caller won the `pending -> paid` transition.
/// Concurrent webhook deliveries for the same order race here instead of on
/// the inventory ledger: only the winner proceeds to allocation.
pub async fn claim_for_fulfillment(pool: &PgPool, order_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', updated_at = NOW() WHERE id = $1 AND status = 'pending'",
    )
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Best-effort cancel used when webhook processing dies mid-flight.
///
/// Conditional so it can never clobber an order that already reached
/// `completed`. Returns whether a row changed.
pub async fn cancel_if_unfulfilled(pool: &PgPool, order_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'cancelled', updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'paid')
        "#,
    )
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// List recent orders, newest first (admin).
pub async fn list_orders(pool: &PgPool, limit: i64) -> Result<Vec<Order>, AppError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, buyer_email, buyer_phone, status, payment_reference, created_at, updated_at
        FROM orders
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}
