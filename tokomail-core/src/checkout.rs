//! Order creation flow and the public catalog/order read endpoints.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{CreateOrderRequest, OrderLineRequest};
use crate::models::{Order, OrderItemWithProduct, Product, ProductType};
use crate::orders::{self, NewOrderLine};
use crate::payment::build_payment_url;
use crate::{stock, AppState};

/// Normalize and price the requested lines against the loaded products.
///
/// Quantity floors to 1; missing or inactive products reject the whole
/// order. Prices are snapshotted here so later catalog edits cannot change
/// what the buyer owes.
fn build_lines(
    products: &HashMap<Uuid, Product>,
    requests: &[OrderLineRequest],
) -> Result<Vec<NewOrderLine>, AppError> {
    let mut lines = Vec::with_capacity(requests.len());
    for request in requests {
        let product = products.get(&request.product_id).ok_or_else(|| {
            AppError::Validation(format!("product {} does not exist", request.product_id))
        })?;
        if !product.is_active {
            return Err(AppError::Validation(format!(
                "product '{}' is no longer available",
                product.name
            )));
        }

        let quantity = request.quantity.max(1);
        lines.push(NewOrderLine {
            product_id: product.id,
            quantity,
            effective_unit_count: product.unit_count * quantity,
            unit_price: product.price,
            total_price: product.price * Decimal::from(quantity),
        });
    }
    Ok(lines)
}

/// Units of credential stock the order will consume at fulfillment time.
/// Only Gmail-type lines draw from the ledger.
fn stock_demand(products: &HashMap<Uuid, Product>, lines: &[NewOrderLine]) -> i64 {
    lines
        .iter()
        .filter(|l| {
            products
                .get(&l.product_id)
                .map(|p| p.product_type == ProductType::Gmail)
                .unwrap_or(false)
        })
        .map(|l| l.effective_unit_count as i64)
        .sum()
}

async fn load_products(
    pool: &sqlx::PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Product>, AppError> {
    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price, unit_count, is_active, product_type, file_url,
               created_at, updated_at
        FROM products
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

/// `POST /api/orders`: validate a cart submission, persist the order in
/// `pending` state, and hand back the hosted payment URL.
///
/// The stock check here is admission control only, not a reservation:
/// nothing is held until payment confirmation triggers fulfillment.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<crate::models::order::CreateOrderResponse>, AppError> {
    if request.buyer_email.trim().is_empty() || request.buyer_phone.trim().is_empty() {
        return Err(AppError::Validation(
            "buyer email and phone number are required".to_string(),
        ));
    }
    if request.items.is_empty() {
        return Err(AppError::Validation("the cart is empty".to_string()));
    }

    let mut ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
    ids.sort();
    ids.dedup();
    let products = load_products(&state.db, &ids).await?;

    let lines = build_lines(&products, &request.items)?;

    let required_units = stock_demand(&products, &lines);
    if required_units > 0 {
        let available = stock::count_available(&state.db).await?;
        if required_units > available {
            return Err(AppError::InsufficientStock {
                required: required_units,
                available,
            });
        }
    }

    let (order, items) = orders::create_order_with_items(
        &state.db,
        request.buyer_email.trim(),
        request.buyer_phone.trim(),
        &lines,
    )
    .await?;

    let grand_total: Decimal = items.iter().map(|i| i.total_price).sum();
    let total_units: i64 = items.iter().map(|i| i.effective_unit_count as i64).sum();
    let payment_url = build_payment_url(&state.config, order.id, grand_total)?;

    info!(
        "Order {} created for {} unit(s), total {}",
        order.id, total_units, grand_total
    );
    Ok(Json(crate::models::order::CreateOrderResponse {
        success: true,
        order_id: order.id,
        total_units,
        grand_total,
        payment_url,
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub order: Order,
    pub items: Vec<OrderItemWithProduct>,
}

/// `GET /api/orders/{id}`: the order and its typed items.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>, AppError> {
    let order = orders::get_order(&state.db, order_id).await?;
    let items = orders::get_items_with_product(&state.db, order_id).await?;
    Ok(Json(OrderDetailResponse { order, items }))
}

/// `GET /api/orders/{id}/payment`: pass-through of the gateway's
/// transaction detail for the thank-you page poll.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    orders::get_order(&state.db, order_id).await?;
    let items = orders::get_items_with_product(&state.db, order_id).await?;
    let amount: Decimal = items.iter().map(|i| i.total_price).sum();
    let detail = state.gateway.transaction_detail(order_id, amount).await?;
    Ok(Json(detail))
}

/// `GET /api/products`: active catalog plus the current credential stock
/// count for the storefront's availability display.
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, price, unit_count, is_active, product_type, file_url,
               created_at, updated_at
        FROM products
        WHERE is_active = TRUE
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    let available = stock::count_available(&state.db).await?;

    Ok(Json(json!({
        "products": products,
        "stock_available": available,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(product_type: ProductType, unit_count: i32, price: i64, active: bool) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            price: Decimal::from(price),
            unit_count,
            is_active: active,
            product_type,
            file_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<Uuid, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn floors_quantity_to_one_and_snapshots_prices() {
        let p = product(ProductType::Gmail, 3, 25_000, true);
        let id = p.id;
        let products = catalog(vec![p]);

        let lines = build_lines(
            &products,
            &[OrderLineRequest {
                product_id: id,
                quantity: 0,
            }],
        )
        .expect("should build");

        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].effective_unit_count, 3);
        assert_eq!(lines[0].unit_price, Decimal::from(25_000));
        assert_eq!(lines[0].total_price, Decimal::from(25_000));
    }

    #[test]
    fn multiplies_units_and_totals_by_quantity() {
        let p = product(ProductType::Gmail, 2, 10_000, true);
        let id = p.id;
        let products = catalog(vec![p]);

        let lines = build_lines(
            &products,
            &[OrderLineRequest {
                product_id: id,
                quantity: 3,
            }],
        )
        .unwrap();

        assert_eq!(lines[0].effective_unit_count, 6);
        assert_eq!(lines[0].total_price, Decimal::from(30_000));
    }

    #[test]
    fn rejects_unknown_product() {
        let products = catalog(vec![]);
        let err = build_lines(
            &products,
            &[OrderLineRequest {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_inactive_product() {
        let p = product(ProductType::Ebook, 1, 5_000, false);
        let id = p.id;
        let products = catalog(vec![p]);
        let err = build_lines(
            &products,
            &[OrderLineRequest {
                product_id: id,
                quantity: 1,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn only_gmail_lines_count_toward_stock_demand() {
        let gmail = product(ProductType::Gmail, 2, 10_000, true);
        let ebook = product(ProductType::Ebook, 1, 5_000, true);
        let (gmail_id, ebook_id) = (gmail.id, ebook.id);
        let products = catalog(vec![gmail, ebook]);

        let lines = build_lines(
            &products,
            &[
                OrderLineRequest {
                    product_id: gmail_id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: ebook_id,
                    quantity: 5,
                },
            ],
        )
        .unwrap();

        assert_eq!(stock_demand(&products, &lines), 4);
    }
}
