//! Scenario tests for the fulfillment engine.
//!
//! These need a Postgres database (run the migration first) and are ignored
//! unless `DATABASE_URL` is set:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -- --ignored --test-threads=1
//! ```
//!
//! Single-threaded because the scenarios share the stock ledger.
//!
//! The WhatsApp provider is replaced by a local stub server so no real
//! messages leave the test run.

use axum::{routing::post, Router};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::fulfillment::{FulfillmentEngine, FulfillmentOutcome};
use crate::models::{OrderStatus, ProductType};
use crate::whatsapp::WhatsappClient;
use crate::{orders, stock};

async fn create_test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set for tests");
    PgPool::connect(&database_url)
        .await
        .expect("failed to connect to test database")
}

/// Bind a throwaway HTTP server that accepts any POST so the engine's
/// provider call succeeds.
async fn spawn_stub_provider() -> String {
    let app = Router::new().route("/", post(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub provider");
    let addr = listener.local_addr().expect("stub provider has no addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub provider died");
    });
    format!("http://{}/", addr)
}

fn test_config(whatsapp_api_url: &str) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: String::new(),
        app_base_url: "http://localhost:3000".to_string(),
        payment_base_url: "http://localhost:9999".to_string(),
        payment_project: "test".to_string(),
        payment_api_key: "test".to_string(),
        payment_qris_only: false,
        whatsapp_api_url: whatsapp_api_url.to_string(),
        whatsapp_api_key: "test-key".to_string(),
        admin_password_hash: String::new(),
        jwt_secret: "secret".to_string(),
    }
}

async fn engine_with_stub(pool: &PgPool) -> FulfillmentEngine {
    let provider_url = spawn_stub_provider().await;
    let config = test_config(&provider_url);
    FulfillmentEngine::new(pool.clone(), WhatsappClient::new(&config))
}

async fn seed_product(
    pool: &PgPool,
    product_type: ProductType,
    unit_count: i32,
    file_url: Option<&str>,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO products (name, price, unit_count, product_type, file_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(format!("test product {}", Uuid::new_v4()))
    .bind(Decimal::from(10_000))
    .bind(unit_count)
    .bind(product_type)
    .bind(file_url)
    .fetch_one(pool)
    .await
    .expect("failed to seed product")
}

async fn seed_order(pool: &PgPool, status: OrderStatus) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO orders (buyer_email, buyer_phone, status)
        VALUES ('buyer@example.com', '08123456789', $1)
        RETURNING id
        "#,
    )
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("failed to seed order")
}

async fn seed_item(
    pool: &PgPool,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    effective_unit_count: i32,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO order_items
            (order_id, product_id, quantity, effective_unit_count, unit_price, total_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(effective_unit_count)
    .bind(Decimal::from(10_000))
    .bind(Decimal::from(10_000 * quantity as i64))
    .fetch_one(pool)
    .await
    .expect("failed to seed order item")
}

async fn seed_stock(pool: &PgPool, count: usize) {
    for i in 0..count {
        sqlx::query("INSERT INTO accounts_stock (username, password) VALUES ($1, $2)")
            .bind(format!("acct-{}-{}@gmail.com", Uuid::new_v4(), i))
            .bind("initial-pw")
            .execute(pool)
            .await
            .expect("failed to seed stock");
    }
}

async fn used_count_for_order(pool: &PgPool, order_id: Uuid) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM accounts_stock s
        JOIN order_items oi ON oi.id = s.assigned_order_item_id
        WHERE oi.order_id = $1 AND s.is_used = TRUE
        "#,
    )
    .bind(order_id)
    .fetch_one(pool)
    .await
    .expect("count query failed")
}

async fn log_count(pool: &PgPool, order_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM whatsapp_logs WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("log count query failed")
}

#[tokio::test]
#[ignore] // Requires database setup
async fn fulfills_gmail_order_and_allocates_exactly_the_required_units() {
    let pool = create_test_pool().await;
    let engine = engine_with_stub(&pool).await;

    let product = seed_product(&pool, ProductType::Gmail, 2, None).await;
    let order_id = seed_order(&pool, OrderStatus::Pending).await;
    seed_item(&pool, order_id, product, 1, 2).await;
    seed_stock(&pool, 5).await;

    let outcome = engine.fulfill(order_id, None).await.expect("fulfill failed");
    assert_eq!(outcome, FulfillmentOutcome::Fulfilled { units_allocated: 2 });

    // Exactly two records consumed, both stamped with this order's item.
    assert_eq!(used_count_for_order(&pool, order_id).await, 2);

    let order = orders::get_order(&pool, order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    // One audit entry, resolved as sent.
    let sent: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM whatsapp_logs WHERE order_id = $1 AND status = 'sent'",
    )
    .bind(order_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sent, 1);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn shortfall_cancels_order_and_marks_nothing_used() {
    let pool = create_test_pool().await;
    let engine = engine_with_stub(&pool).await;

    // Drain the ledger so only one record remains available.
    let available = stock::count_available(&pool).await.unwrap();
    if available > 1 {
        let drain_order = seed_order(&pool, OrderStatus::Pending).await;
        let drain_product = seed_product(&pool, ProductType::Gmail, 1, None).await;
        let drain_item = seed_item(&pool, drain_order, drain_product, 1, 1).await;
        let mut tx = pool.begin().await.unwrap();
        stock::allocate_for_item(&mut tx, drain_item, available - 1)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    } else if available == 0 {
        seed_stock(&pool, 1).await;
    }

    let product = seed_product(&pool, ProductType::Gmail, 3, None).await;
    let order_id = seed_order(&pool, OrderStatus::Pending).await;
    seed_item(&pool, order_id, product, 1, 3).await;

    let outcome = engine.fulfill(order_id, None).await.expect("fulfill errored");
    assert!(matches!(
        outcome,
        FulfillmentOutcome::OutOfStock { required: 3, .. }
    ));

    let order = orders::get_order(&pool, order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // The shortfall notice was logged, but no stock was consumed.
    assert_eq!(used_count_for_order(&pool, order_id).await, 0);
    assert_eq!(log_count(&pool, order_id).await, 1);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn refulfilling_a_completed_order_is_a_no_op() {
    let pool = create_test_pool().await;
    let engine = engine_with_stub(&pool).await;

    let order_id = seed_order(&pool, OrderStatus::Completed).await;

    let stock_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts_stock WHERE is_used = TRUE")
        .fetch_one(&pool)
        .await
        .unwrap();

    let outcome = engine.fulfill(order_id, None).await.expect("fulfill errored");
    assert_eq!(outcome, FulfillmentOutcome::AlreadyFulfilled);

    let stock_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts_stock WHERE is_used = TRUE")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stock_before, stock_after);
    assert_eq!(log_count(&pool, order_id).await, 0);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn ebook_without_link_still_completes_with_fallback_text() {
    let pool = create_test_pool().await;
    let engine = engine_with_stub(&pool).await;

    let product = seed_product(&pool, ProductType::Ebook, 1, None).await;
    let order_id = seed_order(&pool, OrderStatus::Pending).await;
    seed_item(&pool, order_id, product, 1, 1).await;

    let outcome = engine.fulfill(order_id, None).await.expect("fulfill failed");
    assert!(matches!(outcome, FulfillmentOutcome::Fulfilled { .. }));

    let order = orders::get_order(&pool, order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    let message: String =
        sqlx::query_scalar("SELECT message FROM whatsapp_logs WHERE order_id = $1")
            .bind(order_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(message.contains("download link will be sent"));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn claim_is_first_winner_takes_all() {
    let pool = create_test_pool().await;
    let order_id = seed_order(&pool, OrderStatus::Pending).await;

    assert!(orders::claim_for_fulfillment(&pool, order_id).await.unwrap());
    assert!(!orders::claim_for_fulfillment(&pool, order_id).await.unwrap());
}
